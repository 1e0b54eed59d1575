//! Level scripts
//!
//! A script is a small line-oriented text file. The first data line picks
//! the generator and grid size, every following line is one command:
//!
//! ```text
//! # comment
//! prefabs_and_hallways,40,40
//! placePrefab,start
//! growPrefabs,30
//! connectAdjacentPorts,5
//! removeDeadEnds,hall
//! addWallsNextToBareFloor
//! ```
//!
//! Fields may be separated by commas, whitespace or both.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;

use crate::error::{GenError, Result};
use crate::prefab::PrefabLibrary;
use crate::world::generation::{GeneratedLevel, Generator, GeneratorConfig};
use crate::world::{GeneratorCell, Grid};

/// A single generator pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PlacePrefab { tag: String },
    GrowPrefabs { iterations: usize },
    ConnectAdjacentPorts { max_cycles: Option<usize> },
    RemoveDeadEnds { tag: String },
    AddHallwaysToRemoteAreas { count: usize, iterations: usize },
    AddWallsNextToBareFloor,
    RemoveDoubleDoors,
}

impl Command {
    /// Parse a command from its token and arguments
    pub fn parse(name: &str, args: &[String]) -> Result<Self> {
        let args = Args { command: name, args };
        let command = match name {
            "placePrefab" => Command::PlacePrefab {
                tag: args.string(0)?,
            },
            "growPrefabs" => Command::GrowPrefabs {
                iterations: args.number(0)?,
            },
            "connectAdjacentPorts" => Command::ConnectAdjacentPorts {
                max_cycles: args.optional_number(0)?,
            },
            "removeDeadEnds" => Command::RemoveDeadEnds {
                tag: args.string(0)?,
            },
            "addHallwaysToRemoteAreas" => Command::AddHallwaysToRemoteAreas {
                count: args.number(0)?,
                iterations: args.number(1)?,
            },
            "addWallsNextToBareFloor" => Command::AddWallsNextToBareFloor,
            "removeDoubleDoors" => Command::RemoveDoubleDoors,
            other => return Err(GenError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }

    /// Script token for this command
    pub fn name(&self) -> &'static str {
        match self {
            Command::PlacePrefab { .. } => "placePrefab",
            Command::GrowPrefabs { .. } => "growPrefabs",
            Command::ConnectAdjacentPorts { .. } => "connectAdjacentPorts",
            Command::RemoveDeadEnds { .. } => "removeDeadEnds",
            Command::AddHallwaysToRemoteAreas { .. } => "addHallwaysToRemoteAreas",
            Command::AddWallsNextToBareFloor => "addWallsNextToBareFloor",
            Command::RemoveDoubleDoors => "removeDoubleDoors",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        match self {
            Command::PlacePrefab { tag } | Command::RemoveDeadEnds { tag } => write!(f, " {}", tag),
            Command::GrowPrefabs { iterations } => write!(f, " {}", iterations),
            Command::ConnectAdjacentPorts { max_cycles: Some(max) } => write!(f, " {}", max),
            Command::AddHallwaysToRemoteAreas { count, iterations } => {
                write!(f, " {} {}", count, iterations)
            }
            _ => Ok(()),
        }
    }
}

/// Positional argument access with command-aware errors
struct Args<'a> {
    command: &'a str,
    args: &'a [String],
}

impl Args<'_> {
    fn string(&self, index: usize) -> Result<String> {
        self.args
            .get(index)
            .cloned()
            .ok_or_else(|| GenError::MissingArgument {
                command: self.command.to_string(),
                index,
            })
    }

    fn number<T: FromStr>(&self, index: usize) -> Result<T> {
        let value = self.string(index)?;
        value.parse().map_err(|_| GenError::InvalidNumber {
            command: self.command.to_string(),
            value,
        })
    }

    fn optional_number<T: FromStr>(&self, index: usize) -> Result<Option<T>> {
        match self.args.get(index) {
            Some(_) => self.number(index).map(Some),
            None => Ok(None),
        }
    }
}

/// Generator factory selected by the first script line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    PrefabsAndHallways { width: i32, height: i32 },
}

impl GeneratorKind {
    fn parse(name: &str, args: &[String]) -> Result<Self> {
        match name {
            "prefabs_and_hallways" => {
                let args = Args { command: name, args };
                let width: i32 = args.number(0)?;
                let height: i32 = args.number(1)?;
                if width <= 0 || height <= 0 || width.checked_mul(height).is_none() {
                    return Err(GenError::InvalidSize { width, height });
                }
                Ok(GeneratorKind::PrefabsAndHallways { width, height })
            }
            other => Err(GenError::UnknownGenerator(other.to_string())),
        }
    }

    pub fn build(&self, library: Arc<PrefabLibrary>, config: GeneratorConfig) -> Generator {
        match *self {
            GeneratorKind::PrefabsAndHallways { width, height } => {
                Generator::new(library, width, height, config)
            }
        }
    }
}

/// A parsed level script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub generator: GeneratorKind,
    pub commands: Vec<Command>,
}

impl FromStr for Script {
    type Err = GenError;

    fn from_str(text: &str) -> Result<Self> {
        let mut generator = None;
        let mut commands = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            let Some(name) = tokens.next() else {
                continue;
            };
            let args: Vec<String> = tokens.collect();

            if generator.is_none() {
                generator = Some(GeneratorKind::parse(&name, &args)?);
            } else {
                commands.push(Command::parse(&name, &args)?);
            }
        }

        let generator = generator.ok_or(GenError::NoGenerator)?;
        Ok(Script {
            generator,
            commands,
        })
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let script: Script = content.parse()?;
        log::info!(
            "Loaded script {} ({} commands)",
            path.display(),
            script.commands.len()
        );
        Ok(script)
    }
}

/// One progress event
pub struct Progress<'a> {
    pub generator: &'a Generator,
    /// Number of commands executed so far
    pub step: usize,
    pub total: usize,
    pub status: String,
    /// Finished grid, only on the final event
    pub cells: Option<&'a Grid<GeneratorCell>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    NotStarted,
    Running(usize),
    Done,
    Exhausted,
}

/// Runs a script one command at a time.
///
/// Each call to [`ScriptRunner::step`] does at most one command, so a
/// caller can redraw between steps or simply stop calling.
pub struct ScriptRunner<'a> {
    script: &'a Script,
    generator: Generator,
    state: RunState,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(script: &'a Script, library: Arc<PrefabLibrary>, config: GeneratorConfig) -> Self {
        Self {
            script,
            generator: script.generator.build(library, config),
            state: RunState::NotStarted,
        }
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, RunState::Done | RunState::Exhausted)
    }

    /// Advance by one event. `Ok(None)` once the final event was emitted.
    pub fn step(&mut self, rng: &mut StdRng) -> Result<Option<Progress<'_>>> {
        let total = self.script.commands.len();
        let (step, status, finished) = match self.state {
            RunState::NotStarted => {
                self.state = RunState::Running(0);
                (0, "Starting".to_string(), false)
            }
            RunState::Running(index) if index < total => {
                let command = &self.script.commands[index];
                self.generator.run_command(command, rng)?;
                self.state = RunState::Running(index + 1);
                (index + 1, format!("{}/{}: {}", index + 1, total, command), false)
            }
            RunState::Running(_) => {
                self.state = RunState::Done;
                (total, "Done".to_string(), true)
            }
            RunState::Done | RunState::Exhausted => {
                self.state = RunState::Exhausted;
                return Ok(None);
            }
        };
        log::debug!("{}", status);
        Ok(Some(Progress {
            generator: &self.generator,
            step,
            total,
            status,
            cells: finished.then(|| self.generator.cells()),
        }))
    }

    /// Run to completion, reporting every event to `callback`
    pub fn run<F>(mut self, rng: &mut StdRng, mut callback: F) -> Result<GeneratedLevel>
    where
        F: FnMut(&Progress<'_>),
    {
        while let Some(progress) = self.step(rng)? {
            callback(&progress);
        }
        Ok(self.into_level())
    }

    pub fn into_level(self) -> GeneratedLevel {
        self.generator.into_level()
    }
}

/// Parse, build and run a script in one go
pub fn generate(
    script: &Script,
    library: Arc<PrefabLibrary>,
    config: GeneratorConfig,
    rng: &mut StdRng,
) -> Result<GeneratedLevel> {
    ScriptRunner::new(script, library, config).run(rng, |_| {})
}
