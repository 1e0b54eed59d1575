//! Prefabgen - Entry Point
//!
//! Loads a prefab library and a level script, runs the generator and
//! prints the result, or watches it build in a terminal viewer.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::{backend::CrosstermBackend, Terminal};

use prefabgen::script::{generate, Script, ScriptRunner};
use prefabgen::ui::{StepView, Viewer};
use prefabgen::{GeneratedLevel, GeneratorConfig, PrefabLibrary};

#[derive(Parser, Debug)]
#[command(name = "prefabgen", version, about = "Prefab-and-hallway level generator")]
struct Args {
    /// Level script to run
    #[arg(short, long, default_value = "assets/levelscripts/basic.csv")]
    script: PathBuf,

    /// Prefab library (RON)
    #[arg(short, long, default_value = "assets/prefabs.ron")]
    prefabs: PathBuf,

    /// RNG seed; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Generator tuning (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only use prefabs carrying one of these tags
    #[arg(short, long, value_delimiter = ',', default_value = "*")]
    tags: Vec<String>,

    /// Watch the level build step by step
    #[arg(short, long)]
    watch: bool,

    /// Pause between steps in watch mode
    #[arg(long, default_value_t = 150)]
    delay_ms: u64,

    /// Start the viewer with the distance overlay on
    #[arg(long)]
    distance: bool,

    /// Write the finished level as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.watch);

    let seed = args.seed.unwrap_or_else(rand::random);
    log::info!("Starting prefabgen v{} (seed {})", env!("CARGO_PKG_VERSION"), seed);

    let config = match &args.config {
        Some(path) => GeneratorConfig::load_or_default(path),
        None => GeneratorConfig::default(),
    };
    let library = PrefabLibrary::load(&args.prefabs)
        .with_context(|| format!("loading prefabs from {}", args.prefabs.display()))?
        .with_tag_whitelist(&args.tags);
    let library = Arc::new(library);
    let script = Script::load(&args.script)
        .with_context(|| format!("loading script {}", args.script.display()))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let level = if args.watch {
        match watch(&script, library, config, &mut rng, &args)? {
            Some(level) => level,
            None => {
                log::info!("Run abandoned");
                return Ok(());
            }
        }
    } else {
        generate(&script, library, config, &mut rng)?
    };

    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&level)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote level to {}", path.display());
    }

    if !args.watch {
        print_level(&level, seed);
    }
    Ok(())
}

/// Log to stderr normally; to a file while the viewer owns the terminal
fn init_logging(to_file: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if to_file {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open("prefabgen.log")
        {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    builder.init();
}

fn print_level(level: &GeneratedLevel, seed: u64) {
    println!("seed: {}", seed);
    print!("{}", level.cells.to_ascii());
    for poi in &level.points_of_interest {
        println!(
            "{:?} '{}' at ({}, {})",
            poi.poi.kind, poi.poi.code, poi.point.x, poi.point.y
        );
    }
}

/// Run the script inside the terminal viewer. `None` if the user quit early.
fn watch(
    script: &Script,
    library: Arc<PrefabLibrary>,
    config: GeneratorConfig,
    rng: &mut StdRng,
    args: &Args,
) -> Result<Option<GeneratedLevel>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut viewer = Viewer::new(args.distance);
    let runner = ScriptRunner::new(script, library, config);
    let result = run_viewer(&mut terminal, &mut viewer, runner, rng, args.delay_ms);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        log::error!("Viewer exited with error: {}", e);
    }
    result
}

fn run_viewer(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    viewer: &mut Viewer,
    mut runner: ScriptRunner<'_>,
    rng: &mut StdRng,
    delay_ms: u64,
) -> Result<Option<GeneratedLevel>> {
    let delay = Duration::from_millis(delay_ms);

    while let Some(progress) = runner.step(rng)? {
        let view = StepView {
            generator: progress.generator,
            status: &progress.status,
            step: progress.step,
            total: progress.total,
            finished: progress.cells.is_some(),
        };
        terminal.draw(|frame| viewer.render(frame, &view))?;
        if quit_requested(delay)? {
            return Ok(None);
        }
    }

    // Keep the finished level on screen until the user leaves
    loop {
        let view = StepView {
            generator: runner.generator(),
            status: "Done",
            step: 1,
            total: 1,
            finished: true,
        };
        terminal.draw(|frame| viewer.render(frame, &view))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char('d') => viewer.toggle_distance(),
                _ => {}
            }
        }
    }
    Ok(Some(runner.into_level()))
}

/// Wait up to `delay` for a quit key
fn quit_requested(delay: Duration) -> Result<bool> {
    if event::poll(delay)? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press
                && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
            {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
