//! Prefabgen - prefab-and-hallway dungeon layout generation
//!
//! Assembles hand-drawn room and hallway templates into one connected
//! level, driven by a small command script.

pub mod error;
pub mod world;
pub mod prefab;
pub mod script;
pub mod ui;

// Re-export commonly used types
pub use error::{GenError, Result};
pub use prefab::PrefabLibrary;
pub use script::{Command, Progress, Script, ScriptRunner};
pub use world::generation::{GeneratedLevel, Generator, GeneratorConfig};
pub use world::{GeneratorCell, Grid, Point};
