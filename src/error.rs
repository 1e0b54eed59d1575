//! Error types
//!
//! Everything in here aborts a generation run. Recoverable conditions
//! (a port with no candidates, a rejected placement, a failed hallway)
//! are logged where they happen and never surface as errors.

use thiserror::Error;

/// Fatal generator error
#[derive(Debug, Error)]
pub enum GenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("unknown generator: {0}")]
    UnknownGenerator(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("script declares no generator")]
    NoGenerator,

    #[error("{command}: missing argument #{index}")]
    MissingArgument { command: String, index: usize },

    #[error("{command}: '{value}' is not a valid number")]
    InvalidNumber { command: String, value: String },

    #[error("invalid grid size {width}x{height}")]
    InvalidSize { width: i32, height: i32 },

    #[error("nothing to choose from: {0}")]
    EmptyChoice(String),

    #[error("prefab '{prefab}': unknown glyph '{glyph}' at ({x}, {y})")]
    UnknownGlyph {
        prefab: String,
        glyph: char,
        x: i32,
        y: i32,
    },

    #[error("prefab '{prefab}': {reason}")]
    MalformedPrefab { prefab: String, reason: String },

    #[error("prefab '{prefab}' ({w}x{h}) does not fit in the grid")]
    PrefabTooLarge { prefab: String, w: i32, h: i32 },
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, GenError>;
