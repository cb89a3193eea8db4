// Pattern module - Text pattern files and dynamics

pub mod dynamic;
pub mod file;

pub use dynamic::{Dynamic, parse_velocity};
pub use file::{DEFAULT_TICKS_PER_BEAT, OPTION_TICKS_PER_BEAT, PatternFile, PatternLine};

use thiserror::Error;

/// Pattern file errors
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },

    #[error("Line {line}: unknown dynamic '{label}'")]
    UnknownDynamic { line: usize, label: String },
}
