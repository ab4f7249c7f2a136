pub mod cli;
pub mod collector;

use core::error::Error;

use derive_more::Display;

/// Startup configuration errors
#[derive(Debug, Display)]
pub enum ConfigError {
    #[display("Invalid regex for {name}: {pattern}")]
    InvalidPattern { name: String, pattern: String },
    #[display("Regex for {name} needs at least {expected} capture groups, found {found}")]
    CaptureGroups {
        name: String,
        expected: usize,
        found: usize,
    },
    #[display("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[display("Failed to determine the local hostname")]
    Hostname,
}

impl Error for ConfigError {}

pub use cli::*;
pub use collector::*;
