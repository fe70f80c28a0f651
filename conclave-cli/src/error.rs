//! Error type for the `conclave` binary.

use crate::config::ConfigError;

/// Anything a subcommand can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Settings could not be loaded or are incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Library error.
    #[error(transparent)]
    Conclave(#[from] conclave::Error),
}

/// Result type for subcommands.
pub type Result<T> = std::result::Result<T, CliError>;
