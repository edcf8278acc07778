//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    #[error("CLI_CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),

    #[error("CLI_IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("CLI_IO_ERROR: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CLI_ALREADY_INITIALIZED: store directory already holds a journal: {0}")]
    AlreadyInitialized(String),

    #[error("CLI_NOT_INITIALIZED: no journal in {0}. Run 'journalstore init' first.")]
    NotInitialized(String),

    #[error("CLI_INVALID_ARGUMENT: {0}")]
    InvalidArgument(String),

    #[error("CLI_STORE_ERROR: {0}")]
    Store(#[from] StoreError),
}

impl CliError {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "CLI_CONFIG_ERROR",
            CliError::Io(_) | CliError::Json(_) => "CLI_IO_ERROR",
            CliError::AlreadyInitialized(_) => "CLI_ALREADY_INITIALIZED",
            CliError::NotInitialized(_) => "CLI_NOT_INITIALIZED",
            CliError::InvalidArgument(_) => "CLI_INVALID_ARGUMENT",
            CliError::Store(_) => "CLI_STORE_ERROR",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_starts_with_code() {
        let err = CliError::NotInitialized("/tmp/x".into());
        assert!(err.to_string().starts_with(err.code()));

        let err: CliError = StoreError::NotRunning.into();
        assert_eq!(err.code(), "CLI_STORE_ERROR");
        assert!(err.to_string().starts_with("CLI_STORE_ERROR"));
    }
}
