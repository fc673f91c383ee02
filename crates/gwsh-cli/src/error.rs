//! CLI-specific error types and mappings.
//!
//! This module provides error types for the CLI adapter and mappings
//! from `CoreError` to exit codes and user-facing messages.

use gwsh_core::{CoreError, SupervisorError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core domain error.
    #[error("{0}")]
    Core(String),

    /// Argument or script error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The shell could not be launched or died.
    #[error("Process error: {0}")]
    Process(String),

    /// A command did not reach the prompt in time.
    #[error("Command timed out: {0}")]
    Timeout(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Core(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Process(_) => 71,  // EX_OSERR
            Self::Timeout(_) => 75,  // EX_TEMPFAIL
        }
    }

    /// Exit code for an error that reached `main`.
    pub fn exit_code_of(err: &anyhow::Error) -> u8 {
        err.downcast_ref::<Self>().map_or(1, Self::exit_code)
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Supervisor(
                e @ (SupervisorError::SpawnFailed(_) | SupervisorError::ProcessDead { .. }),
            ) => Self::Process(e.to_string()),
            CoreError::Supervisor(SupervisorError::Io(msg)) => Self::Io(msg),
            CoreError::Supervisor(e) => Self::Core(e.to_string()),
            CoreError::Settings(e) => Self::Config(e.to_string()),
            CoreError::Validation(msg) => Self::Arguments(msg),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwsh_core::SettingsError;

    #[test]
    fn test_core_error_mapping() {
        let err = CliError::from(CoreError::from(SupervisorError::SpawnFailed("x".into())));
        assert_eq!(err.exit_code(), 71);

        let err = CliError::from(CoreError::from(SupervisorError::NotRunning));
        assert_eq!(err.exit_code(), 1);

        let err = CliError::from(CoreError::from(SettingsError::EmptyPromptToken));
        assert_eq!(err.exit_code(), 78);

        let err = CliError::from(CoreError::Validation("bad".into()));
        assert!(matches!(err, CliError::Arguments(ref m) if m == "bad"));
    }

    #[test]
    fn test_exit_code_through_anyhow() {
        let err = anyhow::Error::from(CliError::Timeout("run all".into()));
        assert_eq!(CliError::exit_code_of(&err), 75);

        let other = anyhow::anyhow!("plain failure");
        assert_eq!(CliError::exit_code_of(&other), 1);
    }
}
