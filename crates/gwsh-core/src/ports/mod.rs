//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.

pub mod shell_supervisor;

use thiserror::Error;

pub use shell_supervisor::ShellSupervisor;

#[cfg(test)]
pub use shell_supervisor::MockShellSupervisor;

/// Errors reported by a shell supervisor.
///
/// Hard failures only: a command that exceeds its wait budget is reported
/// through [`crate::CommandOutput::timed_out`], not here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// `start` was called while a live process is held.
    #[error("Gowin process is already running (pid {pid:?})")]
    AlreadyRunning { pid: Option<u32> },

    /// A command or pending-wait was issued without a running process.
    #[error("Gowin process is not running. Start it first.")]
    NotRunning,

    /// The executable could not be launched.
    #[error("Failed to start Gowin process: {0}")]
    SpawnFailed(String),

    /// The process exited, or its input pipe closed, during the operation.
    ///
    /// Carries whatever output was captured before the process went away.
    #[error("Gowin process is no longer running")]
    ProcessDead { output: String },

    /// Another round-trip has not completed, or a timed-out command has not
    /// been cleared.
    #[error("Command already in flight: {command}")]
    CommandInFlight { command: String },

    /// `await_pending` or `clear_pending` with nothing pending.
    #[error("No timed-out command is pending")]
    NoPendingCommand,

    /// Unexpected I/O failure outside the categories above.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Core error type for semantic domain errors.
///
/// This is the canonical error type used across the core domain.
/// Adapters map it to their own error types (JSON-RPC tool errors, CLI exit
/// codes).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Supervisor operation failed.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// Settings validation error.
    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),

    /// An argument cannot be turned into a valid Tcl command.
    #[error("Validation error: {0}")]
    Validation(String),
}
