//! Shell supervisor trait definition.
//!
//! This port defines the interface for owning one interactive shell process
//! and running serialized command round-trips against it.

use async_trait::async_trait;
use std::time::Duration;

use super::SupervisorError;
use crate::domain::{CommandOutput, CommandRequest, ProcessStatus, StartReport, StopReport};

/// Supervisor for a single long-lived interactive shell.
///
/// # Contract
///
/// - At most one command round-trip is in flight at any instant; a second
///   `submit` is rejected with `CommandInFlight`, never queued.
/// - A round-trip that times out stays pending until `await_pending` sees the
///   prompt, `clear_pending` discards it, or `stop` is called.
/// - `stop` is idempotent and may be called while a `submit` is waiting.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShellSupervisor: Send + Sync {
    /// Spawn the shell and run the startup handshake.
    async fn start(&self) -> Result<StartReport, SupervisorError>;

    /// Shut the shell down, escalating to signals when needed.
    async fn stop(&self) -> Result<StopReport, SupervisorError>;

    /// Current status, computed without side effects.
    fn status(&self) -> ProcessStatus;

    /// Write one command line and wait for the ready-prompt or the deadline.
    async fn submit(&self, request: CommandRequest) -> Result<CommandOutput, SupervisorError>;

    /// Keep waiting for the prompt of a command that previously timed out.
    async fn await_pending(
        &self,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, SupervisorError>;

    /// Drop the pending marker and return the discarded output.
    async fn clear_pending(&self) -> Result<String, SupervisorError>;
}
