//! `ShellSupervisor` implementation for the Gowin Tcl shell.
//!
//! Thin adapter from the core port to [`TclShellSupervisor`]'s inherent
//! methods, so the services in `gwsh-core` can hold it as
//! `Arc<dyn ShellSupervisor>`.

use std::time::Duration;

use async_trait::async_trait;
use gwsh_core::{
    CommandOutput, CommandRequest, ProcessStatus, ShellSupervisor, StartReport, StopReport,
    SupervisorError,
};

use crate::supervisor::TclShellSupervisor;

#[async_trait]
impl ShellSupervisor for TclShellSupervisor {
    async fn start(&self) -> Result<StartReport, SupervisorError> {
        Self::start(self).await
    }

    async fn stop(&self) -> Result<StopReport, SupervisorError> {
        Self::stop(self).await
    }

    fn status(&self) -> ProcessStatus {
        Self::status(self)
    }

    async fn submit(&self, request: CommandRequest) -> Result<CommandOutput, SupervisorError> {
        Self::submit(self, request).await
    }

    async fn await_pending(
        &self,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, SupervisorError> {
        Self::await_pending(self, timeout).await
    }

    async fn clear_pending(&self) -> Result<String, SupervisorError> {
        Self::clear_pending(self).await
    }
}
