//! Flow service - the named project-flow operations over a shell supervisor.
//!
//! Every operation formats one Tcl command and delegates to
//! [`ShellSupervisor::submit`]. The service holds no state of its own.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::{CommandOutput, CommandRequest, ProcessStatus, StartReport, StopReport};
use crate::ports::{CoreError, ShellSupervisor};
use crate::settings::Settings;
use crate::tcl::{self, FileType};

/// Wait budgets for the long-running flow steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTimeouts {
    pub synthesis: Duration,
    pub place_and_route: Duration,
    pub full_flow: Duration,
}

impl From<&Settings> for FlowTimeouts {
    fn from(settings: &Settings) -> Self {
        Self {
            synthesis: settings.synthesis_timeout,
            place_and_route: settings.place_and_route_timeout,
            full_flow: settings.full_flow_timeout,
        }
    }
}

impl Default for FlowTimeouts {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Service exposing the Gowin project flow as named operations.
#[derive(Clone)]
pub struct FlowService {
    supervisor: Arc<dyn ShellSupervisor>,
    timeouts: FlowTimeouts,
}

impl FlowService {
    /// Create a new flow service.
    pub fn new(supervisor: Arc<dyn ShellSupervisor>, timeouts: FlowTimeouts) -> Self {
        Self {
            supervisor,
            timeouts,
        }
    }

    /// The supervisor this service delegates to.
    pub fn supervisor(&self) -> &Arc<dyn ShellSupervisor> {
        &self.supervisor
    }

    /// Start the shell.
    pub async fn start(&self) -> Result<StartReport, CoreError> {
        Ok(self.supervisor.start().await?)
    }

    /// Stop the shell.
    pub async fn stop(&self) -> Result<StopReport, CoreError> {
        Ok(self.supervisor.stop().await?)
    }

    /// Current process status.
    pub fn status(&self) -> ProcessStatus {
        self.supervisor.status()
    }

    /// Send a raw command line.
    pub async fn send_command(
        &self,
        text: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CoreError> {
        let mut request = CommandRequest::new(text);
        request.timeout = timeout;
        self.submit(request).await
    }

    /// Keep waiting for a command that timed out earlier.
    pub async fn await_pending(
        &self,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CoreError> {
        Ok(self.supervisor.await_pending(timeout).await?)
    }

    /// Discard a command that timed out earlier.
    pub async fn clear_pending(&self) -> Result<String, CoreError> {
        Ok(self.supervisor.clear_pending().await?)
    }

    /// Create a new project.
    pub async fn create_project(
        &self,
        name: &str,
        dir: &Path,
        part_number: &str,
        device_version: &str,
        force: bool,
    ) -> Result<CommandOutput, CoreError> {
        let cmd = tcl::create_project(name, dir, part_number, device_version, force)?;
        self.submit(CommandRequest::new(cmd)).await
    }

    /// Add an existing file to the open project.
    pub async fn add_file(
        &self,
        path: &Path,
        file_type: Option<FileType>,
    ) -> Result<CommandOutput, CoreError> {
        let cmd = tcl::add_file(path, file_type)?;
        self.submit(CommandRequest::new(cmd)).await
    }

    /// Set the top module.
    pub async fn set_top_module(&self, name: &str) -> Result<CommandOutput, CoreError> {
        let cmd = tcl::set_top_module(name)?;
        self.submit(CommandRequest::new(cmd)).await
    }

    /// Set the base name of generated files.
    pub async fn set_output_base_name(&self, name: &str) -> Result<CommandOutput, CoreError> {
        let cmd = tcl::set_output_base_name(name)?;
        self.submit(CommandRequest::new(cmd)).await
    }

    /// Set a project option.
    pub async fn set_option(&self, key: &str, value: &str) -> Result<CommandOutput, CoreError> {
        let cmd = tcl::set_option(key, value)?;
        self.submit(CommandRequest::new(cmd)).await
    }

    /// Run synthesis.
    pub async fn run_synthesis(&self) -> Result<CommandOutput, CoreError> {
        self.submit(CommandRequest::new(tcl::RUN_SYNTHESIS).with_timeout(self.timeouts.synthesis))
            .await
    }

    /// Run place and route.
    pub async fn run_place_and_route(&self) -> Result<CommandOutput, CoreError> {
        self.submit(
            CommandRequest::new(tcl::RUN_PLACE_AND_ROUTE)
                .with_timeout(self.timeouts.place_and_route),
        )
        .await
    }

    /// Run synthesis followed by place and route.
    pub async fn run_all(&self) -> Result<CommandOutput, CoreError> {
        self.submit(CommandRequest::new(tcl::RUN_ALL).with_timeout(self.timeouts.full_flow))
            .await
    }

    async fn submit(&self, request: CommandRequest) -> Result<CommandOutput, CoreError> {
        debug!(command = %request.text, "Submitting flow command");
        Ok(self.supervisor.submit(request).await?)
    }
}
