//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter: settings from the command line, the process
//! supervisor (via gwsh-runtime) and the flow service (via gwsh-core).

use std::sync::Arc;

use gwsh_core::{CoreError, FlowService, FlowTimeouts, Settings};
use gwsh_runtime::TclShellSupervisor;
use tracing::debug;

use crate::error::CliError;
use crate::parser::ShellArgs;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub settings: Settings,
}

impl CliConfig {
    /// Overlay the command-line options on the default settings.
    pub fn from_args(args: &ShellArgs) -> Self {
        let mut settings = Settings {
            executable: args.executable.clone(),
            args: args.shell_args.clone(),
            working_dir: args.working_dir.clone(),
            prompt_token: args.prompt.clone(),
            capture_stderr: !args.discard_stderr,
            ..Settings::default()
        };
        if let Some(timeout) = args.timeout {
            settings.command_timeout = timeout;
        }
        if let Some(timeout) = args.startup_timeout {
            settings.startup_timeout = timeout;
        }
        if let Some(timeout) = args.synthesis_timeout {
            settings.synthesis_timeout = timeout;
        }
        if let Some(timeout) = args.pnr_timeout {
            settings.place_and_route_timeout = timeout;
        }
        if let Some(timeout) = args.run_all_timeout {
            settings.full_flow_timeout = timeout;
        }
        if args.no_startup_commands {
            settings.startup_commands.clear();
        }
        Self { settings }
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    service: FlowService,
    settings: Settings,
}

impl CliContext {
    /// The flow service handlers delegate to.
    pub const fn service(&self) -> &FlowService {
        &self.service
    }

    /// Effective settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Bootstrap the CLI application.
///
/// Validates the settings and builds the supervisor; nothing is spawned
/// until a handler starts the shell.
pub fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let CliConfig { settings } = config;
    let supervisor = TclShellSupervisor::new(settings.clone()).map_err(CoreError::from)?;
    debug!(
        executable = %settings.executable.display(),
        prompt = ?settings.prompt_token,
        timeout_ms = settings.command_timeout.as_millis(),
        "Supervisor configured"
    );

    let service = FlowService::new(Arc::new(supervisor), FlowTimeouts::from(&settings));
    Ok(CliContext { service, settings })
}
