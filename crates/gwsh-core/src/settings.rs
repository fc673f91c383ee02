//! Settings domain types and validation.
//!
//! These are pure values: the CLI fills them from flags and environment
//! variables, the runtime reads them. No discovery logic lives here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default shell executable, resolved through `PATH`.
pub const DEFAULT_EXECUTABLE: &str = "gw_sh";

/// Arguments the shell is launched with unless overridden.
pub const DEFAULT_SHELL_ARGS: &[&str] = &["-no_gui"];

/// Prompt printed by `gw_sh` when it is idle.
pub const DEFAULT_PROMPT_TOKEN: &str = "% ";

/// Default wait budget for one command round-trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between prompt checks while a command is in flight.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Supervisor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the shell executable.
    pub executable: PathBuf,

    /// Arguments passed to the executable.
    pub args: Vec<String>,

    /// Working directory for the shell (inherits ours when unset).
    pub working_dir: Option<PathBuf>,

    /// Ready-prompt the shell prints when idle.
    pub prompt_token: String,

    /// Default wait budget for `send_command`.
    pub command_timeout: Duration,

    /// Interval between prompt checks.
    pub poll_interval: Duration,

    /// Wait budget for the initial prompt and each startup command.
    pub startup_timeout: Duration,

    /// Commands run right after spawning.
    pub startup_commands: Vec<String>,

    /// Command sent to ask the shell to exit.
    pub exit_command: String,

    /// How long to wait after the exit command before signalling.
    pub exit_grace: Duration,

    /// How long to wait after SIGTERM before SIGKILL.
    pub terminate_grace: Duration,

    /// Merge stderr into the output buffer instead of discarding it.
    pub capture_stderr: bool,

    /// Wait budget for `run syn`.
    pub synthesis_timeout: Duration,

    /// Wait budget for `run pnr`.
    pub place_and_route_timeout: Duration,

    /// Wait budget for `run all`.
    pub full_flow_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            args: DEFAULT_SHELL_ARGS.iter().map(ToString::to_string).collect(),
            working_dir: None,
            prompt_token: DEFAULT_PROMPT_TOKEN.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            startup_timeout: Duration::from_secs(5),
            startup_commands: vec!["set tcl_interactive 1".to_string()],
            exit_command: "exit".to_string(),
            exit_grace: Duration::from_secs(2),
            terminate_grace: Duration::from_secs(2),
            capture_stderr: true,
            synthesis_timeout: Duration::from_secs(300),
            place_and_route_timeout: Duration::from_secs(300),
            full_flow_timeout: Duration::from_secs(600),
        }
    }
}

impl Settings {
    /// Settings for the given executable with every other field defaulted.
    pub fn for_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    /// Check the settings for values the supervisor cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.executable.as_os_str().is_empty() {
            return Err(SettingsError::EmptyExecutable);
        }
        if self.prompt_token.is_empty() {
            return Err(SettingsError::EmptyPromptToken);
        }
        for (name, value) in [
            ("command_timeout", self.command_timeout),
            ("poll_interval", self.poll_interval),
            ("startup_timeout", self.startup_timeout),
            ("synthesis_timeout", self.synthesis_timeout),
            ("place_and_route_timeout", self.place_and_route_timeout),
            ("full_flow_timeout", self.full_flow_timeout),
        ] {
            if value.is_zero() {
                return Err(SettingsError::ZeroDuration(name));
            }
        }
        if self.poll_interval > self.command_timeout {
            return Err(SettingsError::PollIntervalTooLong {
                poll_interval: self.poll_interval,
                command_timeout: self.command_timeout,
            });
        }
        Ok(())
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Shell executable path cannot be empty")]
    EmptyExecutable,

    #[error("Prompt token cannot be empty")]
    EmptyPromptToken,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Poll interval ({poll_interval:?}) must not exceed the command timeout ({command_timeout:?})")]
    PollIntervalTooLong {
        poll_interval: Duration,
        command_timeout: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.prompt_token, "% ");
        assert_eq!(settings.poll_interval, Duration::from_millis(100));
        assert_eq!(settings.startup_commands, vec!["set tcl_interactive 1"]);
        assert_eq!(settings.args, vec!["-no_gui"]);
    }

    #[test]
    fn test_for_executable() {
        let settings = Settings::for_executable("/opt/gowin/IDE/bin/gw_sh");
        assert_eq!(settings.executable, PathBuf::from("/opt/gowin/IDE/bin/gw_sh"));
        assert_eq!(settings.command_timeout, DEFAULT_COMMAND_TIMEOUT);
    }

    #[test]
    fn test_rejects_empty_prompt() {
        let settings = Settings {
            prompt_token: String::new(),
            ..Settings::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::EmptyPromptToken));
    }

    #[test]
    fn test_rejects_empty_executable() {
        let settings = Settings::for_executable("");
        assert_eq!(settings.validate(), Err(SettingsError::EmptyExecutable));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let settings = Settings {
            command_timeout: Duration::ZERO,
            ..Settings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::ZeroDuration("command_timeout"))
        );
    }

    #[test]
    fn test_rejects_poll_longer_than_timeout() {
        let settings = Settings {
            command_timeout: Duration::from_millis(50),
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::PollIntervalTooLong { .. })
        ));
    }
}
