//! Supervisor state machine and the derived status view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the supervised shell.
///
/// A crash is not a state of its own: it is observed lazily through
/// [`ProcessStatus::running`] while the state is still `Running`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    /// No process exists.
    #[default]
    Stopped,
    /// The process is being spawned.
    Starting,
    /// The process has been spawned and its reader loop is live.
    Running,
    /// A stop is in progress.
    Stopping,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Read-only snapshot of the supervisor, computed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatus {
    /// Lifecycle state as last recorded by a lifecycle operation.
    pub state: SupervisorState,
    /// Whether the process is actually alive right now.
    pub running: bool,
    /// OS process id, if a process handle is held.
    pub pid: Option<u32>,
    /// Whether a command round-trip is in flight or pending after a timeout.
    pub command_in_flight: bool,
    /// Text of the command that timed out and has not been cleared.
    pub pending_command: Option<String>,
    /// Number of bytes currently held in the output buffer.
    pub buffered_length: usize,
    /// When the current process was spawned.
    pub started_at: Option<DateTime<Utc>>,
    /// Exit code of a process that died and has not been reaped yet.
    pub exit_code: Option<i32>,
}

impl ProcessStatus {
    /// Status of a supervisor with no process.
    #[must_use]
    pub fn stopped() -> Self {
        Self::default()
    }

    /// Whether the state says `Running` but the process is gone.
    #[must_use]
    pub fn is_crashed(&self) -> bool {
        self.state == SupervisorState::Running && !self.running
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.running {
            write!(f, "Gowin process is running")?;
            if let Some(pid) = self.pid {
                write!(f, " (pid {pid})")?;
            }
        } else if self.is_crashed() {
            write!(f, "Gowin process has exited unexpectedly")?;
            if let Some(code) = self.exit_code {
                write!(f, " (exit code {code})")?;
            }
        } else {
            write!(f, "Gowin process is not running")?;
        }
        write!(f, "; state={}", self.state)?;
        if let Some(ref cmd) = self.pending_command {
            write!(f, "; pending command: {cmd}")?;
        } else if self.command_in_flight {
            write!(f, "; command in flight")?;
        }
        write!(f, "; buffered bytes={}", self.buffered_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_stopped() {
        let status = ProcessStatus::stopped();
        assert_eq!(status.state, SupervisorState::Stopped);
        assert!(!status.running);
        assert!(status.pid.is_none());
        assert!(!status.is_crashed());
    }

    #[test]
    fn test_crash_is_running_state_without_process() {
        let status = ProcessStatus {
            state: SupervisorState::Running,
            running: false,
            exit_code: Some(3),
            ..ProcessStatus::default()
        };
        assert!(status.is_crashed());
        assert!(status.to_string().contains("exit code 3"));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ProcessStatus {
            state: SupervisorState::Running,
            running: true,
            pid: Some(42),
            command_in_flight: true,
            buffered_length: 7,
            ..ProcessStatus::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], "running");
        assert_eq!(value["pid"], 42);
        assert_eq!(value["commandInFlight"], true);
        assert_eq!(value["bufferedLength"], 7);
    }
}
