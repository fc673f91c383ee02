//! Results of the start and stop lifecycle operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a successful `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReport {
    /// OS process id of the spawned shell.
    pub pid: Option<u32>,
    /// Whether the initial ready-prompt was seen within the startup budget.
    pub prompt_seen: bool,
    /// Banner and startup-command output.
    pub output: String,
}

impl fmt::Display for StartReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Gowin process started successfully.")?;
        if let Some(pid) = self.pid {
            write!(f, " (pid {pid})")?;
        }
        if !self.output.is_empty() {
            write!(f, "\n{}", self.output)?;
        }
        Ok(())
    }
}

/// Result of a `stop`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReport {
    /// Whether a process was held when stop was called.
    pub was_running: bool,
    /// Whether the exit command was not enough and signals were needed.
    pub forced: bool,
    /// Exit code, when the OS reported one.
    pub exit_code: Option<i32>,
}

impl StopReport {
    /// Stop on a supervisor that held no process.
    #[must_use]
    pub fn already_stopped() -> Self {
        Self::default()
    }
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.was_running {
            return f.write_str("Gowin process is not running.");
        }
        f.write_str("Gowin process stopped")?;
        if self.forced {
            f.write_str(" (forced)")?;
        }
        if let Some(code) = self.exit_code {
            write!(f, " with exit code {code}")?;
        }
        f.write_str(".")
    }
}
