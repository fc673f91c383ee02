//! Command round-trip request and result types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One command line to submit to the shell.
///
/// Timeout and prompt fall back to the supervisor's configured defaults when
/// left unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Text written to the shell, without the line terminator.
    pub text: String,
    /// How long to wait for the ready-prompt.
    pub timeout: Option<Duration>,
    /// Ready-prompt to wait for instead of the default one.
    pub prompt: Option<String>,
}

impl CommandRequest {
    /// Create a request using the default timeout and prompt.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timeout: None,
            prompt: None,
        }
    }

    /// Set the prompt wait budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait for a different ready-prompt (e.g. a pager prompt).
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// Result of one command round-trip.
///
/// A timeout is not an error: `timed_out` is set and `output` holds
/// whatever arrived before the deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    /// The command text that was sent.
    pub command: String,
    /// Output captured since the command was written.
    pub output: String,
    /// Whether the ready-prompt was seen before the deadline.
    pub success: bool,
    /// Whether the wait exceeded its budget.
    pub timed_out: bool,
    /// Wall time spent waiting, in milliseconds.
    pub elapsed_ms: u64,
}

impl CommandOutput {
    /// The prompt was observed.
    pub fn completed(command: impl Into<String>, output: String, elapsed: Duration) -> Self {
        Self {
            command: command.into(),
            output,
            success: true,
            timed_out: false,
            elapsed_ms: duration_millis(elapsed),
        }
    }

    /// The deadline passed before the prompt appeared.
    pub fn timed_out(command: impl Into<String>, output: String, elapsed: Duration) -> Self {
        Self {
            command: command.into(),
            output,
            success: false,
            timed_out: true,
            elapsed_ms: duration_millis(elapsed),
        }
    }
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output)?;
        if self.timed_out {
            if !self.output.is_empty() && !self.output.ends_with('\n') {
                f.write_str("\n")?;
            }
            write!(
                f,
                "[Warning: command may still be running (timed out after {} ms)]",
                self.elapsed_ms
            )?;
        }
        Ok(())
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = CommandRequest::new("run syn")
            .with_timeout(Duration::from_secs(300))
            .with_prompt("--More--");
        assert_eq!(req.text, "run syn");
        assert_eq!(req.timeout, Some(Duration::from_secs(300)));
        assert_eq!(req.prompt.as_deref(), Some("--More--"));
    }

    #[test]
    fn test_completed_output() {
        let out = CommandOutput::completed("pwd", "/tmp\n% ".into(), Duration::from_millis(12));
        assert!(out.success);
        assert!(!out.timed_out);
        assert_eq!(out.elapsed_ms, 12);
        assert_eq!(out.to_string(), "/tmp\n% ");
    }

    #[test]
    fn test_timed_out_output_renders_warning() {
        let out = CommandOutput::timed_out("run all", "partial".into(), Duration::from_secs(1));
        assert!(!out.success);
        assert!(out.timed_out);
        let text = out.to_string();
        assert!(text.starts_with("partial\n"));
        assert!(text.contains("timed out after 1000 ms"));
    }
}
