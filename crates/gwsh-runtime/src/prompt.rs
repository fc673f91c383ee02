//! Ready-prompt detection.
//!
//! The shell gives no explicit "done" signal; it is idle once its output
//! ends with the prompt token. Detection looks at the accumulated tail of the
//! buffer, so a token split across two reads is still recognised.

use gwsh_core::DEFAULT_PROMPT_TOKEN;

use crate::buffer::OutputBuffer;

/// Predicate over buffered output that recognises the ready-prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptDetector {
    token: String,
}

impl PromptDetector {
    /// Detector for `token`. An empty token falls back to the `gw_sh` prompt.
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() {
            return Self::default();
        }
        Self { token }
    }

    /// The token being waited for.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether `text` ends with the prompt.
    pub fn is_ready_text(&self, text: &str) -> bool {
        text.ends_with(&self.token)
    }

    /// Whether the buffer's accumulated content ends with the prompt.
    pub fn is_ready(&self, buffer: &OutputBuffer) -> bool {
        buffer.ends_with(&self.token)
    }

    /// Output of an unfinished round-trip, leaving any partial prompt behind
    /// for the next wait.
    pub fn take_unfinished(&self, buffer: &OutputBuffer) -> String {
        buffer.drain_before_partial(&self.token)
    }
}

impl Default for PromptDetector {
    fn default() -> Self {
        Self {
            token: DEFAULT_PROMPT_TOKEN.to_string(),
        }
    }
}
