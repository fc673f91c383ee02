//! Transport errors for the MCP server loop.
//!
//! Protocol-level problems (bad JSON, unknown methods) are answered on the
//! wire and never surface here; only failures that end the loop do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpServerError {
    #[error("I/O error on MCP transport: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize response: {0}")]
    Json(#[from] serde_json::Error),
}
