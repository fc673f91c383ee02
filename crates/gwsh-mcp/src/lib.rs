//! MCP (Model Context Protocol) server exposing the Gowin shell supervisor.
//!
//! Speaks line-delimited JSON-RPC 2.0 on stdio and maps each tool onto a
//! [`gwsh_core::FlowService`] operation.

#![deny(unsafe_code)]

pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::McpServerError;
pub use protocol::{CallToolResult, JsonRpcRequest, JsonRpcResponse, ToolDefinition};
pub use server::McpServer;
pub use tools::{ToolError, call_tool, definitions};
