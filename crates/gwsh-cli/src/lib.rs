//! Command-line entry point for the Gowin shell supervisor.
//!
//! `gwsh serve` exposes the shell as an MCP tool server on stdio; `exec` and
//! `repl` drive it directly from the terminal.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::Commands;
pub use error::CliError;
pub use parser::{Cli, ShellArgs};
