//! Command handlers that delegate to the flow service.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that:
//!   1. Parse/validate CLI-specific input
//!   2. Call `FlowService` methods
//!   3. Format output for the terminal
//!
//! Handlers should NOT talk to the shell process directly.

pub mod exec;
pub mod repl;
pub mod serve;
