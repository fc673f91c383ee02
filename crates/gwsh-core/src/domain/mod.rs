//! Domain types for the shell supervisor.
//!
//! These are plain data types shared by the runtime, the MCP adapter and the
//! CLI. They carry no behaviour beyond construction helpers.

mod command;
mod lifecycle;
mod status;

pub use command::{CommandOutput, CommandRequest};
pub use lifecycle::{StartReport, StopReport};
pub use status::{ProcessStatus, SupervisorState};
