//! Process runtime for the Gowin shell supervisor.
//!
//! Owns everything that touches the OS: spawning `gw_sh`, draining its
//! output on a background task, detecting the ready-prompt, and shutting the
//! process down. [`TclShellSupervisor`] implements the
//! [`gwsh_core::ShellSupervisor`] port.

#![deny(unsafe_code)]

pub mod buffer;
pub mod process;
pub mod prompt;
mod runner;
mod supervisor;

pub use buffer::{OutputBuffer, OutputSink, output_buffer};
pub use prompt::PromptDetector;
pub use supervisor::TclShellSupervisor;
