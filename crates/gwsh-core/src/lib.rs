//! Core domain types and port definitions for supervising a Gowin `gw_sh`
//! Tcl shell.
//!
//! This crate holds no process or transport code. Runtime adapters implement
//! [`ports::ShellSupervisor`]; the RPC and CLI adapters consume it through
//! [`services::FlowService`].

#![deny(unsafe_code)]

pub mod domain;
pub mod ports;
pub mod services;
pub mod settings;
pub mod tcl;

pub use domain::{
    CommandOutput, CommandRequest, ProcessStatus, StartReport, StopReport, SupervisorState,
};
pub use ports::{CoreError, ShellSupervisor, SupervisorError};
pub use services::{FlowService, FlowTimeouts};
pub use settings::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_EXECUTABLE, DEFAULT_POLL_INTERVAL, DEFAULT_PROMPT_TOKEN,
    DEFAULT_SHELL_ARGS, Settings, SettingsError,
};
pub use tcl::FileType;

