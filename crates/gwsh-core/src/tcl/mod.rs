//! Tcl command formatting for the Gowin shell.
//!
//! Each builder turns typed arguments into exactly one command line. Nothing
//! here talks to a process; [`crate::FlowService`] sends the results.

mod commands;
mod quote;

pub use commands::{
    DEFAULT_DEVICE_VERSION, FileType, RUN_ALL, RUN_PLACE_AND_ROUTE, RUN_SYNTHESIS, add_file, create_project,
    set_option, set_output_base_name, set_top_module,
};
pub use quote::{bare_word, quote, word};
