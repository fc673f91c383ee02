//! Main commands enum.

use std::path::PathBuf;

use clap::Subcommand;

/// Available commands for the Gowin shell supervisor.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the MCP server on stdin/stdout
    Serve {
        /// Start the shell before accepting requests instead of waiting for start_gowin
        #[arg(long)]
        autostart: bool,
    },

    /// Run Tcl commands in one shell session and print their output
    Exec {
        /// Commands to run, in order
        commands: Vec<String>,

        /// Read additional commands from a file, one per line ('#' starts a comment)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print one JSON object per command instead of plain text
        #[arg(long)]
        json: bool,

        /// Continue after a command times out instead of stopping
        #[arg(long)]
        keep_going: bool,
    },

    /// Interactive prompt forwarding each line to the shell
    Repl,
}
