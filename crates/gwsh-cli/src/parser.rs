//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options. Every
//! shell option can also come from the environment (or a `.env` file).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};
use gwsh_core::{DEFAULT_EXECUTABLE, DEFAULT_PROMPT_TOKEN, DEFAULT_SHELL_ARGS};

use crate::commands::Commands;

/// Command-line interface for supervising a Gowin `gw_sh` Tcl shell.
#[derive(Parser)]
#[command(name = "gwsh")]
#[command(about = "Supervise a Gowin EDA gw_sh Tcl shell and expose it over MCP")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub shell: ShellArgs,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// How to launch and talk to the shell.
#[derive(Args, Debug, Clone)]
pub struct ShellArgs {
    /// Path to the gw_sh executable
    #[arg(long, env = "GWSH_EXECUTABLE", default_value = DEFAULT_EXECUTABLE, global = true)]
    pub executable: PathBuf,

    /// Argument passed to the executable (repeatable; replaces `-no_gui`)
    #[arg(
        long = "shell-arg",
        env = "GWSH_ARGS",
        default_values = DEFAULT_SHELL_ARGS,
        value_delimiter = ' ',
        allow_hyphen_values = true,
        global = true
    )]
    pub shell_args: Vec<String>,

    /// Working directory for the shell
    #[arg(long, env = "GWSH_WORKDIR", global = true)]
    pub working_dir: Option<PathBuf>,

    /// Ready-prompt token that marks the shell as idle
    #[arg(long, env = "GWSH_PROMPT", default_value = DEFAULT_PROMPT_TOKEN, global = true)]
    pub prompt: String,

    /// Default command timeout in seconds
    #[arg(long, env = "GWSH_TIMEOUT_SECS", value_parser = parse_seconds, global = true)]
    pub timeout: Option<Duration>,

    /// Time to wait for the initial prompt and each startup command, in seconds
    #[arg(long, env = "GWSH_STARTUP_TIMEOUT_SECS", value_parser = parse_seconds, global = true)]
    pub startup_timeout: Option<Duration>,

    /// Timeout for `run syn`, in seconds
    #[arg(long, env = "GWSH_SYNTHESIS_TIMEOUT_SECS", value_parser = parse_seconds, global = true)]
    pub synthesis_timeout: Option<Duration>,

    /// Timeout for `run pnr`, in seconds
    #[arg(long, env = "GWSH_PNR_TIMEOUT_SECS", value_parser = parse_seconds, global = true)]
    pub pnr_timeout: Option<Duration>,

    /// Timeout for `run all`, in seconds
    #[arg(long, env = "GWSH_RUN_ALL_TIMEOUT_SECS", value_parser = parse_seconds, global = true)]
    pub run_all_timeout: Option<Duration>,

    /// Discard the shell's stderr instead of merging it into command output
    #[arg(long, env = "GWSH_DISCARD_STDERR", global = true)]
    pub discard_stderr: bool,

    /// Skip the startup commands (`set tcl_interactive 1`)
    #[arg(long, global = true)]
    pub no_startup_commands: bool,
}

/// Parse a positive number of seconds, fractions allowed.
pub fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;
    if secs <= 0.0 || !secs.is_finite() {
        return Err(format!("timeout must be a positive number of seconds, got {value}"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}
