//! Exec command handler.
//!
//! Starts the shell, runs a batch of commands in order and stops the shell
//! again, whatever happened in between.

use std::path::{Path, PathBuf};

use anyhow::Result;
use gwsh_core::CommandOutput;
use tracing::{debug, warn};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{print_block, render_output};

/// Arguments for the exec command.
#[derive(Debug, Clone, Default)]
pub struct ExecArgs {
    pub commands: Vec<String>,
    pub file: Option<PathBuf>,
    pub json: bool,
    pub keep_going: bool,
}

/// Execute the exec command.
pub async fn execute(ctx: &CliContext, args: ExecArgs) -> Result<()> {
    let commands = collect_commands(args.commands, args.file.as_deref())?;
    if commands.is_empty() {
        return Err(CliError::Arguments("no commands given".into()).into());
    }

    let report = ctx.service().start().await.map_err(CliError::from)?;
    debug!(pid = ?report.pid, prompt_seen = report.prompt_seen, "Shell ready");

    let outcome = run_all(ctx, &commands, args.json, args.keep_going).await;

    match ctx.service().stop().await {
        Ok(report) if report.forced => warn!("Shell had to be terminated"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to stop shell"),
    }
    outcome?;
    Ok(())
}

async fn run_all(
    ctx: &CliContext,
    commands: &[String],
    json: bool,
    keep_going: bool,
) -> Result<(), CliError> {
    let prompt = ctx.settings().prompt_token.as_str();
    for command in commands {
        let output = ctx.service().send_command(command, None).await?;
        print_result(&output, prompt, json)?;

        if output.timed_out {
            if !keep_going {
                return Err(CliError::Timeout(command.clone()));
            }
            let discarded = ctx.service().clear_pending().await?;
            debug!(command = %command, discarded = discarded.len(), "Cleared timed-out command");
        }
    }
    Ok(())
}

fn print_result(output: &CommandOutput, prompt: &str, json: bool) -> Result<(), CliError> {
    if json {
        let line =
            serde_json::to_string(output).map_err(|e| CliError::Core(e.to_string()))?;
        println!("{line}");
    } else {
        print_block(&render_output(output, prompt));
    }
    Ok(())
}

/// Positional commands first, then the file's lines.
///
/// Blank lines and lines starting with `#` in the file are skipped.
pub fn collect_commands(
    mut commands: Vec<String>,
    file: Option<&Path>,
) -> Result<Vec<String>, CliError> {
    if let Some(path) = file {
        let script = std::fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
        commands.extend(
            script
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(commands)
}
