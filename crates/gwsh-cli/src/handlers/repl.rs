//! Repl command handler.
//!
//! Forwards each input line to the shell, empty lines included, so a
//! `--More--` pager can be answered. Lines starting with `.` are handled
//! locally; `exit` and `quit` leave the REPL and stop the shell.

use std::time::Duration;

use anyhow::Result;
use gwsh_core::{CoreError, SupervisorError};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::parser::parse_seconds;
use crate::presentation::{print_block, render_output, strip_prompt};

const PROMPT: &str = "gw_sh> ";

const HELP: &str = "\
.status           show process status
.await [SECS]     keep waiting for a timed-out command
.clear            discard a timed-out command
.restart          stop and start the shell
.help             show this help
.quit             stop the shell and leave (also: exit, quit, Ctrl-D)
Anything else is sent to gw_sh as a Tcl command; an empty line is sent as is.";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplInput {
    Tcl(String),
    Status,
    Await(Option<Duration>),
    Clear,
    Restart,
    Help,
    Quit,
    Invalid(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            return Self::Quit;
        }
        let Some(meta) = line.strip_prefix('.') else {
            return Self::Tcl(line.to_string());
        };

        let mut parts = meta.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();
        match (name, arg) {
            ("status", None) => Self::Status,
            ("await", None) => Self::Await(None),
            ("await", Some(secs)) => match parse_seconds(secs) {
                Ok(timeout) => Self::Await(Some(timeout)),
                Err(e) => Self::Invalid(e),
            },
            ("clear", None) => Self::Clear,
            ("restart", None) => Self::Restart,
            ("help", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            _ => Self::Invalid(format!("unknown command '.{meta}' (try .help)")),
        }
    }
}

/// Execute the repl command.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let report = ctx.service().start().await.map_err(CliError::from)?;
    let prompt_token = ctx.settings().prompt_token.clone();
    print_block(strip_prompt(&report.output, &prompt_token));
    println!("Connected to gw_sh. Type .help for local commands.");

    let mut editor = DefaultEditor::new().map_err(|e| CliError::Io(e.to_string()))?;
    let result = loop {
        let line = tokio::task::block_in_place(|| editor.readline(PROMPT));
        match line {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                if !handle(ctx, ReplInput::parse(&line), &prompt_token).await {
                    break Ok(());
                }
            }
            Err(ReadlineError::Interrupted) => {}
            Err(ReadlineError::Eof) => break Ok(()),
            Err(e) => break Err(CliError::Io(e.to_string())),
        }
    };

    if let Err(e) = ctx.service().stop().await {
        warn!(error = %e, "Failed to stop shell");
    }
    result?;
    Ok(())
}

/// Run one input. Returns `false` when the REPL should end.
async fn handle(ctx: &CliContext, input: ReplInput, prompt_token: &str) -> bool {
    let service = ctx.service();
    match input {
        ReplInput::Quit => return false,
        ReplInput::Help => println!("{HELP}"),
        ReplInput::Invalid(msg) => eprintln!("{msg}"),
        ReplInput::Status => println!("{}", service.status()),
        ReplInput::Tcl(command) => match service.send_command(&command, None).await {
            Ok(output) => print_block(&render_output(&output, prompt_token)),
            Err(e) => report_error(&e),
        },
        ReplInput::Await(timeout) => match service.await_pending(timeout).await {
            Ok(output) => print_block(&render_output(&output, prompt_token)),
            Err(e) => report_error(&e),
        },
        ReplInput::Clear => match service.clear_pending().await {
            Ok(discarded) => {
                print_block(&discarded);
                println!("Pending command cleared.");
            }
            Err(e) => report_error(&e),
        },
        ReplInput::Restart => {
            if let Err(e) = service.stop().await {
                report_error(&e);
            }
            match service.start().await {
                Ok(report) => println!("{report}"),
                Err(e) => report_error(&e),
            }
        }
    }
    true
}

fn report_error(err: &CoreError) {
    eprintln!("Error: {err}");
    match err {
        CoreError::Supervisor(SupervisorError::ProcessDead { output }) => {
            if !output.is_empty() {
                eprintln!("{output}");
            }
            eprintln!("Use .restart to start a new shell.");
        }
        CoreError::Supervisor(SupervisorError::CommandInFlight { .. }) => {
            eprintln!("Use .await to keep waiting or .clear to discard it.");
        }
        _ => {}
    }
}
