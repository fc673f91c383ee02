//! CLI entry point - the composition root.
//!
//! Logging goes to stderr: in `serve` mode stdout carries the MCP protocol.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use gwsh_cli::handlers::exec::ExecArgs;
use gwsh_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(CliConfig::from_args(&cli.shell))?;

    match command {
        Commands::Serve { autostart } => handlers::serve::execute(&ctx, autostart).await,
        Commands::Exec {
            commands,
            file,
            json,
            keep_going,
        } => {
            let args = ExecArgs {
                commands,
                file,
                json,
                keep_going,
            };
            handlers::exec::execute(&ctx, args).await
        }
        Commands::Repl => handlers::repl::execute(&ctx).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(CliError::exit_code_of(&e))
        }
    }
}
