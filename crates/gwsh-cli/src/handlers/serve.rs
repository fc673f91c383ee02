//! Serve command handler.
//!
//! Runs the MCP server on stdio until the client closes stdin or the user
//! interrupts, then stops the shell.

use std::sync::Arc;

use anyhow::Result;
use gwsh_mcp::McpServer;
use tracing::{info, warn};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the serve command.
pub async fn execute(ctx: &CliContext, autostart: bool) -> Result<()> {
    if autostart {
        // a failed autostart is reported but start_gowin can still retry
        match ctx.service().start().await {
            Ok(report) => info!(pid = ?report.pid, prompt_seen = report.prompt_seen, "Shell started"),
            Err(e) => warn!(error = %e, "Autostart failed"),
        }
    }

    let server = Arc::new(McpServer::new(ctx.service().clone()));
    let served = tokio::select! {
        result = server.serve_stdio() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; shutting down");
            Ok(())
        }
    };

    match ctx.service().stop().await {
        Ok(report) if report.was_running => info!(forced = report.forced, "Shell stopped"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to stop shell"),
    }

    served.map_err(|e| CliError::Io(e.to_string()))?;
    Ok(())
}
