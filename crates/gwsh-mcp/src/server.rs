//! Line-delimited JSON-RPC server loop.
//!
//! Each request line is handled on its own task so `ping` and
//! `get_process_status` stay responsive while a long flow step runs; the
//! supervisor itself still rejects a second concurrent command. Responses
//! are written as they complete, one JSON object per line.

use std::sync::Arc;

use gwsh_core::FlowService;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::McpServerError;
use crate::protocol::{
    CallToolParams, InitializeResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    PROTOCOL_VERSION, ServerCapabilities, ServerInfo,
};
use crate::tools;

const INSTRUCTIONS: &str = "Drives a Gowin EDA gw_sh Tcl shell. Call start_gowin first. \
Commands run one at a time; a command that times out stays pending until \
await_pending_command completes it or clear_pending_command discards it.";

/// MCP server over a [`FlowService`].
pub struct McpServer {
    service: FlowService,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(service: FlowService) -> Self {
        Self {
            service,
            info: ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// The service tools are dispatched to.
    pub const fn service(&self) -> &FlowService {
        &self.service
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn serve_stdio(self: Arc<Self>) -> Result<(), McpServerError> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches EOF, then wait for in-flight requests.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, mut writer: W) -> Result<(), McpServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(server = %self.info.name, version = %self.info.version, "MCP server listening on stdio");
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let mut lines = reader.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = server.handle_line(&line).await {
                            // receiver only goes away when the loop failed
                            let _ = tx.send(response);
                        }
                    });
                }
                Some(response) = rx.recv() => write_response(&mut writer, &response).await?,
            }
        }

        debug!("Input closed; flushing outstanding responses");
        drop(tx);
        while let Some(response) = rx.recv().await {
            write_response(&mut writer, &response).await?;
        }
        writer.flush().await?;
        Ok(())
    }

    /// Handle one raw input line. `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to parse JSON-RPC message");
                return Some(JsonRpcResponse::parse_error(e));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => return Some(JsonRpcResponse::invalid_request(id, e)),
        };
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::invalid_request(
                id,
                format!("unsupported jsonrpc version '{}'", request.jsonrpc),
            ));
        }

        self.handle_request(request).await
    }

    /// Handle a parsed request. `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "Notification received");
            return None;
        };
        debug!(method = %request.method, id = %id, "Request received");

        let response = match request.method.as_str() {
            "initialize" => self.initialize(id),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => to_response(
                id,
                &ListToolsResult {
                    tools: tools::definitions(),
                },
            ),
            "tools/call" => self.call_tool(id, request.params).await,
            other => JsonRpcResponse::method_not_found(id, other),
        };
        Some(response)
    }

    fn initialize(&self, id: Value) -> JsonRpcResponse {
        to_response(
            id,
            &InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities::default(),
                server_info: self.info.clone(),
                instructions: Some(INSTRUCTIONS.to_string()),
            },
        )
    }

    async fn call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::invalid_params(id, "missing params for tools/call");
        };
        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => return JsonRpcResponse::invalid_params(id, e),
        };

        match tools::call_tool(&self.service, &params.name, params.arguments).await {
            Ok(result) => {
                if result.is_error {
                    debug!(tool = %params.name, message = %result.first_text(), "Tool reported an error");
                }
                to_response(id, &result)
            }
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Rejected tool call");
                JsonRpcResponse::invalid_params(id, e)
            }
        }
    }
}

fn to_response<T: serde::Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::internal_error(id, e),
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<(), McpServerError> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
