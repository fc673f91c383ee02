//! Tool catalogue and dispatch onto [`FlowService`].
//!
//! Argument problems (unknown tool, wrong JSON shape) are protocol errors.
//! Anything the supervisor or the command builders reject becomes a tool
//! result with `isError` set.

use std::path::PathBuf;
use std::time::Duration;

use gwsh_core::tcl::DEFAULT_DEVICE_VERSION;
use gwsh_core::{CommandOutput, CoreError, FileType, FlowService, SupervisorError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::protocol::{CallToolResult, ToolDefinition};

/// A `tools/call` that cannot be dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    InvalidArguments(String),
}

#[derive(Debug, Deserialize)]
struct SendTclCommandArgs {
    command: String,
    #[serde(default)]
    timeout: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AwaitPendingArgs {
    #[serde(default)]
    timeout: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CreateProjectArgs {
    name: String,
    directory: PathBuf,
    part_number: String,
    #[serde(default = "default_device_version")]
    device_version: String,
    #[serde(default = "default_force")]
    force: bool,
}

fn default_device_version() -> String {
    DEFAULT_DEVICE_VERSION.to_string()
}

const fn default_force() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AddFileArgs {
    file_path: PathBuf,
    #[serde(default)]
    file_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetTopModuleArgs {
    module_name: String,
}

#[derive(Debug, Deserialize)]
struct SetOutputBaseNameArgs {
    base_name: String,
}

#[derive(Debug, Deserialize)]
struct SetOptionArgs {
    option_name: String,
    option_value: String,
}

/// Every tool this server offers, in `tools/list` order.
pub fn definitions() -> Vec<ToolDefinition> {
    let no_args = json!({ "type": "object", "properties": {} });
    vec![
        ToolDefinition {
            name: "start_gowin",
            description: "Start the Gowin TCL shell (gw_sh) and wait for its prompt.",
            input_schema: no_args.clone(),
        },
        ToolDefinition {
            name: "stop_gowin",
            description: "Stop the Gowin TCL shell gracefully, forcing it if it does not exit.",
            input_schema: no_args.clone(),
        },
        ToolDefinition {
            name: "get_process_status",
            description: "Report whether the Gowin process is running and whether a command is pending.",
            input_schema: no_args.clone(),
        },
        ToolDefinition {
            name: "send_tcl_command",
            description: "Send a custom TCL command to the Gowin shell and return its output.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "TCL command to execute" },
                    "timeout": {
                        "type": "number",
                        "description": "Maximum time to wait for the prompt, in seconds (default 30)"
                    }
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: "await_pending_command",
            description: "Keep waiting for a command that timed out earlier.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "timeout": { "type": "number", "description": "Seconds to wait" }
                }
            }),
        },
        ToolDefinition {
            name: "clear_pending_command",
            description: "Discard a command that timed out so new commands are accepted again.",
            input_schema: no_args.clone(),
        },
        ToolDefinition {
            name: "create_project",
            description: "Create a new Gowin project.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Project name" },
                    "directory": { "type": "string", "description": "Project directory path" },
                    "part_number": {
                        "type": "string",
                        "description": "Part number, e.g. GW2AR-LV18QN88C8/I7"
                    },
                    "device_version": {
                        "type": "string",
                        "description": "Device version (default C)"
                    },
                    "force": {
                        "type": "boolean",
                        "description": "Overwrite an existing project (default true)"
                    }
                },
                "required": ["name", "directory", "part_number"]
            }),
        },
        ToolDefinition {
            name: "add_file",
            description: "Add an existing file to the current project.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "Path to the file" },
                    "file_type": {
                        "type": "string",
                        "enum": ["verilog", "vhdl", "cst", "sdc", "gao"],
                        "description": "File type; inferred from the extension when omitted"
                    }
                },
                "required": ["file_path"]
            }),
        },
        ToolDefinition {
            name: "set_top_module",
            description: "Set the top module for the project.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "module_name": { "type": "string", "description": "Name of the top module" }
                },
                "required": ["module_name"]
            }),
        },
        ToolDefinition {
            name: "set_output_base_name",
            description: "Set the base name for generated output files.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "base_name": { "type": "string", "description": "Base name for output files" }
                },
                "required": ["base_name"]
            }),
        },
        ToolDefinition {
            name: "set_option",
            description: "Set a generic project option.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "option_name": {
                        "type": "string",
                        "description": "Option name, without the leading dash"
                    },
                    "option_value": { "type": "string", "description": "Option value" }
                },
                "required": ["option_name", "option_value"]
            }),
        },
        ToolDefinition {
            name: "run_synthesis",
            description: "Run synthesis on the current project.",
            input_schema: no_args.clone(),
        },
        ToolDefinition {
            name: "run_place_and_route",
            description: "Run place and route on the current project.",
            input_schema: no_args.clone(),
        },
        ToolDefinition {
            name: "run_all",
            description: "Run the complete flow (synthesis, place and route) on the current project.",
            input_schema: no_args,
        },
    ]
}

/// Run one tool against the service.
pub async fn call_tool(
    service: &FlowService,
    name: &str,
    arguments: Option<Value>,
) -> Result<CallToolResult, ToolError> {
    let args = arguments.unwrap_or_else(|| json!({}));
    debug!(tool = %name, "Calling tool");

    let result = match name {
        "start_gowin" => match service.start().await {
            Ok(report) => CallToolResult::text(report.to_string(), to_structured(&report)),
            Err(e) => error_result(&e),
        },
        "stop_gowin" => match service.stop().await {
            Ok(report) => CallToolResult::text(report.to_string(), to_structured(&report)),
            Err(e) => error_result(&e),
        },
        "get_process_status" => {
            let status = service.status();
            CallToolResult::text(status.to_string(), to_structured(&status))
        }
        "send_tcl_command" => {
            let args: SendTclCommandArgs = parse(args)?;
            let timeout = seconds(args.timeout)?;
            command_result(service.send_command(&args.command, timeout).await)
        }
        "await_pending_command" => {
            let args: AwaitPendingArgs = parse(args)?;
            let timeout = seconds(args.timeout)?;
            command_result(service.await_pending(timeout).await)
        }
        "clear_pending_command" => match service.clear_pending().await {
            Ok(discarded) => {
                let mut text = String::from("Pending command cleared.");
                if !discarded.is_empty() {
                    text.push_str("\nDiscarded output:\n");
                    text.push_str(&discarded);
                }
                CallToolResult::text(text, Some(json!({ "discarded": discarded })))
            }
            Err(e) => error_result(&e),
        },
        "create_project" => {
            let args: CreateProjectArgs = parse(args)?;
            command_result(
                service
                    .create_project(
                        &args.name,
                        &args.directory,
                        &args.part_number,
                        &args.device_version,
                        args.force,
                    )
                    .await,
            )
        }
        "add_file" => {
            let args: AddFileArgs = parse(args)?;
            let file_type = match args.file_type.as_deref().map(str::parse::<FileType>) {
                None => None,
                Some(Ok(t)) => Some(t),
                Some(Err(e)) => return Ok(error_result(&e)),
            };
            command_result(service.add_file(&args.file_path, file_type).await)
        }
        "set_top_module" => {
            let args: SetTopModuleArgs = parse(args)?;
            command_result(service.set_top_module(&args.module_name).await)
        }
        "set_output_base_name" => {
            let args: SetOutputBaseNameArgs = parse(args)?;
            command_result(service.set_output_base_name(&args.base_name).await)
        }
        "set_option" => {
            let args: SetOptionArgs = parse(args)?;
            command_result(
                service
                    .set_option(&args.option_name, &args.option_value)
                    .await,
            )
        }
        "run_synthesis" => command_result(service.run_synthesis().await),
        "run_place_and_route" => command_result(service.run_place_and_route().await),
        "run_all" => command_result(service.run_all().await),
        other => return Err(ToolError::UnknownTool(other.to_string())),
    };
    Ok(result)
}

fn parse<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Optional timeout in seconds; must be positive and finite.
fn seconds(value: Option<f64>) -> Result<Option<Duration>, ToolError> {
    value
        .map(|secs| {
            if secs > 0.0 {
                Duration::try_from_secs_f64(secs).map_err(|e| {
                    ToolError::InvalidArguments(format!("invalid timeout {secs}: {e}"))
                })
            } else {
                Err(ToolError::InvalidArguments(format!(
                    "timeout must be positive, got {secs}"
                )))
            }
        })
        .transpose()
}

fn to_structured<T: serde::Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

fn command_result(result: Result<CommandOutput, CoreError>) -> CallToolResult {
    match result {
        Ok(output) => CallToolResult::text(output.to_string(), to_structured(&output)),
        Err(e) => error_result(&e),
    }
}

fn error_result(err: &CoreError) -> CallToolResult {
    let mut structured = json!({
        "error": error_kind(err),
        "message": err.to_string(),
    });
    let mut text = err.to_string();

    match err {
        CoreError::Supervisor(SupervisorError::ProcessDead { output }) => {
            structured["output"] = json!(output);
            if !output.is_empty() {
                text.push_str("\nLast output:\n");
                text.push_str(output);
            }
        }
        CoreError::Supervisor(SupervisorError::CommandInFlight { command }) => {
            structured["command"] = json!(command);
            text.push_str(
                "\nUse await_pending_command to keep waiting or clear_pending_command to discard it.",
            );
        }
        _ => {}
    }
    CallToolResult::error(text, Some(structured))
}

const fn error_kind(err: &CoreError) -> &'static str {
    match err {
        CoreError::Supervisor(e) => match e {
            SupervisorError::AlreadyRunning { .. } => "already_running",
            SupervisorError::NotRunning => "not_running",
            SupervisorError::SpawnFailed(_) => "spawn_failed",
            SupervisorError::ProcessDead { .. } => "process_dead",
            SupervisorError::CommandInFlight { .. } => "command_in_flight",
            SupervisorError::NoPendingCommand => "no_pending_command",
            SupervisorError::Io(_) => "io",
        },
        CoreError::Settings(_) => "settings",
        CoreError::Validation(_) => "validation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_have_unique_names() {
        let defs = definitions();
        let mut names: Vec<_> = defs.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), defs.len());
        assert_eq!(defs.len(), 14);
    }

    #[test]
    fn test_every_schema_is_an_object() {
        for def in definitions() {
            assert_eq!(def.input_schema["type"], "object", "{}", def.name);
        }
    }

    #[test]
    fn test_seconds_validation() {
        assert_eq!(seconds(None), Ok(None));
        assert_eq!(seconds(Some(1.5)), Ok(Some(Duration::from_millis(1500))));
        assert!(seconds(Some(0.0)).is_err());
        assert!(seconds(Some(-3.0)).is_err());
        assert!(seconds(Some(f64::NAN)).is_err());
        assert!(seconds(Some(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_create_project_defaults() {
        let args: CreateProjectArgs = parse(json!({
            "name": "blinky",
            "directory": "/work",
            "part_number": "GW1NR-LV9QN88PC6/I5"
        }))
        .unwrap();
        assert_eq!(args.device_version, "C");
        assert!(args.force);
    }

    #[test]
    fn test_missing_required_argument() {
        let err = parse::<SetOptionArgs>(json!({ "option_name": "x" })).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(msg) if msg.contains("option_value")));
    }

    #[test]
    fn test_process_dead_result_carries_output() {
        let err = CoreError::from(SupervisorError::ProcessDead {
            output: "segfault".into(),
        });
        let result = error_result(&err);
        assert!(result.is_error);
        assert!(result.first_text().contains("segfault"));
        let structured = result.structured_content.unwrap();
        assert_eq!(structured["error"], "process_dead");
        assert_eq!(structured["output"], "segfault");
    }
}
