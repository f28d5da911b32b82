//! MCP tool definitions and handlers.
//!
//! Six tools, matching spec.md §6's operation surface exactly:
//! `execute_command`, `read_output`, `force_terminate`, `list_sessions`,
//! `list_processes`, `kill_process`. Each handler stringifies its result
//! into the `{content, isError}` envelope and layers a wall-clock budget
//! on top of the manager call per spec.md §5.

use serde_json::{json, Value};
use tracing::warn;

use crate::admission::AdmissionFilter;
use crate::manager::SessionManager;
use crate::procs::{self, KillError};
use crate::util::expand_tilde;

/// Margin added on top of the caller's `timeout_ms` for `execute_command`,
/// covering spawn latency outside the bounded-wait loop itself.
const EXECUTE_MARGIN_MS: u64 = 2_000;
/// Margin added on top of the caller's `timeout_ms` for `read_output`.
const READ_OUTPUT_MARGIN_MS: u64 = 5_000;
/// Wall-clock budget for operations with no caller-supplied timeout.
const FIXED_BUDGET: std::time::Duration = std::time::Duration::from_secs(10);

/// Critical pids `kill_process` refuses to touch even if the caller owns
/// enough privilege to try.
const CRITICAL_PIDS: [u32; 4] = [0, 1, 2, 4];

pub fn all_tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "execute_command",
            "description": "Execute a shell command. If it finishes within timeout_ms, returns its full output. If it's still running, returns its PID and whatever output has accumulated so far — use read_output to keep reading.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The shell command to execute." },
                    "timeout_ms": { "type": "integer", "description": "Milliseconds to wait before returning a PID instead of full output. Default 30000." },
                    "shell": { "type": "string", "description": "Accepted for compatibility; currently ignored — the platform default shell is always used." },
                    "cwd": { "type": "string", "description": "Working directory for the command." }
                },
                "required": ["command"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "read_output",
            "description": "Read new output from a session started by execute_command. Works for both still-running sessions (polls for new output) and completed ones (returns a summary).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pid": { "type": "integer", "description": "PID returned by execute_command." },
                    "timeout_ms": { "type": "integer", "description": "Milliseconds to poll for new output before returning. Default 5000." }
                },
                "required": ["pid"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "force_terminate",
            "description": "Terminate a running session started by execute_command.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pid": { "type": "integer", "description": "PID of the session to terminate." }
                },
                "required": ["pid"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "list_sessions",
            "description": "List currently active sessions started by execute_command.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "list_processes",
            "description": "List processes running on the system (not limited to sessions this tool started).",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }
        }),
        json!({
            "name": "kill_process",
            "description": "Send a termination signal to an arbitrary system process by PID.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pid": { "type": "integer", "description": "PID of the process to kill." }
                },
                "required": ["pid"],
                "additionalProperties": false
            }
        }),
    ]
}

/// Result of an MCP tool call, ready to be serialized into a JSON-RPC response.
pub struct ToolResult {
    pub content: Vec<Value>,
    pub is_error: bool,
}

impl ToolResult {
    fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![json!({ "type": "text", "text": text.into() })],
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![json!({ "type": "text", "text": text.into() })],
            is_error: true,
        }
    }
}

pub async fn handle_tool_call(
    name: &str,
    args: &Value,
    manager: &SessionManager,
    admission: &AdmissionFilter,
) -> ToolResult {
    match name {
        "execute_command" => handle_execute_command(args, manager, admission).await,
        "read_output" => handle_read_output(args, manager).await,
        "force_terminate" => handle_force_terminate(args, manager).await,
        "list_sessions" => handle_list_sessions(manager).await,
        "list_processes" => handle_list_processes().await,
        "kill_process" => handle_kill_process(args).await,
        _ => ToolResult::error(format!("Unknown tool: {name}")),
    }
}

/// Pull `pid` out of `args`, rejecting anything that isn't a plain
/// non-negative JSON integer (mirrors the original's `isinstance(pid, int)`
/// check — a JSON float or string pid is a validation error, not a
/// silent coercion).
fn parse_pid(args: &Value) -> Result<u32, ToolResult> {
    match args.get("pid").and_then(Value::as_u64) {
        Some(pid) if pid <= u64::from(u32::MAX) => Ok(pid as u32),
        _ => Err(ToolResult::error("Error: PID must be an integer")),
    }
}

async fn handle_execute_command(
    args: &Value,
    manager: &SessionManager,
    admission: &AdmissionFilter,
) -> ToolResult {
    let command = args.get("command").and_then(Value::as_str).unwrap_or("").trim();
    if command.is_empty() {
        return ToolResult::error("Error: Command cannot be empty");
    }

    let validation = admission.validate(command);
    if !validation.valid {
        let reason = validation.reason.unwrap_or_else(|| "rejected".to_string());
        return ToolResult::error(format!("Error: {reason}"));
    }

    let timeout_ms = args.get("timeout_ms").and_then(Value::as_u64).unwrap_or(30_000);
    let cwd = args.get("cwd").and_then(Value::as_str).map(expand_tilde);

    let budget = std::time::Duration::from_millis(timeout_ms + EXECUTE_MARGIN_MS);
    let result = match tokio::time::timeout(budget, manager.execute(command, timeout_ms, cwd.as_deref())).await {
        Ok(result) => result,
        Err(_) => {
            warn!(command, "execute_command exceeded its handler-level budget");
            return ToolResult::error("Error: command execution timed out");
        }
    };

    let Some(pid) = result.pid else {
        return ToolResult::error(result.output);
    };

    if result.blocked {
        let mut text = format!("Command started with PID {pid}");
        if !result.output.trim().is_empty() {
            text.push_str(&format!("\nInitial output:\n{}", result.output));
        }
        text.push_str("\nCommand is still running. Use read_output to get more output.");
        ToolResult::text(text)
    } else {
        let output = result.output.trim();
        ToolResult::text(if output.is_empty() { "(no output)".to_string() } else { output.to_string() })
    }
}

async fn handle_read_output(args: &Value, manager: &SessionManager) -> ToolResult {
    let pid = match parse_pid(args) {
        Ok(pid) => pid,
        Err(result) => return result,
    };
    let timeout_ms = args.get("timeout_ms").and_then(Value::as_u64).unwrap_or(5_000);

    let budget = std::time::Duration::from_millis(timeout_ms + READ_OUTPUT_MARGIN_MS);
    let result = match tokio::time::timeout(budget, manager.read_output(pid, timeout_ms)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(pid, "read_output exceeded its handler-level budget");
            return ToolResult::text("No new output available (timeout reached)");
        }
    };

    match result {
        None => ToolResult::error(format!("Error: No session found for PID {pid}")),
        Some(text) if text.is_empty() => {
            ToolResult::text("No new output available (timeout reached)")
        }
        Some(text) => ToolResult::text(text),
    }
}

async fn handle_force_terminate(args: &Value, manager: &SessionManager) -> ToolResult {
    let pid = match parse_pid(args) {
        Ok(pid) => pid,
        Err(result) => return result,
    };

    match tokio::time::timeout(FIXED_BUDGET, manager.force_terminate(pid)).await {
        Ok(true) => ToolResult::text(format!("Successfully initiated termination of session {pid}")),
        Ok(false) => ToolResult::text("No active session found"),
        Err(_) => ToolResult::error(format!("Error: force_terminate timed out for PID {pid}")),
    }
}

async fn handle_list_sessions(manager: &SessionManager) -> ToolResult {
    let sessions = match tokio::time::timeout(FIXED_BUDGET, manager.list_active()).await {
        Ok(sessions) => sessions,
        Err(_) => return ToolResult::error("Error: list_sessions timed out"),
    };

    if sessions.is_empty() {
        return ToolResult::text("No active sessions");
    }

    let lines: Vec<String> = sessions
        .iter()
        .map(|s| {
            format!(
                "PID: {}, Blocked: {}, Runtime: {:.1}s",
                s.pid, s.blocked, s.runtime_seconds
            )
        })
        .collect();
    ToolResult::text(lines.join("\n"))
}

async fn handle_list_processes() -> ToolResult {
    let result = tokio::time::timeout(FIXED_BUDGET, async {
        tokio::task::spawn_blocking(procs::list_processes)
            .await
            .unwrap_or_default()
    })
    .await;

    let processes = match result {
        Ok(processes) => processes,
        Err(_) => return ToolResult::error("Error: Process listing timed out"),
    };

    if processes.is_empty() {
        return ToolResult::text("No processes found or unable to list processes");
    }

    let lines: Vec<String> = processes
        .iter()
        .map(|p| {
            format!(
                "PID: {}, Command: {}, CPU: {}, Memory: {}",
                p.pid, p.command, p.cpu, p.memory
            )
        })
        .collect();
    ToolResult::text(lines.join("\n"))
}

async fn handle_kill_process(args: &Value) -> ToolResult {
    let pid = match args.get("pid").and_then(Value::as_i64) {
        Some(pid) => pid,
        None => return ToolResult::error("Error: PID must be an integer"),
    };

    if pid <= 0 {
        return ToolResult::error("Error: Invalid PID");
    }
    let pid = pid as u32;
    if CRITICAL_PIDS.contains(&pid) {
        return ToolResult::error(format!("Error: Cannot kill system critical process {pid}"));
    }

    let result = tokio::time::timeout(FIXED_BUDGET, async {
        tokio::task::spawn_blocking(move || procs::kill_process(pid)).await
    })
    .await;

    match result {
        Ok(Ok(Ok(()))) => {
            #[cfg(windows)]
            let message = format!("Successfully terminated process {pid}");
            #[cfg(not(windows))]
            let message = format!("Successfully sent SIGTERM to process {pid}");
            ToolResult::text(message)
        }
        Ok(Ok(Err(KillError::NotFound(pid)))) => ToolResult::error(format!("Process {pid} not found")),
        Ok(Ok(Err(KillError::PermissionDenied(pid)))) => {
            ToolResult::error(format!("Permission denied: cannot kill process {pid}"))
        }
        Ok(Err(_)) => ToolResult::error(format!("Error killing process {pid}")),
        Err(_) => ToolResult::error(format!("Timeout while trying to kill process {pid}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn manager() -> SessionManager {
        SessionManager::new(&Config::default())
    }

    fn admission() -> AdmissionFilter {
        AdmissionFilter::new(std::iter::empty())
    }

    #[tokio::test]
    async fn execute_empty_command_is_an_error() {
        let result = handle_execute_command(&json!({"command": ""}), &manager(), &admission()).await;
        assert!(result.is_error);
        let text = result.content[0]["text"].as_str().unwrap();
        assert_eq!(text, "Error: Command cannot be empty");
    }

    #[tokio::test]
    async fn execute_dangerous_command_is_rejected_before_spawn() {
        let result =
            handle_execute_command(&json!({"command": "rm -rf /"}), &manager(), &admission()).await;
        assert!(result.is_error);
        let text = result.content[0]["text"].as_str().unwrap();
        assert!(text.starts_with("Error:"));
    }

    #[tokio::test]
    async fn execute_quick_command_returns_raw_output() {
        let result = handle_execute_command(
            &json!({"command": "echo hello", "timeout_ms": 5000}),
            &manager(),
            &admission(),
        )
        .await;
        assert!(!result.is_error);
        let text = result.content[0]["text"].as_str().unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn read_output_rejects_non_integer_pid() {
        let result = handle_read_output(&json!({"pid": "abc"}), &manager()).await;
        assert!(result.is_error);
        assert_eq!(result.content[0]["text"].as_str().unwrap(), "Error: PID must be an integer");
    }

    #[tokio::test]
    async fn read_output_unknown_pid_is_an_error() {
        let result = handle_read_output(&json!({"pid": 999_999}), &manager()).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn list_sessions_empty_reports_none_active() {
        let result = handle_list_sessions(&manager()).await;
        assert!(!result.is_error);
        assert_eq!(result.content[0]["text"].as_str().unwrap(), "No active sessions");
    }

    #[tokio::test]
    async fn force_terminate_unknown_pid_is_non_error_informational() {
        let result = handle_force_terminate(&json!({"pid": 999_999}), &manager()).await;
        assert!(!result.is_error);
        assert_eq!(result.content[0]["text"].as_str().unwrap(), "No active session found");
    }

    #[tokio::test]
    async fn kill_process_refuses_critical_pids() {
        let result = handle_kill_process(&json!({"pid": 1})).await;
        assert!(result.is_error);
        assert_eq!(
            result.content[0]["text"].as_str().unwrap(),
            "Error: Cannot kill system critical process 1"
        );
    }

    #[tokio::test]
    async fn kill_process_refuses_negative_pid() {
        let result = handle_kill_process(&json!({"pid": -5})).await;
        assert!(result.is_error);
        assert_eq!(result.content[0]["text"].as_str().unwrap(), "Error: Invalid PID");
    }
}
