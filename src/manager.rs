//! Session manager (C3) and the bounded-wait execution protocol (C4).
//!
//! [`SessionManager`] is the one place that ties spawning
//! ([`crate::shell::process`]), the output collector
//! ([`crate::sessions::collector`]), and the shared registry
//! ([`crate::sessions::store::SessionStore`]) together. It owns no child
//! process handles directly — once a collector task is spawned, it is the
//! sole owner of that child until it promotes the session, and the
//! manager only ever talks to the store or to the OS pid.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ManagerError;
use crate::sessions::collector;
use crate::sessions::session::{ActiveInfo, ActiveSession, CompletedSession};
use crate::sessions::store::SessionStore;
use crate::shell::process::spawn_merged;

/// How long `execute`'s post-exit drain step sleeps before re-checking —
/// see [`bounded_wait`].
const BOUNDED_WAIT_POLL: Duration = Duration::from_millis(100);
/// Poll interval for `read_output` against an active session.
const READ_OUTPUT_POLL: Duration = Duration::from_millis(300);
/// Grace period between `force_terminate`'s initial signal and the
/// follow-up kill if the process hasn't exited.
const FORCE_KILL_GRACE: Duration = Duration::from_secs(1);

/// Outcome of [`SessionManager::execute`].
///
/// `pid = None` is the Rust rendition of the spec's `pid = -1` sentinel —
/// `u32` can't represent -1, so spawn failure is modeled as the absence
/// of a pid rather than a negative one. No session is created in that
/// case.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub pid: Option<u32>,
    pub output: String,
    pub blocked: bool,
}

/// Spawns, tracks, polls, and terminates child processes on behalf of
/// callers. Cheaply cloneable (an `Arc` around the shared store) so it can
/// be handed to the MCP stdio loop and to any background task it spawns.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<SessionStore>,
    shell: String,
}

impl SessionManager {
    pub fn new(config: &Config) -> Self {
        Self {
            store: Arc::new(SessionStore::with_output_cap(
                config.sessions.max_completed,
                config.sessions.output_buffer_cap_bytes,
            )),
            shell: config.shell.default_shell.clone(),
        }
    }

    /// §4.3.1: spawn `command`, start its collector, then enter the
    /// bounded wait and return whatever the wait yields.
    pub async fn execute(&self, command: &str, timeout_ms: u64, cwd: Option<&str>) -> ExecutionResult {
        let child = match spawn_merged(&self.shell, command, cwd) {
            Ok(child) => child,
            Err(e) => {
                let err = ManagerError::SpawnFailed(e.to_string());
                warn!(command, "{err}");
                return ExecutionResult {
                    pid: None,
                    output: format!("Error executing command: {err}"),
                    blocked: false,
                };
            }
        };

        let Some(pid) = child.id() else {
            return ExecutionResult {
                pid: None,
                output: "Error: Failed to get process ID. The command could not be executed."
                    .to_string(),
                blocked: false,
            };
        };

        info!(pid, command, "spawned session");
        self.store
            .insert_active(ActiveSession::new(pid, command.to_string(), Instant::now()))
            .await;

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            collector::run(store, pid, child).await;
        });

        let (exited, snapshot) =
            bounded_wait(&self.store, pid, Duration::from_millis(timeout_ms)).await;

        if !exited {
            info!(pid, "execute returned with session still running (blocked)");
        }

        ExecutionResult {
            pid: Some(pid),
            output: snapshot,
            blocked: !exited,
        }
    }

    /// §4.3.2. Returns `None` only when `pid` is in neither store.
    pub async fn read_output(&self, pid: u32, timeout_ms: u64) -> Option<String> {
        if self.store.is_active(pid).await {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms);
            loop {
                match self.store.take_new_output(pid).await {
                    Some(chunk) if !chunk.is_empty() => return Some(chunk),
                    Some(_) => {
                        if Instant::now() >= deadline {
                            return Some(String::new());
                        }
                    }
                    // Promoted to completed between our `is_active` check and
                    // this poll — fall through to the completed-store lookup.
                    None => break,
                }
                tokio::time::sleep(READ_OUTPUT_POLL).await;
            }
        }

        let completed = self.store.get_completed(pid).await;
        if completed.is_none() {
            debug!("{}", ManagerError::SessionNotFound(pid));
        }
        completed.map(|completed| format_completed_summary(&completed))
    }

    /// §4.3.3. Returns `false` without side effects if `pid` is not
    /// active. Otherwise signals it and returns `true` immediately —
    /// actual exit is observed asynchronously by the collector.
    pub async fn force_terminate(&self, pid: u32) -> bool {
        if !self.store.is_active(pid).await {
            debug!("{}", ManagerError::SessionNotFound(pid));
            return false;
        }

        signal_interrupt(pid);
        info!(pid, "force_terminate: sent interrupt, scheduling kill escalation");

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            tokio::time::sleep(FORCE_KILL_GRACE).await;
            if store.is_active(pid).await {
                warn!(pid, "force_terminate: process survived grace period, escalating to kill");
                signal_kill(pid);
            }
        });

        true
    }

    pub async fn list_active(&self) -> Vec<ActiveInfo> {
        self.store.list_active().await
    }

    pub async fn list_completed(&self) -> Vec<CompletedSession> {
        self.store.list_completed().await
    }
}

/// §4.4: the bounded-wait loop. Polls every 100 ms for up to `timeout`,
/// watching the store rather than the child directly — the collector is
/// the exclusive owner of the child's stdio and exit status, so "has the
/// child exited" is observed here as "has the session been promoted to
/// completed", which only happens after the collector has fully drained
/// output and captured the exit code. That makes the original protocol's
/// extra 100 ms post-exit drain delay unnecessary: by the time promotion
/// is visible, draining is already done.
async fn bounded_wait(store: &SessionStore, pid: u32, timeout: Duration) -> (bool, String) {
    let deadline = Instant::now() + timeout;
    loop {
        if !store.is_active(pid).await {
            let snapshot = store.output_snapshot(pid).await.unwrap_or_default();
            return (true, snapshot);
        }
        if Instant::now() >= deadline {
            store.mark_blocked(pid).await;
            let snapshot = store.output_snapshot(pid).await.unwrap_or_default();
            return (false, snapshot);
        }
        tokio::time::sleep(BOUNDED_WAIT_POLL).await;
    }
}

fn format_completed_summary(completed: &CompletedSession) -> String {
    let exit_code = completed
        .exit_code
        .map_or_else(|| "None".to_string(), |c| c.to_string());
    format!(
        "Process completed with exit code {exit_code}\nRuntime: {:.2}s\nFinal output:\n{}",
        completed.runtime().as_secs_f64(),
        completed.final_output,
    )
}

#[cfg(unix)]
fn signal_interrupt(pid: u32) {
    #[allow(clippy::cast_possible_wrap)]
    let ret = unsafe { libc::kill(pid as i32, libc::SIGINT) };
    if ret != 0 {
        let err = ManagerError::SignalFailed(pid, std::io::Error::last_os_error().to_string());
        warn!("{err}");
    }
}

#[cfg(unix)]
fn signal_kill(pid: u32) {
    #[allow(clippy::cast_possible_wrap)]
    let ret = unsafe { libc::kill(pid as i32, libc::SIGKILL) };
    if ret != 0 {
        let err = ManagerError::SignalFailed(pid, std::io::Error::last_os_error().to_string());
        warn!("{err}");
    }
}

#[cfg(not(unix))]
fn signal_interrupt(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .status();
}

#[cfg(not(unix))]
fn signal_kill(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::load(None)
    }

    #[tokio::test]
    async fn execute_short_command_returns_unblocked_with_output() {
        let manager = SessionManager::new(&test_config());
        let result = manager.execute("echo hello", 2000, None).await;
        assert!(!result.blocked);
        assert!(result.pid.is_some());
        assert!(result.output.contains("hello"));
    }

    #[tokio::test]
    async fn execute_long_command_blocks_then_read_output_drains_it() {
        let manager = SessionManager::new(&test_config());
        let result = manager.execute("sleep 0.4 && echo done", 100, None).await;
        assert!(result.blocked);
        let pid = result.pid.expect("pid");

        // First read_output may see nothing new yet; poll until the
        // completed summary shows up.
        let mut saw_done = false;
        for _ in 0..20 {
            if let Some(text) = manager.read_output(pid, 50).await {
                if text.contains("done") {
                    saw_done = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(saw_done, "expected eventual output containing 'done'");
    }

    #[tokio::test]
    async fn read_output_unknown_pid_returns_none() {
        let manager = SessionManager::new(&test_config());
        assert!(manager.read_output(999_999, 50).await.is_none());
    }

    #[tokio::test]
    async fn force_terminate_unknown_pid_returns_false() {
        let manager = SessionManager::new(&test_config());
        assert!(!manager.force_terminate(999_999).await);
    }

    #[tokio::test]
    async fn force_terminate_running_session_eventually_completes() {
        let manager = SessionManager::new(&test_config());
        let result = manager.execute("sleep 5", 50, None).await;
        assert!(result.blocked);
        let pid = result.pid.expect("pid");

        assert!(manager.force_terminate(pid).await);

        let mut completed = false;
        for _ in 0..40 {
            let all_completed = manager.list_completed().await;
            if all_completed.iter().any(|c| c.pid == pid) {
                completed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(completed, "expected session to complete after force_terminate");
    }
}
