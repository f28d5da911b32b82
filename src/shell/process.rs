//! Low-level process spawning.
//!
//! [`spawn_merged`] is the one spawn path used by the session manager: it
//! runs `<shell> -c "<command>"` with stdout and stderr both piped so the
//! output collector can read them, and `kill_on_drop(true)` so a dropped
//! `Child` (e.g. on an early return before the collector takes over)
//! doesn't leak an orphaned process.

use std::process::Stdio;

use tokio::process::{Child, Command};

/// Spawn `command` under `shell -c`, with merged-capture-ready stdio.
///
/// `cwd`, when `Some`, overrides the working directory; an invalid
/// directory surfaces as a spawn error, same as any other spawn failure.
/// The child inherits the parent's environment unmodified.
pub fn spawn_merged(shell: &str, command: &str, cwd: Option<&str>) -> std::io::Result<Child> {
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.spawn()
}
