//! Session data model: one entry per spawned child, active or completed.
//!
//! Mirrors the data model's two shapes directly: an [`ActiveSession`] is
//! mutated in place by the output collector and by `read_output`; on exit
//! it is consumed to build a [`CompletedSession`], which never changes
//! again.

use std::time::{Duration, Instant};

/// A spawned child process whose exit has not yet been observed by the
/// collector.
#[derive(Debug)]
pub struct ActiveSession {
    /// OS process id, unique within the active set.
    pub pid: u32,
    /// The original command string, verbatim.
    pub command: String,
    /// When the child was spawned.
    pub started_at: Instant,
    /// Append-only merged stdout+stderr. Never truncated or edited in place.
    pub output: String,
    /// Offset into `output` already delivered to a caller via `read_output`.
    /// Monotonically non-decreasing; discarded on promotion.
    pub read_cursor: usize,
    /// Set exactly once (false -> true), only inside `execute`'s bounded wait,
    /// when the wait expires with the child still alive.
    pub blocked: bool,
}

impl ActiveSession {
    pub fn new(pid: u32, command: String, started_at: Instant) -> Self {
        Self {
            pid,
            command,
            started_at,
            output: String::new(),
            read_cursor: 0,
            blocked: false,
        }
    }
}

/// A session whose exit has been observed and promoted out of the active set.
#[derive(Debug, Clone)]
pub struct CompletedSession {
    pub pid: u32,
    pub command: String,
    /// The full concatenated output captured while the session was active.
    pub final_output: String,
    /// `None` if the process was killed before an exit code became available.
    pub exit_code: Option<i32>,
    pub started_at: Instant,
    pub ended_at: Instant,
}

impl CompletedSession {
    pub fn runtime(&self) -> Duration {
        self.ended_at.saturating_duration_since(self.started_at)
    }
}

/// Snapshot returned by `list_active`, computed against the current wall clock.
#[derive(Debug, Clone)]
pub struct ActiveInfo {
    pub pid: u32,
    pub command: String,
    pub blocked: bool,
    pub runtime_seconds: f64,
    pub started_at: Instant,
}

impl From<&ActiveSession> for ActiveInfo {
    fn from(session: &ActiveSession) -> Self {
        Self {
            pid: session.pid,
            command: session.command.clone(),
            blocked: session.blocked,
            runtime_seconds: session.started_at.elapsed().as_secs_f64(),
            started_at: session.started_at,
        }
    }
}
