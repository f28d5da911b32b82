//! In-memory session registry: active sessions keyed by pid, plus a
//! bounded FIFO of completed sessions.
//!
//! Both collections live behind a single [`tokio::sync::Mutex`], taken only
//! for O(1) or small-O(n) bookkeeping. It is never held across a read from
//! a child's stdio, across a process wait, or across any other `.await`
//! that isn't itself a lock acquisition — see [`crate::sessions::collector`]
//! for the background worker that owns the child's stdio exclusively.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::Mutex;

use super::session::{ActiveInfo, ActiveSession, CompletedSession};

struct Inner {
    active: HashMap<u32, ActiveSession>,
    completed: HashMap<u32, CompletedSession>,
}

/// Shared registry of active and completed sessions.
///
/// Completed-session eviction picks the entry with the smallest pid, not
/// the oldest insertion — this is not true FIFO order (pids wrap on POSIX
/// and aren't monotonic on Windows) but it is the contract this store
/// implements, matching the behavior it was modeled on rather than the
/// `ended_at`-ordered alternative.
pub struct SessionStore {
    inner: Mutex<Inner>,
    max_completed: usize,
    /// Defensive per-session output cap in bytes. `0` means unbounded,
    /// matching spec.md's "`output` grows only by append" contract;
    /// capping is a pure addition per spec.md §9, never a contract change.
    output_cap_bytes: usize,
}

impl SessionStore {
    pub fn new(max_completed: usize) -> Self {
        Self::with_output_cap(max_completed, 0)
    }

    pub fn with_output_cap(max_completed: usize, output_cap_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                active: HashMap::new(),
                completed: HashMap::new(),
            }),
            max_completed,
            output_cap_bytes,
        }
    }

    /// Insert a freshly spawned session. Precondition: `session.pid` is
    /// absent from both the active and completed maps.
    pub async fn insert_active(&self, session: ActiveSession) {
        let mut inner = self.inner.lock().await;
        inner.active.insert(session.pid, session);
    }

    pub async fn is_active(&self, pid: u32) -> bool {
        self.inner.lock().await.active.contains_key(&pid)
    }

    /// Append a chunk of merged output to an active session. No-op if the
    /// session has already been promoted (the collector raced a concurrent
    /// promotion from elsewhere, which cannot currently happen but is kept
    /// harmless rather than unwrap-and-panic).
    ///
    /// If `output_cap_bytes` is nonzero and the session's buffer has
    /// already reached it, the chunk is dropped and a one-time truncation
    /// marker is appended to `output` instead. This is additive: it never
    /// changes the ordering or append-only guarantees spec.md states, it
    /// just bounds total retained bytes for a pathologically chatty child.
    /// The marker text is the only signal of truncation — there is no
    /// separate flag to keep in sync, since nothing would read one.
    pub async fn append_output(&self, pid: u32, data: &str) {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.active.get_mut(&pid) else {
            return;
        };
        if self.output_cap_bytes == 0 || session.output.len() < self.output_cap_bytes {
            session.output.push_str(data);
            if self.output_cap_bytes > 0 && session.output.len() >= self.output_cap_bytes {
                session.output.truncate(self.output_cap_bytes);
                session
                    .output
                    .push_str("\n[output truncated: buffer cap reached]\n");
            }
        }
    }

    pub async fn mark_blocked(&self, pid: u32) {
        if let Some(session) = self.inner.lock().await.active.get_mut(&pid) {
            session.blocked = true;
        }
    }

    /// The full output captured so far, from whichever store currently
    /// holds the pid. `None` if the pid is in neither.
    pub async fn output_snapshot(&self, pid: u32) -> Option<String> {
        let inner = self.inner.lock().await;
        if let Some(session) = inner.active.get(&pid) {
            return Some(session.output.clone());
        }
        inner.completed.get(&pid).map(|c| c.final_output.clone())
    }

    /// Returns `output[read_cursor..]` and advances `read_cursor` to the
    /// current end of output. `None` if the pid is not active (the caller
    /// falls back to the completed store).
    pub async fn take_new_output(&self, pid: u32) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let session = inner.active.get_mut(&pid)?;
        let slice = session.output[session.read_cursor..].to_string();
        session.read_cursor = session.output.len();
        Some(slice)
    }

    pub async fn get_completed(&self, pid: u32) -> Option<CompletedSession> {
        self.inner.lock().await.completed.get(&pid).cloned()
    }

    /// Atomically move `pid` from active to completed, evicting the
    /// completed entry with the smallest pid if this insertion overflows
    /// `max_completed`.
    pub async fn promote(&self, pid: u32, exit_code: Option<i32>, ended_at: Instant) {
        let mut inner = self.inner.lock().await;
        let Some(active) = inner.active.remove(&pid) else {
            return;
        };
        let completed = CompletedSession {
            pid,
            command: active.command,
            final_output: active.output,
            exit_code,
            started_at: active.started_at,
            ended_at,
        };
        inner.completed.insert(pid, completed);

        if inner.completed.len() > self.max_completed {
            if let Some(&evict) = inner.completed.keys().min() {
                inner.completed.remove(&evict);
            }
        }
    }

    pub async fn list_active(&self) -> Vec<ActiveInfo> {
        self.inner
            .lock()
            .await
            .active
            .values()
            .map(ActiveInfo::from)
            .collect()
    }

    pub async fn list_completed(&self) -> Vec<CompletedSession> {
        self.inner.lock().await.completed.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(pid: u32) -> ActiveSession {
        ActiveSession::new(pid, format!("echo {pid}"), Instant::now())
    }

    #[tokio::test]
    async fn promote_moves_pid_from_active_to_completed() {
        let store = SessionStore::new(100);
        store.insert_active(session(10)).await;
        store.append_output(10, "hello\n").await;
        store.promote(10, Some(0), Instant::now()).await;

        assert!(!store.is_active(10).await);
        let completed = store.get_completed(10).await.expect("promoted session");
        assert_eq!(completed.final_output, "hello\n");
        assert_eq!(completed.exit_code, Some(0));
    }

    #[tokio::test]
    async fn overflow_evicts_smallest_pid_not_oldest() {
        let store = SessionStore::new(2);
        for pid in [300, 100, 200] {
            store.insert_active(session(pid)).await;
            store.promote(pid, Some(0), Instant::now()).await;
        }
        // 300 was inserted first and should be evicted under true FIFO,
        // but eviction targets the smallest pid (100) instead.
        assert!(store.get_completed(100).await.is_none());
        assert!(store.get_completed(200).await.is_some());
        assert!(store.get_completed(300).await.is_some());
    }

    #[tokio::test]
    async fn output_cap_truncates_with_marker_instead_of_growing_unbounded() {
        let store = SessionStore::with_output_cap(100, 10);
        store.insert_active(session(1)).await;
        store.append_output(1, "0123456789").await;
        store.append_output(1, "more data that should be dropped").await;

        let snapshot = store.output_snapshot(1).await.unwrap();
        assert!(snapshot.starts_with("0123456789"));
        assert!(snapshot.contains("[output truncated"));
        assert!(!snapshot.contains("more data"));
    }

    #[tokio::test]
    async fn take_new_output_advances_cursor_even_when_empty() {
        let store = SessionStore::new(100);
        store.insert_active(session(1)).await;

        let first = store.take_new_output(1).await.unwrap();
        assert_eq!(first, "");
        store.append_output(1, "abc").await;
        let second = store.take_new_output(1).await.unwrap();
        assert_eq!(second, "abc");
        let third = store.take_new_output(1).await.unwrap();
        assert_eq!(third, "");
    }
}
