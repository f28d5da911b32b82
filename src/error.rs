//! Internal error taxonomy.
//!
//! These are programmer-facing failures, distinct from the plain
//! `{valid, reason}` value the admission filter returns for a rejected
//! command — a rejection is data the caller inspects, not a failure here.

use thiserror::Error;

/// Errors raised by [`crate::manager::SessionManager`] and its collaborators.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("no active session for pid {0}")]
    SessionNotFound(u32),

    #[error("failed to signal pid {0}: {1}")]
    SignalFailed(u32, String),
}
