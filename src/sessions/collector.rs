//! Background output collector (C2).
//!
//! One task per active session, spawned right after the session is
//! inserted into the store. It is the sole reader of the child's stdout
//! and stderr pipes for the session's whole lifetime — nothing else ever
//! touches them.
//!
//! Merging is done with a single `select!` loop rather than one task per
//! stream, so the two pipes interleave in roughly the order the OS
//! delivers them instead of being appended stream-by-stream; stdout and
//! stderr are not distinguished in the stored output, matching the "one
//! ordered byte sequence" contract.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::Child;
use tracing::warn;

use super::store::SessionStore;

/// Drive one session's output collection to completion, then promote it.
///
/// Takes ownership of `child`'s stdio; the caller must not have already
/// taken `stdout`/`stderr` from it.
pub async fn run(store: Arc<SessionStore>, pid: u32, mut child: Child) {
    let mut out_lines = child.stdout.take().map(|s| BufReader::new(s).lines());
    let mut err_lines = child.stderr.take().map(|s| BufReader::new(s).lines());

    let mut out_open = out_lines.is_some();
    let mut err_open = err_lines.is_some();

    while out_open || err_open {
        tokio::select! {
            line = read_next(out_lines.as_mut().unwrap()), if out_open => {
                match line {
                    Some(text) => store.append_output(pid, &text).await,
                    None => out_open = false,
                }
            }
            line = read_next(err_lines.as_mut().unwrap()), if err_open => {
                match line {
                    Some(text) => store.append_output(pid, &text).await,
                    None => err_open = false,
                }
            }
        }
    }

    let exit_code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!("session {pid}: wait() failed: {e}");
            None
        }
    };

    store.promote(pid, exit_code, std::time::Instant::now()).await;
}

/// Read one line, with its newline restored, from a line reader. A read
/// error ends that stream's contribution without aborting the worker — it
/// still proceeds to drain the other stream and wait for exit.
async fn read_next<R: AsyncRead + Unpin>(lines: &mut Lines<BufReader<R>>) -> Option<String> {
    match lines.next_line().await {
        Ok(Some(line)) => Some(format!("{line}\n")),
        Ok(None) | Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::session::ActiveSession;
    use std::time::Instant;
    use tokio::process::Command;

    #[tokio::test]
    async fn collects_merged_output_and_promotes_on_exit() {
        let store = Arc::new(SessionStore::new(100));
        let child = Command::new("sh")
            .arg("-c")
            .arg("echo out; echo err 1>&2")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .expect("spawn sh");
        let pid = child.id().expect("pid");

        store
            .insert_active(ActiveSession::new(
                pid,
                "echo out; echo err 1>&2".into(),
                Instant::now(),
            ))
            .await;

        run(Arc::clone(&store), pid, child).await;

        assert!(!store.is_active(pid).await);
        let completed = store.get_completed(pid).await.expect("completed session");
        assert!(completed.final_output.contains("out"));
        assert!(completed.final_output.contains("err"));
        assert_eq!(completed.exit_code, Some(0));
    }
}
