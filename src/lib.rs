#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_async)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! termsess-mcp library — a terminal session manager exposed to AI agents
//! as an MCP tool server over stdio.
//!
//! - `config` — configuration loading (file + env, precedence env > file > default)
//! - `sessions` — in-memory session registry, output collector, active/completed session types
//! - `shell` — process spawning with merged stdout/stderr
//! - `manager` — session lifecycle (spawn, bounded wait, read, terminate)
//! - `admission` — denylist/pattern command filter applied before spawn
//! - `procs` — external process enumeration and kill, independent of sessions this crate started
//! - `mcp` — JSON-RPC/stdio transport and tool handlers
//! - `error` — internal error taxonomy
//! - `util` — small shared helpers

pub mod admission;
pub mod config;
pub mod error;
pub mod manager;
pub mod mcp;
pub mod procs;
pub mod sessions;
pub mod shell;
pub mod util;

pub use admission::AdmissionFilter;
pub use config::Config;
pub use manager::SessionManager;
