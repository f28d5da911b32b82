//! Tool handlers (C6): the MCP JSON-RPC/stdio adapter layer.
//!
//! [`protocol`] is the transport — reads one JSON-RPC request per line
//! from stdin, writes one response per line to stdout. [`tools`] maps
//! each recognised tool name to a handler that calls into
//! [`crate::manager::SessionManager`]/[`crate::procs`] and renders the
//! result as the `{content, isError}` envelope this spec's external
//! interface is built around.

pub mod protocol;
pub mod tools;
