#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # termsess-mcp
//!
//! A terminal session manager exposed to AI agents as an MCP tool server.
//!
//! termsess-mcp speaks JSON-RPC 2.0 over stdio (the MCP stdio transport) and
//! exposes six tools: `execute_command`, `read_output`, `force_terminate`,
//! `list_sessions`, `list_processes`, `kill_process`. Commands run in a
//! bounded-wait model — `execute_command` returns full output if the child
//! finishes quickly, or a PID to poll with `read_output` if it doesn't.

use std::sync::Arc;

use clap::Parser;
use termsess_mcp::{config::Config, mcp, AdmissionFilter, SessionManager};
use tracing::info;

/// A terminal session manager exposed over MCP.
#[derive(Parser)]
#[command(name = "termsess-mcp", version)]
struct Cli {
    /// Path to a TOML config file. Falls back to compiled defaults if omitted.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    info!("termsess-mcp v{} starting", env!("CARGO_PKG_VERSION"));
    info!(shell = %config.shell.default_shell, max_completed = config.sessions.max_completed, "configured");

    let manager = Arc::new(SessionManager::new(&config));
    let admission = Arc::new(AdmissionFilter::new(config.admission.extra_denylist.clone()));

    tokio::select! {
        () = mcp::protocol::run_stdio(manager, admission) => {
            info!("termsess-mcp shutting down (stdin closed)");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("termsess-mcp shutting down (signal received)");
        }
    }
}
