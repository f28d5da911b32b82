//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `TERMSESS_MCP_SHELL`,
//!    `TERMSESS_MCP_MAX_COMPLETED`, `TERMSESS_MCP_LOG_LEVEL`
//! 2. **Config file** — path via `--config <path>`
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [shell]
//! default_shell = "/bin/sh"
//!
//! [sessions]
//! max_completed = 100        # bounded completed-session FIFO (spec.md §3)
//! output_buffer_cap_bytes = 0 # 0 = unbounded (spec.md §9 "may cap... is a pure addition")
//!
//! [admission]
//! extra_denylist = ["custom-tool"]
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Shell defaults used when a request doesn't specify overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    /// Shell binary invoked as `<default_shell> -c "<command>"` (default `/bin/sh`).
    #[serde(default = "default_shell")]
    pub default_shell: String,
}

/// Session store / output-retention settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    /// Maximum completed sessions retained before eviction (spec.md §3, default 100).
    #[serde(default = "default_max_completed")]
    pub max_completed: usize,
    /// Defensive per-session output cap in bytes. `0` disables the cap,
    /// matching the spec's unbounded-append contract; a nonzero value is
    /// a pure addition (spec.md §9) and does not change any contract —
    /// it is enforced by the output collector truncating with a marker.
    #[serde(default = "default_output_buffer_cap_bytes")]
    pub output_buffer_cap_bytes: usize,
}

/// Admission-filter overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionConfig {
    /// Extra base-command tokens appended to the compiled-in denylist.
    #[serde(default)]
    pub extra_denylist: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}
fn default_max_completed() -> usize {
    100
}
fn default_output_buffer_cap_bytes() -> usize {
    0
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            default_shell: default_shell(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_completed: default_max_completed(),
            output_buffer_cap_bytes: default_output_buffer_cap_bytes(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            extra_denylist: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: ShellConfig::default(),
            sessions: SessionsConfig::default(),
            admission: AdmissionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure — matching
    /// the teacher's "bad config is an operator error, fail loud at
    /// startup" behavior rather than limping along with half-applied
    /// settings).
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else {
            Config::default()
        };

        if let Ok(shell) = std::env::var("TERMSESS_MCP_SHELL") {
            config.shell.default_shell = shell;
        }
        if let Ok(max_completed) = std::env::var("TERMSESS_MCP_MAX_COMPLETED") {
            if let Ok(n) = max_completed.parse() {
                config.sessions.max_completed = n;
            }
        }
        if let Ok(level) = std::env::var("TERMSESS_MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.shell.default_shell, "/bin/sh");
        assert_eq!(config.sessions.max_completed, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn load_without_path_or_env_falls_back_to_defaults() {
        // SAFETY: test-only env mutation, no concurrent access to these vars
        // from other tests in this process.
        std::env::remove_var("TERMSESS_MCP_SHELL");
        std::env::remove_var("TERMSESS_MCP_MAX_COMPLETED");
        std::env::remove_var("TERMSESS_MCP_LOG_LEVEL");
        let config = Config::load(None);
        assert_eq!(config.shell.default_shell, "/bin/sh");
        assert_eq!(config.sessions.max_completed, 100);
    }
}
