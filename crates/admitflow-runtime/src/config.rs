//! Runtime configuration loaded from TOML.
//!
//! Precedence for every knob: CLI flag, then environment (log filter only),
//! then config file, then built-in default.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Handling of a batch rejected as invalid input during replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OnInvalid {
    /// Stop the run with an error.
    #[default]
    Abort,
    /// Log a warning and move on; state is untouched.
    Skip,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_filter: Option<String>,
    pub socket_path: Option<String>,
    pub replay: ReplayConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    pub on_invalid: OnInvalid,
}

impl Config {
    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn log_filter(&self, cli: Option<&str>) -> String {
        let env = std::env::var("ADMITFLOW_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok();
        resolve_log_filter(cli, env.as_deref(), self.log_filter.as_deref())
    }

    pub fn socket_path(&self, cli: Option<String>) -> String {
        cli.or_else(|| self.socket_path.clone())
            .unwrap_or_else(default_socket_path)
    }

    pub fn on_invalid(&self, cli: Option<OnInvalid>) -> OnInvalid {
        cli.unwrap_or(self.replay.on_invalid)
    }
}

pub(crate) fn resolve_log_filter(
    cli: Option<&str>,
    env: Option<&str>,
    file: Option<&str>,
) -> String {
    cli.or(env).or(file).unwrap_or("info").to_string()
}

/// Default socket path using $USER for per-user isolation.
pub fn default_socket_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return format!("{dir}/admitflow/admitflow.sock");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("/tmp/admitflow-{user}/admitflow.sock")
}
