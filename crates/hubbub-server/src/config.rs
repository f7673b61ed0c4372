//! Server configuration: TOML file + CLI overrides.

use hubbub_core::{RelayError, RelayResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            path: default_path(),
            data_dir: default_data_dir(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

fn default_port() -> u16 {
    8080
}
fn default_path() -> String {
    "/ws".to_string()
}
fn default_data_dir() -> String {
    "~/.hubbub/data".to_string()
}
fn default_idle_timeout() -> u64 {
    3600
}

/// Resolved server configuration (paths expanded, CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub path: String,
    pub data_dir: PathBuf,
    pub idle_timeout: u64,
}

impl ServerConfig {
    /// Load config from a TOML file, then apply CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        cli_port: Option<u16>,
        cli_path: Option<&str>,
        cli_data_dir: Option<&str>,
    ) -> RelayResult<Self> {
        let file_config = if let Some(path) = config_path {
            let expanded = expand_tilde(path);
            if expanded.exists() {
                info!(path = %expanded.display(), "loading config file");
                let content = std::fs::read_to_string(&expanded)?;
                toml::from_str::<ConfigFile>(&content)
                    .map_err(|e| RelayError::Other(format!("config parse error: {e}")))?
            } else {
                info!(path = %expanded.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
        } else {
            ConfigFile::default()
        };

        let port = cli_port.unwrap_or(file_config.server.port);
        let path = cli_path
            .map(|s| s.to_string())
            .unwrap_or(file_config.server.path);
        let data_dir = cli_data_dir
            .map(|s| s.to_string())
            .unwrap_or(file_config.server.data_dir);

        Ok(Self {
            port,
            path,
            data_dir: expand_tilde_str(&data_dir),
            idle_timeout: file_config.server.idle_timeout,
        })
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    expand_tilde_str(&s)
}

fn expand_tilde_str(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_conventions() {
        let cfg = ServerConfig::load(None, None, None, None).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.path, "/ws");
        assert_eq!(cfg.idle_timeout, 3600);
    }

    #[test]
    fn cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(&file, "[server]\nport = 9000\npath = \"/chat\"\n").unwrap();

        let cfg = ServerConfig::load(Some(&file), Some(9100), None, None).unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.path, "/chat");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(&file, "[server]\nidle_timeout = 60\n").unwrap();

        let cfg = ServerConfig::load(Some(&file), None, None, None).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.idle_timeout, 60);
    }
}
