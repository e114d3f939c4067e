//! Configuration for the SDK and the ingest server.
//!
//! Both sides read one `xray.config.yaml`, auto-discovered by walking up
//! from the working directory. Priority: explicit overrides (CLI flags,
//! builder setters) > config file > defaults.
//!
//! ```yaml
//! sdk:
//!   base_url: http://localhost:8000
//!   api_key: your-api-key
//!   buffer_size: 1000
//!   flush_interval: 5.0
//!
//! server:
//!   database_url: sqlite:xray.db
//!   debug: false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::DetailLevel;

/// Config filename looked up in the working directory and its parents.
pub const CONFIG_FILENAME: &str = "xray.config.yaml";

/// SDK (client) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Ingest server base URL. Without it the transport runs but skips POSTs.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token sent as `Authorization` when set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Event queue capacity; events beyond it are dropped.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Seconds to wait before shipping a partial batch.
    #[serde(default = "default_flush_interval")]
    pub flush_interval: f64,
    /// Max events per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout: f64,
    /// Payload capture detail level.
    #[serde(default)]
    pub default_detail: DetailLevel,
}

fn default_buffer_size() -> usize {
    1000
}

fn default_flush_interval() -> f64 {
    5.0
}

fn default_batch_size() -> usize {
    100
}

fn default_http_timeout() -> f64 {
    30.0
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            buffer_size: default_buffer_size(),
            flush_interval: default_flush_interval(),
            batch_size: default_batch_size(),
            http_timeout: default_http_timeout(),
            default_detail: DetailLevel::default(),
        }
    }
}

/// Ingest server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Database location. SQLite path, with or without a `sqlite:` prefix.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Relaxes the default log filter when true.
    #[serde(default)]
    pub debug: bool,
}

fn default_database_url() -> String {
    "sqlite:xray.db".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            debug: false,
        }
    }
}

/// Full config file contents: one section per side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sdk: SdkConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Find `xray.config.yaml` by searching from `start` up to the filesystem
/// root. Defaults to the current directory.
pub fn find_config_file(start: Option<&Path>) -> Option<PathBuf> {
    let cwd;
    let mut current = match start {
        Some(path) => path,
        None => {
            cwd = std::env::current_dir().ok()?;
            &cwd
        }
    };

    loop {
        let candidate = current.join(CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Load configuration, falling back to defaults when no file is found.
///
/// An explicit `config_file` that cannot be read or parsed is an error;
/// auto-discovery failures silently produce defaults.
pub fn load(config_file: Option<&Path>) -> anyhow::Result<Config> {
    let path = match config_file {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(None),
    };

    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = std::fs::read_to_string(&path)?;
    let config: Config = serde_yaml::from_str(&contents)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sdk_defaults() {
        let config = SdkConfig::default();
        assert_eq!(config.base_url, None);
        assert_eq!(config.buffer_size, 1000);
        assert_eq!(config.flush_interval, 5.0);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.http_timeout, 30.0);
        assert_eq!(config.default_detail, DetailLevel::Summary);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        assert!(find_config_file(Some(dir.path())).is_none());

        // Explicit missing path is an error, not a silent default.
        assert!(load(Some(&dir.path().join(CONFIG_FILENAME))).is_err());
    }

    #[test]
    fn test_load_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            "sdk:\n  base_url: http://localhost:8000\n  batch_size: 10\nserver:\n  database_url: sqlite:/tmp/xray.db\n  debug: true\n",
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.sdk.base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.sdk.batch_size, 10);
        // Untouched fields keep their defaults.
        assert_eq!(config.sdk.buffer_size, 1000);
        assert_eq!(config.server.database_url, "sqlite:/tmp/xray.db");
        assert!(config.server.debug);
    }

    #[test]
    fn test_find_config_walks_up_parents() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "sdk: {}\n").unwrap();

        let found = find_config_file(Some(&nested)).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILENAME));
    }

    #[test]
    fn test_partial_file_parses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "sdk:\n  api_key: secret\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.sdk.api_key.as_deref(), Some("secret"));
        assert_eq!(config.server.database_url, "sqlite:xray.db");
    }
}
