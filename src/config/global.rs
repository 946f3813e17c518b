#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_global_config_default() {
        let config = GlobalConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 17422);
        assert_eq!(config.bootstrap.probe_timeout_ms, 500);
        assert_eq!(config.bootstrap.initial_backoff_ms, 25);
        assert_eq!(config.bootstrap.max_backoff_ms, 800);
        assert_eq!(config.bootstrap.max_wait_ms, 10_000);
        assert_eq!(config.transport.request_timeout_ms, 30_000);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file_enabled);
    }

    #[test]
    fn test_global_config_serialization() {
        let config = GlobalConfig::default();

        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[bootstrap]"));
        assert!(toml_str.contains("[transport]"));
        assert!(toml_str.contains("[logging]"));

        let deserialized: GlobalConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.server.port, deserialized.server.port);
        assert_eq!(
            config.bootstrap.max_wait_ms,
            deserialized.bootstrap.max_wait_ms
        );
    }

    #[tokio::test]
    async fn test_global_config_load_default_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = GlobalConfig::load_from_path(&config_path).await.unwrap();
        assert_eq!(config.server.port, 17422);
    }

    #[tokio::test]
    async fn test_global_config_partial_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let partial_config = r#"
[server]
port = 18000

[bootstrap]
max_wait_ms = 50
"#;
        tokio::fs::write(&config_path, partial_config).await.unwrap();

        let config = GlobalConfig::load_from_path(&config_path).await.unwrap();

        assert_eq!(config.server.port, 18000);
        assert_eq!(config.bootstrap.max_wait_ms, 50);

        // Unspecified values keep their defaults
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.bootstrap.probe_timeout_ms, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_global_config_rejects_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "[server\nport = ").await.unwrap();

        let result = GlobalConfig::load_from_path(&config_path).await;
        assert!(matches!(result, Err(RsuvError::ConfigError(_))));
    }

    #[test]
    fn test_config_validation() {
        let mut config = GlobalConfig::default();
        assert!(config.validate().is_ok());

        config.server.port = 0;
        assert!(config.validate().is_err());

        config = GlobalConfig::default();
        config.bootstrap.initial_backoff_ms = 0;
        assert!(config.validate().is_err());

        config = GlobalConfig::default();
        config.bootstrap.max_backoff_ms = 10;
        config.bootstrap.initial_backoff_ms = 20;
        assert!(config.validate().is_err());

        config = GlobalConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_dir_from_home() {
        let state_dir = state_dir_from_home(Path::new("/home/me"));
        assert_eq!(state_dir, PathBuf::from("/home/me/.rsuv"));
    }
}

use crate::error::{Result, RsuvError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_file_enabled")]
    pub file_enabled: bool,
    pub file_path: Option<String>, // If None, uses <state dir>/logs/
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: default_file_enabled(),
            file_path: None,
        }
    }
}

impl GlobalConfig {
    /// Load `config.toml` from the given state directory
    pub async fn load(state_dir: &Path) -> Result<Self> {
        Self::load_from_path(&state_dir.join(CONFIG_FILE_NAME)).await
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(RsuvError::ConfigError(
                "Server port must be between 1 and 65535".to_string(),
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(RsuvError::ConfigError(
                "Server host must not be empty".to_string(),
            ));
        }

        let bootstrap = &self.bootstrap;
        if bootstrap.probe_timeout_ms == 0 || bootstrap.initial_backoff_ms == 0 {
            return Err(RsuvError::ConfigError(
                "Bootstrap probe timeout and backoff must be greater than 0".to_string(),
            ));
        }
        if bootstrap.max_backoff_ms < bootstrap.initial_backoff_ms {
            return Err(RsuvError::ConfigError(
                "Bootstrap max_backoff_ms must not be below initial_backoff_ms".to_string(),
            ));
        }

        if self.transport.request_timeout_ms == 0 {
            return Err(RsuvError::ConfigError(
                "Transport request timeout must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(RsuvError::ConfigError(format!(
                "Invalid logging level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    pub fn get_log_dir(&self, state_dir: &Path) -> PathBuf {
        match &self.logging.file_path {
            Some(path) => PathBuf::from(path),
            None => state_dir.join("logs"),
        }
    }
}

/// Per-user state directory: `$HOME/.rsuv`
pub fn get_state_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| RsuvError::ConfigError("Could not determine home directory".to_string()))?;

    Ok(state_dir_from_home(Path::new(&home_dir)))
}

pub fn state_dir_from_home(home: &Path) -> PathBuf {
    home.join(".rsuv")
}

// Default value functions for serde
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    17422
}
fn default_probe_timeout_ms() -> u64 {
    500
}
fn default_initial_backoff_ms() -> u64 {
    25
}
fn default_max_backoff_ms() -> u64 {
    800
}
fn default_max_wait_ms() -> u64 {
    10_000
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_file_enabled() -> bool {
    true
}
