use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::error::{McpError, McpResult};

/// Main engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Absent means schema-only mode
    pub database_url: Option<String>,
    pub max_connections: usize,
    pub connect_timeout_secs: u64,
    /// Deadline for a single storage round trip; none by default
    pub query_timeout_secs: Option<u64>,
    /// Bind filter values out-of-band instead of executing inlined literals
    pub bind_parameters: bool,
}

/// Result store retention
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub ansi: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 25,
            connect_timeout_secs: 5,
            query_timeout_secs: None,
            bind_parameters: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            sweep_interval_secs: 3600,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl StorageConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }
}

impl CacheConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl EngineConfig {
    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> McpResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            McpError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            McpError::Configuration(format!("Invalid configuration in {}: {}", path.display(), e))
        })
    }

    /// File (or defaults) first, then environment overrides
    pub fn load(path: Option<&Path>) -> McpResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `DATABASE_URL`, `LOG_LEVEL`, `MCP_QUERY_TIMEOUT_SECS` and `MCP_CACHE_RETENTION_SECS`
    pub fn apply_env_overrides(&mut self) -> McpResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> McpResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get("DATABASE_URL") {
            self.storage.database_url = Some(url);
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(secs) = get("MCP_QUERY_TIMEOUT_SECS") {
            self.storage.query_timeout_secs = Some(parse_secs("MCP_QUERY_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = get("MCP_CACHE_RETENTION_SECS") {
            self.cache.retention_secs = parse_secs("MCP_CACHE_RETENTION_SECS", &secs)?;
        }
        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> McpResult<u64> {
    value
        .parse::<u64>()
        .map_err(|e| McpError::Configuration(format!("{} must be a number of seconds: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();

        assert!(config.storage.database_url.is_none());
        assert_eq!(config.storage.max_connections, 25);
        assert!(config.storage.bind_parameters);
        assert!(config.storage.query_timeout().is_none());
        assert_eq!(config.cache.retention(), Duration::from_secs(3600));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"storage": {{"database_url": "postgres://localhost/telemetry", "query_timeout_secs": 15}}}}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();

        assert_eq!(config.storage.database_url.as_deref(), Some("postgres://localhost/telemetry"));
        assert_eq!(config.storage.query_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.storage.max_connections, 25);
        assert_eq!(config.cache.sweep_interval_secs, 3600);
    }

    #[test]
    fn test_invalid_file_is_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        match EngineConfig::from_file(file.path()) {
            Err(McpError::Configuration(msg)) => assert!(msg.contains("Invalid configuration")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://db/telemetry"),
            ("LOG_LEVEL", "debug"),
            ("MCP_QUERY_TIMEOUT_SECS", "3"),
            ("MCP_CACHE_RETENTION_SECS", ""),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage.database_url.as_deref(), Some("postgres://db/telemetry"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.storage.query_timeout_secs, Some(3));
        assert_eq!(config.cache.retention_secs, 3600);
    }

    #[test]
    fn test_bad_numeric_override() {
        let mut config = EngineConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "MCP_QUERY_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(McpError::Configuration(_))));
    }
}
