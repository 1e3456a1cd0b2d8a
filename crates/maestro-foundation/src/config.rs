//! Maestro configuration
//!
//! One TOML file covers the three layers: the reasoning-model gateway, the
//! tool runtime, and the task engine. Every field has a default so a missing
//! file or a partial file still yields a usable configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name
pub const MAESTRO_CONFIG_FILE: &str = "maestro.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaestroConfig {
    /// Reasoning-model gateway settings
    pub gateway: GatewayConfig,

    /// Tool runtime settings
    pub runtime: RuntimeConfig,

    /// Task engine settings
    pub engine: EngineConfig,
}

/// Reasoning-model gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the model server
    pub base_url: String,

    /// Model identifier to request
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_secs: 600,
        }
    }
}

/// Tool runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Lowest port assigned to tool workers
    pub base_port: u16,

    /// Name of the isolated network tool workers attach to
    pub network_name: String,

    /// Grace period when stopping a worker container, in seconds
    pub stop_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_port: 8000,
            network_name: "maestro-net".to_string(),
            stop_timeout_secs: 10,
        }
    }
}

/// Task engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of tasks running at the same time
    pub max_concurrent_tasks: usize,

    /// Declared overall task timeout in seconds.
    ///
    /// The engine exposes no internal timer; a caller-side watchdog is
    /// expected to enforce this.
    pub task_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            task_timeout_secs: 3600,
        }
    }
}

impl MaestroConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let config = match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "Config file not loaded, using defaults"
                );
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    /// Apply environment overrides on top of file values
    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("MAESTRO_GATEWAY_URL") {
            self.gateway.base_url = url;
        }
        self
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MaestroConfig::default();
        assert_eq!(config.runtime.base_port, 8000);
        assert_eq!(config.engine.max_concurrent_tasks, 10);
        assert_eq!(config.gateway.model, "llama3.2");
    }

    #[test]
    fn test_partial_toml() {
        let config: MaestroConfig = toml::from_str(
            r#"
            [runtime]
            base_port = 9100
            "#,
        )
        .unwrap();

        assert_eq!(config.runtime.base_port, 9100);
        // Untouched sections keep their defaults
        assert_eq!(config.runtime.network_name, "maestro-net");
        assert_eq!(config.engine.task_timeout_secs, 3600);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MAESTRO_CONFIG_FILE);

        let mut config = MaestroConfig::default();
        config.engine.max_concurrent_tasks = 3;
        config.save(&path).unwrap();

        let loaded = MaestroConfig::load(&path).unwrap();
        assert_eq!(loaded.engine.max_concurrent_tasks, 3);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = MaestroConfig::load_or_default("/nonexistent/maestro.toml");
        assert_eq!(config.runtime.base_port, 8000);
    }
}
