use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{EngineOptions, RetryPolicy};
use crate::error::{Result, ScatterError};
use crate::types::{PlacementStrategy, ProviderType};

/// Top-level configuration stored as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterConfig {
    pub engine: EngineSettings,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Path to the SQLite manifest database.
    pub db_path: String,
    /// Fixed chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Upper bound on concurrent chunk transfers per operation.
    #[serde(default = "default_max_transfers")]
    pub max_transfers: usize,
    /// Placement strategy.
    #[serde(default)]
    pub placement: PlacementStrategy,
    /// Retry behavior for provider calls.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Stale versions kept per file. Absent = unbounded history.
    #[serde(default)]
    pub max_versions: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 200,
        }
    }
}

fn default_chunk_size() -> usize {
    4 * 1024 * 1024 // 4 MB
}

fn default_max_transfers() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Destination root: bucket, container or base directory.
    pub root: String,
    pub region: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Custom endpoint URL for S3-compatible providers (MinIO, Garage, etc.)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Use path-style addressing (required by most S3-compatible servers).
    #[serde(default)]
    pub path_style: Option<bool>,
    /// S3 access key (for S3/S3Compatible providers).
    #[serde(default)]
    pub access_key: Option<String>,
    /// S3 secret key (for S3/S3Compatible providers).
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Azure storage account (for Azure providers).
    #[serde(default)]
    pub account: Option<String>,
}

fn default_weight() -> u32 {
    1
}

impl ScatterConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScatterError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ScatterError::TomlDe(e.to_string()))
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ScatterError::TomlSer(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config for `scatter init`.
    pub fn default_config(base_dir: &Path) -> Self {
        Self {
            engine: EngineSettings {
                db_path: base_dir.join("scatter.db").display().to_string(),
                chunk_size: default_chunk_size(),
                max_transfers: default_max_transfers(),
                placement: PlacementStrategy::default(),
                retry: RetrySettings::default(),
                max_versions: None,
            },
            providers: vec![],
        }
    }

    /// Engine construction knobs derived from the settings.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            chunk_size: self.engine.chunk_size,
            max_transfers: self.engine.max_transfers,
            strategy: self.engine.placement,
            retry: RetryPolicy {
                max_attempts: self.engine.retry.max_attempts,
                base_delay: Duration::from_millis(self.engine.retry.base_delay_ms),
            },
            max_versions: self.engine.max_versions,
        }
    }

    /// Resolve the config file path: `<base_dir>/scatter.toml`
    pub fn default_path(base_dir: &Path) -> PathBuf {
        base_dir.join("scatter.toml")
    }

    /// Resolve the default home directory: `~/.scatter`
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".scatter"))
            .ok_or_else(|| ScatterError::Config("Cannot determine home directory".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn roundtrip_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scatter.toml");
        let config = ScatterConfig::default_config(tmp.path());
        config.save(&path).unwrap();
        let loaded = ScatterConfig::load(&path).unwrap();
        assert_eq!(loaded.engine.chunk_size, 4 * 1024 * 1024);
        assert!(loaded.providers.is_empty());
        assert!(loaded.engine.max_versions.is_none());
    }

    #[test]
    fn load_nonexistent_returns_error() {
        let result = ScatterConfig::load(Path::new("/nonexistent/scatter.toml"));
        assert!(matches!(result, Err(ScatterError::ConfigNotFound(_))));
    }

    #[test]
    fn retention_knob_roundtrips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scatter.toml");
        let mut config = ScatterConfig::default_config(tmp.path());
        config.engine.max_versions = Some(5);
        config.engine.retry.max_attempts = 2;
        config.save(&path).unwrap();
        let loaded = ScatterConfig::load(&path).unwrap();
        assert_eq!(loaded.engine.max_versions, Some(5));
        assert_eq!(loaded.engine_options().retry.max_attempts, 2);
    }

    #[test]
    fn provider_table_parses() {
        let toml = r#"
            [engine]
            db_path = "/tmp/scatter.db"

            [[providers]]
            name = "bucket-a"
            type = "S3"
            root = "my-bucket"
            region = "eu-west-1"

            [[providers]]
            name = "bucket-b"
            type = "Local"
            root = "/var/scatter/b"
        "#;
        let config: ScatterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].provider_type, ProviderType::S3);
        assert_eq!(config.providers[1].weight, 1);
    }
}
