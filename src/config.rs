//! Benchmark configuration
//!
//! Every field has a default, so an empty YAML file (or no file at all) is a
//! valid configuration. The CLI applies its flags on top of the loaded file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::engine::StageSet;
use crate::error::{BenchError, BenchResult};
use crate::model::{default_alert_sets, default_endpoints};

/// Which client API the benchmark drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Embedded,
    Traversal,
    Remote,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Embedded => "embedded",
            AdapterKind::Traversal => "traversal",
            AdapterKind::Remote => "remote",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" => Ok(AdapterKind::Embedded),
            "traversal" | "gremlin" => Ok(AdapterKind::Traversal),
            "remote" | "http" => Ok(AdapterKind::Remote),
            other => Err(BenchError::Config(format!("unknown adapter '{}'", other))),
        }
    }
}

/// Connection settings for the remote adapter
///
/// Without a `url` the remote adapter sends its statements to an
/// in-process database instead of a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            database: "benchmark".to_string(),
            user: "root".to_string(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub adapter: AdapterKind,
    pub remote: RemoteConfig,
    /// Number of records to insert
    pub limit: usize,
    pub batch_size: usize,
    pub stages: StageSet,
    /// Wrap adapter operations in transactions
    pub transactions: bool,
    /// Ask for read-only queries without a timeout
    pub unbounded_queries: bool,
    /// Record file; the embedded template is used when absent
    pub data_file: Option<PathBuf>,
    pub endpoints: Vec<String>,
    pub alerts: Vec<Vec<String>>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterKind::default(),
            remote: RemoteConfig::default(),
            limit: 10_000,
            batch_size: 10_000,
            stages: StageSet::default(),
            transactions: true,
            unbounded_queries: true,
            data_file: None,
            endpoints: default_endpoints(),
            alerts: default_alert_sets(),
        }
    }
}

impl BenchConfig {
    /// Parse a YAML document
    pub fn from_yaml(text: &str) -> BenchResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: BenchConfig = serde_yaml::from_str(text)?;
        Ok(config)
    }

    /// Load a YAML configuration file
    pub fn load(path: &Path) -> BenchResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BenchError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&text)?;
        debug!(path = %path.display(), adapter = %config.adapter, "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.batch_size == 0 {
            return Err(BenchError::Config("batch_size must be greater than zero".to_string()));
        }
        if self.stages.is_empty() {
            return Err(BenchError::Config("at least one stage must be enabled".to_string()));
        }
        if self.alerts.is_empty() {
            return Err(BenchError::Config("alerts must contain at least one set".to_string()));
        }
        if self.alerts.iter().any(|set| set.is_empty() || set.iter().any(|a| a.trim().is_empty())) {
            return Err(BenchError::Config("alert sets must be non-empty and contain no blank alerts".to_string()));
        }
        if let Some(name) = self.endpoints.iter().find(|n| n.trim().is_empty()) {
            return Err(BenchError::Config(format!("blank endpoint name {:?}", name)));
        }
        if let Some(url) = &self.remote.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(BenchError::Config(format!("remote url must be http(s): {}", url)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Stage;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.adapter, AdapterKind::Embedded);
        assert_eq!(config.limit, 10_000);
        assert_eq!(config.batch_size, 10_000);
        assert!(config.transactions);
        assert_eq!(config.endpoints.len(), 7);
        assert_eq!(config.alerts.len(), 4);
        assert!(config.stages.contains(Stage::Find));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(BenchConfig::from_yaml("").unwrap(), BenchConfig::default());
    }

    #[test]
    fn test_partial_yaml() {
        let config = BenchConfig::from_yaml(
            "adapter: remote\nlimit: 5\nstages: [CREATE_ENDPOINT, INSERT]\nremote:\n  url: http://localhost:2480\n",
        )
        .unwrap();
        assert_eq!(config.adapter, AdapterKind::Remote);
        assert_eq!(config.limit, 5);
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.remote.url.as_deref(), Some("http://localhost:2480"));
        assert_eq!(config.remote.database, "benchmark");
        assert!(config.stages.contains(Stage::Insert));
        assert!(!config.stages.contains(Stage::Delete));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(BenchConfig::from_yaml("limit: [oops"), Err(BenchError::Config(_))));
        assert!(matches!(BenchConfig::from_yaml("adapter: carrier-pigeon"), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let config = BenchConfig { batch_size: 0, ..BenchConfig::default() };
        assert!(config.validate().is_err());

        let config = BenchConfig { alerts: vec![vec![]], ..BenchConfig::default() };
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.remote.url = Some("localhost:2480".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_adapter_kind_parse() {
        assert_eq!("Traversal".parse::<AdapterKind>().unwrap(), AdapterKind::Traversal);
        assert_eq!("remote".parse::<AdapterKind>().unwrap(), AdapterKind::Remote);
        assert!("nope".parse::<AdapterKind>().is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bench.yaml");
        std::fs::write(&path, "transactions: false\nbatch_size: 250\n").unwrap();
        let config = BenchConfig::load(&path).unwrap();
        assert!(!config.transactions);
        assert_eq!(config.batch_size, 250);

        assert!(matches!(BenchConfig::load(&dir.path().join("missing.yaml")), Err(BenchError::Config(_))));
    }
}
