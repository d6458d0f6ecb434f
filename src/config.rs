//! DriftSync Configuration
//!
//! This module provides configuration structures for the DriftSync
//! document reconciliation manager.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main DriftSync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Cluster topology configuration
    pub cluster: ClusterConfig,

    /// Storage credentials
    pub credentials: Credentials,

    /// Reconciliation scheduling configuration
    #[serde(default)]
    pub sync: SchedulerConfig,

    /// Retry/backoff configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster topology configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Primary nodes, each owning one logical dataset (database)
    pub primaries: Vec<PrimaryConfig>,

    /// Replica nodes that converge to the union of all datasets
    pub replicas: Vec<ReplicaConfig>,

    /// Collection name, used uniformly on every node
    #[serde(default = "default_collection")]
    pub collection: String,
}

/// A primary node and the dataset it owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// Node identifier used in logs and reports
    pub name: String,

    /// Storage host
    pub host: String,

    /// Storage port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logical dataset (database name) this primary owns
    pub database: String,
}

/// A replica node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Node identifier used in logs and reports
    pub name: String,

    /// Storage host
    pub host: String,

    /// Storage port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage credentials
///
/// The principal must hold read+write on the target collection on every node;
/// issuing it is the provisioning process's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Credentials {
    /// Storage user
    pub user: String,

    /// Storage password
    pub password: String,
}

/// Reconciliation scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between reconciliation cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Ping timeout in milliseconds (readiness gate)
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
}

/// Retry/backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts in milliseconds (doubles per attempt)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// A (host, port) storage endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl PrimaryConfig {
    /// Get the node address
    pub fn address(&self) -> NodeAddress {
        NodeAddress {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

impl ReplicaConfig {
    /// Get the node address
    pub fn address(&self) -> NodeAddress {
        NodeAddress {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

// Default value functions
fn default_port() -> u16 {
    3306
}

fn default_collection() -> String {
    "users".to_string()
}

fn default_interval_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_ping_timeout_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    30
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            ping_timeout_ms: default_ping_timeout_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SyncConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.cluster.primaries.is_empty() {
            return Err(crate::Error::Config(
                "cluster.primaries cannot be empty".into(),
            ));
        }

        if self.cluster.replicas.is_empty() {
            return Err(crate::Error::Config(
                "cluster.replicas cannot be empty".into(),
            ));
        }

        if self.cluster.collection.is_empty() {
            return Err(crate::Error::Config(
                "cluster.collection cannot be empty".into(),
            ));
        }

        // Database and collection names become backtick-quoted SQL
        // identifiers; a backtick inside one would break the quoting.
        if self.cluster.collection.contains('`') {
            return Err(crate::Error::Config(
                "cluster.collection must not contain backticks".into(),
            ));
        }

        for primary in &self.cluster.primaries {
            if primary.name.is_empty() || primary.host.is_empty() {
                return Err(crate::Error::Config(
                    "primary name and host cannot be empty".into(),
                ));
            }
            if primary.database.is_empty() {
                return Err(crate::Error::Config(format!(
                    "primary {} has no database",
                    primary.name
                )));
            }
            if primary.database.contains('`') {
                return Err(crate::Error::Config(format!(
                    "primary {} database must not contain backticks",
                    primary.name
                )));
            }
        }

        for replica in &self.cluster.replicas {
            if replica.name.is_empty() || replica.host.is_empty() {
                return Err(crate::Error::Config(
                    "replica name and host cannot be empty".into(),
                ));
            }
        }

        // Each primary owns a distinct dataset
        let mut databases: Vec<&str> = self
            .cluster
            .primaries
            .iter()
            .map(|p| p.database.as_str())
            .collect();
        databases.sort_unstable();
        databases.dedup();
        if databases.len() != self.cluster.primaries.len() {
            return Err(crate::Error::Config(
                "each primary must own a distinct database".into(),
            ));
        }

        if self.credentials.user.is_empty() {
            return Err(crate::Error::Config(
                "credentials.user cannot be empty".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(crate::Error::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Get cycle interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.connect_timeout_secs)
    }

    /// Get ping timeout as Duration
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.ping_timeout_ms)
    }

    /// The distinct databases reconciled each cycle, in primary order
    pub fn databases(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for primary in &self.cluster.primaries {
            if !seen.contains(&primary.database) {
                seen.push(primary.database.clone());
            }
        }
        seen
    }
}
