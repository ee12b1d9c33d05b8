// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for an sChain admin node, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Node identity on chain
// - Filesystem layout and container images
// - Collaborator endpoints (chain gateway, DKG, database)
// - Monitor limits and intervals
// - Notification and observability settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::firewall::IpRange;
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "skale.network/v1";
pub const KIND: &str = "NodeConfig";

/// Top-level Kubernetes-style node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigManifest {
    /// API version (must be "skale.network/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "NodeConfig")
    pub kind: String,

    /// Node metadata (name, labels, version)
    pub metadata: ManifestMetadata,

    /// Node configuration specification
    pub spec: NodeConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    /// Optional: Configuration version for tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Optional: Labels for categorization and discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Node configuration specification (content under spec:)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigSpec {
    /// Node identity on chain
    pub node: NodeIdentity,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Absent: in-memory record store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub chain: EndpointConfig,

    #[serde(default = "default_dkg_endpoint")]
    pub dkg: EndpointConfig,

    #[serde(default)]
    pub firewall: FirewallConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub allocation: AllocationConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// On-chain node id
    pub id: u64,

    /// On-chain node name
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of all workload directories
    #[serde(default = "default_schains_dir")]
    pub schains_dir: PathBuf,

    /// Node-wide data (locks, pid file)
    #[serde(default = "default_node_data_dir")]
    pub node_data_dir: PathBuf,

    /// TLS key and certificate handed to the worker (`ssl_key`, `ssl_cert`)
    #[serde(default = "default_ssl_dir")]
    pub ssl_dir: PathBuf,

    /// Base chain parameters merged into every generated config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Docker socket path (None = auto-detect)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_socket: Option<String>,

    #[serde(default = "default_worker_image")]
    pub worker_image: String,

    #[serde(default = "default_relay_image")]
    pub relay_image: String,

    /// Docker network mode for workload containers
    #[serde(default = "default_network_mode")]
    pub network_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_chain_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfig {
    /// Sources allowed to reach the catchup port of every workload
    #[serde(default)]
    pub sync_ranges: Vec<IpRange>,

    #[serde(default = "default_iptables_path")]
    pub iptables_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Cap on automatic worker restarts
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Consecutive RPC failures tolerated before a restart
    #[serde(default = "default_max_failed_rpc")]
    pub max_failed_rpc: u32,

    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,

    /// Added to the RPC timeout per recorded failure
    #[serde(default = "default_rpc_timeout_step")]
    pub rpc_timeout_step_secs: u64,

    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,

    #[serde(default = "default_max_interval")]
    pub max_interval_secs: u64,

    /// Supervisor tick interval
    #[serde(default = "default_supervisor_interval")]
    pub supervisor_interval_secs: u64,

    /// Wait between SIGTERM and SIGKILL
    #[serde(default = "default_termination_grace")]
    pub termination_grace_secs: u64,

    /// Provision workloads from snapshots on first run
    #[serde(default)]
    pub backup_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Disk reserved for workload volumes, in bytes
    #[serde(default = "default_disk_size")]
    pub disk_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub webhook_url: String,

    /// Per-workload notification budget
    #[serde(default = "default_notifications_per_minute")]
    pub per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics exposition
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_schains_dir() -> PathBuf {
    PathBuf::from("/skale_node_data/schains")
}

fn default_node_data_dir() -> PathBuf {
    PathBuf::from("/skale_node_data")
}

fn default_ssl_dir() -> PathBuf {
    PathBuf::from("/skale_node_data/ssl")
}

fn default_worker_image() -> String {
    "skalenetwork/schain:latest".to_string()
}

fn default_relay_image() -> String {
    "skalenetwork/ima:latest".to_string()
}

fn default_network_mode() -> String {
    "host".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_chain_endpoint() -> String {
    "http://127.0.0.1:3009".to_string()
}

fn default_dkg_endpoint() -> EndpointConfig {
    EndpointConfig {
        endpoint: "http://127.0.0.1:1031".to_string(),
        timeout_secs: 3600,
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_iptables_path() -> String {
    "iptables".to_string()
}

fn default_max_restarts() -> u32 {
    5
}

fn default_max_failed_rpc() -> u32 {
    5
}

fn default_rpc_timeout() -> u64 {
    30
}

fn default_rpc_timeout_step() -> u64 {
    10
}

fn default_min_interval() -> u64 {
    20
}

fn default_max_interval() -> u64 {
    40
}

fn default_supervisor_interval() -> u64 {
    60
}

fn default_termination_grace() -> u64 {
    60
}

fn default_disk_size() -> u64 {
    // 200 GiB
    200 * 1024 * 1024 * 1024
}

fn default_notifications_per_minute() -> u32 {
    6
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9100
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            schains_dir: default_schains_dir(),
            node_data_dir: default_node_data_dir(),
            ssl_dir: default_ssl_dir(),
            base_config: None,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_socket: None,
            worker_image: default_worker_image(),
            relay_image: default_relay_image(),
            network_mode: default_network_mode(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: default_chain_endpoint(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            sync_ranges: vec![],
            iptables_path: default_iptables_path(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            max_failed_rpc: default_max_failed_rpc(),
            rpc_timeout_secs: default_rpc_timeout(),
            rpc_timeout_step_secs: default_rpc_timeout_step(),
            min_interval_secs: default_min_interval(),
            max_interval_secs: default_max_interval(),
            supervisor_interval_secs: default_supervisor_interval(),
            termination_grace_secs: default_termination_grace(),
            backup_run: false,
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self { disk_size_bytes: default_disk_size() }
    }
}

impl Default for NodeConfigSpec {
    fn default() -> Self {
        Self {
            node: NodeIdentity { id: 0, name: String::new() },
            paths: PathsConfig::default(),
            runtime: RuntimeConfig::default(),
            database: None,
            chain: EndpointConfig::default(),
            dkg: default_dkg_endpoint(),
            firewall: FirewallConfig::default(),
            monitor: MonitorConfig::default(),
            allocation: AllocationConfig::default(),
            notifications: None,
            observability: None,
        }
    }
}

impl Default for NodeConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "schain-admin".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: NodeConfigSpec::default(),
        }
    }
}

impl NodeConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SCHAIN_ADMIN_CONFIG_PATH environment variable
    /// 2. ./schain-admin.yaml (working directory)
    /// 3. ~/.schain-admin/config.yaml (user home)
    /// 4. /etc/schain-admin/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SCHAIN_ADMIN_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./schain-admin.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".schain-admin").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/schain-admin/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // 1. Explicit CLI path (Fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        // 2. Discovery (Env -> Cwd -> Home -> System)
        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SCHAIN_ADMIN_BACKUP_RUN") {
            match parse_bool(&val) {
                Some(flag) => {
                    tracing::info!("Environment override: SCHAIN_ADMIN_BACKUP_RUN={}", flag);
                    self.spec.monitor.backup_run = flag;
                }
                None => {
                    tracing::warn!(
                        "Invalid value for SCHAIN_ADMIN_BACKUP_RUN: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("SCHAIN_ADMIN_NODE_ID") {
            match val.parse::<u64>() {
                Ok(id) => {
                    tracing::info!("Environment override: SCHAIN_ADMIN_NODE_ID={}", id);
                    self.spec.node.id = id;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for SCHAIN_ADMIN_NODE_ID: '{}'. Ignoring.", val);
                }
            }
        }

        if let Ok(url) = std::env::var("SCHAIN_ADMIN_DATABASE_URL") {
            tracing::info!("Environment override: SCHAIN_ADMIN_DATABASE_URL");
            match self.spec.database.as_mut() {
                Some(db) => db.url = url,
                None => {
                    self.spec.database = Some(DatabaseConfig {
                        url,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let monitor = &self.spec.monitor;
        if monitor.min_interval_secs == 0 {
            anyhow::bail!("spec.monitor.min_interval_secs must be positive");
        }
        if monitor.min_interval_secs > monitor.max_interval_secs {
            anyhow::bail!(
                "spec.monitor.min_interval_secs ({}) exceeds max_interval_secs ({})",
                monitor.min_interval_secs,
                monitor.max_interval_secs
            );
        }

        for range in &self.spec.firewall.sync_ranges {
            if range.start > range.end {
                anyhow::bail!(
                    "Invalid sync range {}-{}: start is after end",
                    range.start,
                    range.end
                );
            }
        }

        if let Some(db) = &self.spec.database {
            if db.url.is_empty() {
                anyhow::bail!("spec.database.url cannot be empty");
            }
        }

        if let Some(notifications) = &self.spec.notifications {
            if notifications.per_minute == 0 {
                anyhow::bail!("spec.notifications.per_minute must be positive");
            }
        }

        Ok(())
    }

    pub fn storage_backend(&self) -> StorageBackend {
        match &self.spec.database {
            Some(db) => StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: db.url.clone(),
            }),
            None => StorageBackend::InMemory,
        }
    }

    pub fn log_level(&self) -> Option<&str> {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.as_ref())
            .map(|l| l.level.as_str())
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_default_manifest() {
        let manifest = NodeConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert_eq!(manifest.spec.monitor.max_restarts, 5);
        assert!(matches!(manifest.storage_backend(), StorageBackend::InMemory));
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
apiVersion: skale.network/v1
kind: NodeConfig
metadata:
  name: node-a
spec:
  node:
    id: 7
  firewall:
    sync_ranges:
      - start: 10.0.0.1
        end: 10.0.0.20
"#;
        let manifest = NodeConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.node.id, 7);
        assert_eq!(manifest.spec.paths.schains_dir, PathBuf::from("/skale_node_data/schains"));
        assert_eq!(manifest.spec.monitor.min_interval_secs, 20);
        assert_eq!(manifest.spec.monitor.max_interval_secs, 40);
        assert_eq!(manifest.spec.dkg.endpoint, "http://127.0.0.1:1031");
        assert_eq!(
            manifest.spec.firewall.sync_ranges,
            vec![IpRange { start: Ipv4Addr::new(10, 0, 0, 1), end: Ipv4Addr::new(10, 0, 0, 20) }]
        );
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut manifest = NodeConfigManifest::default();
        manifest.spec.node.id = 42;
        manifest.spec.database = Some(DatabaseConfig {
            url: "postgres://localhost/admin".to_string(),
            max_connections: 5,
        });

        let yaml = manifest.to_yaml_string().unwrap();
        let parsed = NodeConfigManifest::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.node.id, 42);
        assert!(matches!(parsed.storage_backend(), StorageBackend::PostgreSQL(_)));
    }

    #[test]
    fn test_validation() {
        let mut manifest = NodeConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "WrongKind".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.monitor.min_interval_secs = 50;
        assert!(manifest.validate().is_err());
        manifest.spec.monitor.min_interval_secs = 20;

        manifest.spec.firewall.sync_ranges.push(IpRange {
            start: Ipv4Addr::new(10, 0, 0, 9),
            end: Ipv4Addr::new(10, 0, 0, 1),
        });
        assert!(manifest.validate().is_err());
    }
}
