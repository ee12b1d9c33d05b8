// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Flattened engine settings derived from the node manifest.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::firewall::IpRange;
use crate::domain::node_config::NodeConfigManifest;
use crate::domain::process::DEFAULT_TERMINATION_GRACE;
use crate::domain::schain::NodeId;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub node_id: NodeId,
    pub engine_version: String,
    pub max_restarts: u32,
    pub max_failed_rpc: u32,
    pub rpc_timeout: Duration,
    pub rpc_timeout_step: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub supervisor_interval: Duration,
    pub termination_grace: Duration,
    pub backup_run: bool,
    pub sync_ranges: Vec<IpRange>,
    pub worker_image: String,
    pub relay_image: String,
    pub network_mode: Option<String>,
    pub disk_size_bytes: u64,
    /// Directory holding `ssl_key` and `ssl_cert` for the worker.
    pub ssl_dir: Option<PathBuf>,
}

impl EngineSettings {
    /// Liveness probe timeout grows with each recorded failure.
    pub fn rpc_timeout_for(&self, failed_rpc_count: u32) -> Duration {
        self.rpc_timeout + self.rpc_timeout_step * failed_rpc_count
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            node_id: 0,
            engine_version: crate::ENGINE_VERSION.to_string(),
            max_restarts: 5,
            max_failed_rpc: 5,
            rpc_timeout: Duration::from_secs(30),
            rpc_timeout_step: Duration::from_secs(10),
            min_interval: Duration::from_secs(20),
            max_interval: Duration::from_secs(40),
            supervisor_interval: Duration::from_secs(60),
            termination_grace: DEFAULT_TERMINATION_GRACE,
            backup_run: false,
            sync_ranges: vec![],
            worker_image: "skalenetwork/schain:latest".to_string(),
            relay_image: "skalenetwork/ima:latest".to_string(),
            network_mode: Some("host".to_string()),
            disk_size_bytes: 200 * 1024 * 1024 * 1024,
            ssl_dir: None,
        }
    }
}

impl From<&NodeConfigManifest> for EngineSettings {
    fn from(manifest: &NodeConfigManifest) -> Self {
        let spec = &manifest.spec;
        let monitor = &spec.monitor;
        Self {
            node_id: spec.node.id,
            engine_version: crate::ENGINE_VERSION.to_string(),
            max_restarts: monitor.max_restarts,
            max_failed_rpc: monitor.max_failed_rpc,
            rpc_timeout: Duration::from_secs(monitor.rpc_timeout_secs),
            rpc_timeout_step: Duration::from_secs(monitor.rpc_timeout_step_secs),
            min_interval: Duration::from_secs(monitor.min_interval_secs),
            max_interval: Duration::from_secs(monitor.max_interval_secs),
            supervisor_interval: Duration::from_secs(monitor.supervisor_interval_secs),
            termination_grace: Duration::from_secs(monitor.termination_grace_secs),
            backup_run: monitor.backup_run,
            sync_ranges: spec.firewall.sync_ranges.clone(),
            worker_image: spec.runtime.worker_image.clone(),
            relay_image: spec.runtime.relay_image.clone(),
            network_mode: Some(spec.runtime.network_mode.clone()).filter(|m| !m.is_empty()),
            disk_size_bytes: spec.allocation.disk_size_bytes,
            ssl_dir: Some(spec.paths.ssl_dir.clone()),
        }
    }
}
