// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Remediation Actions
//!
//! One method per [`Step`]. Every action follows the same contract:
//!
//! ```text
//! status = checks[aspect]
//! if !status { perform() }
//! return status
//! ```
//!
//! so that a workload whose checks all pass sees no side effect at all.
//! [`ActionManager::execute`] wraps each call in [`instrumented`], which
//! records timing and the initial status and emits a log line plus metrics.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Idempotent convergence of one aspect per call
//! - **Related:** `application::monitor` (program selection and ordering)

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::allocation::volume_size;
use crate::application::checks::rpc_url;
use crate::application::config_generator::{read_config, write_config};
use crate::application::context::EngineContext;
use crate::domain::chain::{dkg_threshold, ChainError, DkgOutcome, DkgRequest};
use crate::domain::checks::{CheckName, CheckResult, ChecksSnapshot};
use crate::domain::events::SchainEvent;
use crate::domain::firewall::{FirewallError, SkaledPorts};
use crate::domain::monitor::Step;
use crate::domain::record::{DkgStatus, RecordField, SchainRecord};
use crate::domain::repository::{RepositoryError, SchainRecordRepository};
use crate::domain::runtime::{volume_name, ContainerKind, ContainerSpec, RuntimeError, VolumeBind};
use crate::domain::schain::{RotationFacts, WorkloadFacts};
use crate::infrastructure::state_files::{
    read_exit_schedule, read_skaled_status, remove_if_exists, write_exit_schedule,
    write_json_atomic, KeyShare,
};

const CONFIG_MOUNT: &str = "/schain_config";
const DATA_MOUNT: &str = "/data_dir";
const SSL_MOUNT: &str = "/ssl";
const SSL_KEY_FILE: &str = "ssl_key";
const SSL_CERT_FILE: &str = "ssl_cert";
/// Lines of container output attached to a restart-limit notification.
const RESTART_LOG_TAIL: usize = 50;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("DKG failed for {schain}: {reason}")]
    Dkg { schain: String, reason: String },

    #[error("Container runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Firewall error: {0}")]
    Firewall(#[from] FirewallError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Local copy of a record that writes every change through to the store.
pub struct RecordHandle {
    repo: Arc<dyn SchainRecordRepository>,
    record: SchainRecord,
}

impl RecordHandle {
    pub fn new(repo: Arc<dyn SchainRecordRepository>, record: SchainRecord) -> Self {
        Self { repo, record }
    }

    pub fn get(&self) -> &SchainRecord {
        &self.record
    }

    pub async fn set(&mut self, field: RecordField) -> Result<(), RepositoryError> {
        self.repo.set(&self.record.name, field.clone()).await?;
        self.record.apply(&field);
        Ok(())
    }

    pub async fn reset_failed_counters(&mut self) -> Result<(), RepositoryError> {
        self.set(RecordField::RestartCount(0)).await?;
        self.set(RecordField::FailedRpcCount(0)).await
    }

    pub fn into_record(self) -> SchainRecord {
        self.record
    }
}

/// Instrumentation record of one executed action.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedAction {
    pub step: Step,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub initial_status: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs `action` and reports it uniformly.
pub async fn instrumented<F>(
    schain: &str,
    step: Step,
    action: F,
) -> (Result<bool, ActionError>, ExecutedAction)
where
    F: Future<Output = Result<bool, ActionError>>,
{
    let started_at = Utc::now();
    let timer = Instant::now();
    let result = action.await;
    let elapsed = timer.elapsed();

    let outcome = match &result {
        Ok(true) => "skipped",
        Ok(false) => "performed",
        Err(_) => "failed",
    };
    metrics::counter!("schain_admin_actions_total", "action" => step.as_str(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("schain_admin_action_duration_seconds", "action" => step.as_str())
        .record(elapsed.as_secs_f64());

    match &result {
        Ok(status) => debug!(
            "[{}] action {} finished in {:?} (initial status: {})",
            schain, step, elapsed, status
        ),
        Err(e) => warn!("[{}] action {} failed after {:?}: {}", schain, step, elapsed, e),
    }

    let executed = ExecutedAction {
        step,
        started_at,
        finished_at: Utc::now(),
        initial_status: result.as_ref().ok().copied(),
        error: result.as_ref().err().map(|e| e.to_string()),
    };
    (result, executed)
}

/// Options for starting the worker from a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotMode {
    /// Peer to download from. `None` lets the worker pick one from its config.
    pub source: Option<String>,
    /// Delayed start, unix seconds.
    pub start_ts: Option<i64>,
}

pub struct ActionManager {
    ctx: Arc<EngineContext>,
    facts: WorkloadFacts,
    rotation: RotationFacts,
    checks: ChecksSnapshot,
    record: RecordHandle,
    executed: Vec<ExecutedAction>,
}

impl ActionManager {
    pub fn new(
        ctx: Arc<EngineContext>,
        facts: WorkloadFacts,
        rotation: RotationFacts,
        checks: ChecksSnapshot,
        record: RecordHandle,
    ) -> Self {
        Self { ctx, facts, rotation, checks, record, executed: Vec::new() }
    }

    pub fn name(&self) -> &str {
        self.facts.name()
    }

    pub fn record(&self) -> &SchainRecord {
        self.record.get()
    }

    pub fn record_mut(&mut self) -> &mut RecordHandle {
        &mut self.record
    }

    pub fn checks(&self) -> &ChecksSnapshot {
        &self.checks
    }

    pub fn executed(&self) -> &[ExecutedAction] {
        &self.executed
    }

    pub fn into_parts(self) -> (RecordHandle, Vec<ExecutedAction>) {
        (self.record, self.executed)
    }

    pub async fn execute(&mut self, step: Step) -> Result<bool, ActionError> {
        let name = self.facts.schain.name.clone();
        let (result, executed) = instrumented(&name, step, self.dispatch(step)).await;
        self.executed.push(executed);
        result
    }

    async fn dispatch(&mut self, step: Step) -> Result<bool, ActionError> {
        match step {
            Step::Teardown => self.teardown().await,
            Step::Directory => self.directory(),
            Step::Dkg => self.dkg().await,
            Step::Config => self.config(false).await,
            Step::ForceConfig => self.config(true).await,
            Step::Volume => self.volume().await,
            Step::FirewallRules => self.firewall_rules().await,
            Step::ClearFirewallRules => self.clear_firewall_rules().await,
            Step::WorkerContainer => self.worker_container(None).await,
            Step::WorkerFromSnapshot => {
                let mode = SnapshotMode {
                    source: self.record.get().snapshot_source.clone(),
                    start_ts: None,
                };
                self.worker_container(Some(mode)).await
            }
            Step::WorkerAtRotationFinish => {
                let mode = SnapshotMode { source: None, start_ts: Some(self.rotation.finish_ts) };
                self.worker_container(Some(mode)).await
            }
            Step::RestartWorker => self.restart_worker().await,
            Step::Liveness => self.liveness().await,
            Step::RelayContainer => self.relay_container().await,
            Step::RotationRequest => self.rotation_request().await,
            Step::ClearExitSchedule => self.clear_exit_schedule(),
        }
    }

    /// Mark an aspect as changed by an earlier step of this cycle.
    fn invalidate(&mut self, name: CheckName, reason: &str) {
        self.checks.insert(name, CheckResult::fail(reason));
    }

    async fn teardown(&mut self) -> Result<bool, ActionError> {
        let name = self.facts.name().to_string();
        let runtime = self.ctx.runtime.clone();
        let worker = ContainerKind::Schain.container_name(&name);
        let relay = ContainerKind::Ima.container_name(&name);
        let volume = volume_name(&name);

        let status = runtime.container_state(&worker).await?.is_none()
            && runtime.container_state(&relay).await?.is_none()
            && !runtime.volume_exists(&volume).await?;
        if !status {
            info!("[{}] removing containers and data volume", name);
            runtime.remove_container(&worker).await?;
            runtime.remove_container(&relay).await?;
            runtime.remove_volume(&volume).await?;
        }
        self.invalidate(CheckName::SkaledContainer, "torn down");
        self.invalidate(CheckName::ImaContainer, "torn down");
        self.invalidate(CheckName::Volume, "torn down");
        Ok(status)
    }

    fn directory(&mut self) -> Result<bool, ActionError> {
        let status = self.checks.status(CheckName::ConfigDir);
        if !status {
            let name = self.facts.name();
            info!("[{}] creating workload directory", name);
            std::fs::create_dir_all(self.ctx.layout.data_dir(name))?;
        }
        Ok(status)
    }

    async fn dkg(&mut self) -> Result<bool, ActionError> {
        let status = self.checks.status(CheckName::Dkg);
        if status {
            return Ok(true);
        }
        let name = self.facts.name().to_string();
        let rotation_id = self.rotation.rotation_id;
        let peers: Vec<u64> = self.facts.peers.iter().map(|p| p.id).collect();
        let request = DkgRequest {
            schain: name.clone(),
            group_id: name.clone(),
            node_id: self.facts.own.id,
            rotation_id,
            threshold: dkg_threshold(peers.len()),
            peers,
        };

        info!(
            "[{}] starting DKG for rotation {} (n={}, t={})",
            name,
            rotation_id,
            request.peers.len(),
            request.threshold
        );
        self.record.set(RecordField::DkgStatus(DkgStatus::InProgress)).await?;

        let reason = match self.ctx.dkg.run(request).await {
            Ok(DkgOutcome::Done { key_share, public_key }) => {
                let path = self.ctx.layout.key_share_path(&name, rotation_id);
                write_json_atomic(&path, &KeyShare { key_share, public_key })?;
                self.record.set(RecordField::DkgStatus(DkgStatus::Done)).await?;
                info!("[{}] DKG done, key share stored at {:?}", name, path);
                return Ok(false);
            }
            Ok(DkgOutcome::Failed { reason }) => reason,
            Err(e) => e.to_string(),
        };

        error!("[{}] DKG failed: {}", name, reason);
        self.record.set(RecordField::DkgStatus(DkgStatus::Failed)).await?;
        self.ctx
            .notifier
            .notify(SchainEvent::DkgFailed { schain: name.clone(), reason: reason.clone() })
            .await;
        Err(ActionError::Dkg { schain: name, reason })
    }

    /// `force` rewrites the file even when the check passed.
    async fn config(&mut self, force: bool) -> Result<bool, ActionError> {
        let status = self.checks.status(CheckName::Config);
        if status && !force {
            return Ok(true);
        }
        let name = self.facts.name().to_string();
        let expected = self.ctx.generator.generate(&self.facts, &self.rotation);
        let path = self.ctx.layout.config_path(&name);
        info!("[{}] writing config (rotation {})", name, self.rotation.rotation_id);
        write_config(&path, &expected)?;

        let version = self.ctx.settings.engine_version.clone();
        if self.record.get().config_version != version {
            self.record.set(RecordField::ConfigVersion(version)).await?;
        }
        self.invalidate(CheckName::FirewallRules, "config rewritten");
        Ok(status)
    }

    async fn volume(&mut self) -> Result<bool, ActionError> {
        let status = self.checks.status(CheckName::Volume);
        if !status {
            let name = self.facts.name();
            let size = volume_size(self.facts.schain.tier, self.ctx.settings.disk_size_bytes);
            info!(
                "[{}] creating data volume ({} tier, {} bytes)",
                name, self.facts.schain.tier, size
            );
            self.ctx.runtime.create_volume(&volume_name(name), size).await?;
        }
        Ok(status)
    }

    async fn firewall_rules(&mut self) -> Result<bool, ActionError> {
        let status = self.checks.status(CheckName::FirewallRules);
        if status {
            return Ok(true);
        }
        let name = self.facts.name().to_string();
        let Some(config) = read_config(&self.ctx.layout.config_path(&name))? else {
            warn!("[{}] no config on disk, firewall rules not synced", name);
            return Ok(false);
        };
        let controller = self.ctx.rule_controller(&name, &config);
        let diff = tokio::task::spawn_blocking(move || controller.sync())
            .await
            .map_err(|e| ActionError::Internal(e.to_string()))??;
        debug!(
            "[{}] firewall synced: +{} -{}",
            name,
            diff.to_add.len(),
            diff.to_remove.len()
        );
        Ok(status)
    }

    async fn clear_firewall_rules(&mut self) -> Result<bool, ActionError> {
        let name = self.facts.name().to_string();
        let Some(config) = read_config(&self.ctx.layout.config_path(&name))? else {
            return Ok(true);
        };
        let controller = self.ctx.rule_controller(&name, &config);
        let removed = tokio::task::spawn_blocking(move || controller.cleanup())
            .await
            .map_err(|e| ActionError::Internal(e.to_string()))??;
        self.invalidate(CheckName::FirewallRules, "rules cleared");
        Ok(removed == 0)
    }

    fn worker_spec(&self, snapshot: Option<&SnapshotMode>) -> ContainerSpec {
        let name = self.facts.name();
        let base_port = self.facts.own.base_port;
        let mut cmd = vec![
            "--config".to_string(),
            format!("{}/schain_{}.json", CONFIG_MOUNT, name),
            "-d".to_string(),
            DATA_MOUNT.to_string(),
            "--ipcpath".to_string(),
            DATA_MOUNT.to_string(),
            "--http-port".to_string(),
            SkaledPorts::HttpJson.port(base_port).to_string(),
            "--https-port".to_string(),
            SkaledPorts::HttpsJson.port(base_port).to_string(),
            "--ws-port".to_string(),
            SkaledPorts::WsJson.port(base_port).to_string(),
            "--wss-port".to_string(),
            SkaledPorts::WssJson.port(base_port).to_string(),
        ];
        if let Some(mode) = snapshot {
            cmd.push("--download-snapshot".to_string());
            cmd.push(
                mode.source
                    .as_ref()
                    .map(|ip| format!("http://{}:{}", ip, SkaledPorts::HttpJson.port(base_port)))
                    .unwrap_or_else(|| "readfromconfig".to_string()),
            );
            if let Some(ts) = mode.start_ts {
                cmd.push("--start-timestamp".to_string());
                cmd.push(ts.to_string());
            }
        }

        let mut binds = vec![
            VolumeBind {
                source: self.ctx.layout.schain_dir(name).to_string_lossy().into_owned(),
                target: CONFIG_MOUNT.to_string(),
                read_only: false,
            },
            VolumeBind {
                source: volume_name(name),
                target: DATA_MOUNT.to_string(),
                read_only: false,
            },
        ];
        // TLS endpoints stay off until both files are in place
        let ssl_dir = self.ctx.settings.ssl_dir.as_ref().filter(|dir| {
            dir.join(SSL_KEY_FILE).is_file() && dir.join(SSL_CERT_FILE).is_file()
        });
        match ssl_dir {
            Some(dir) => {
                cmd.push("--ssl-key".to_string());
                cmd.push(format!("{}/{}", SSL_MOUNT, SSL_KEY_FILE));
                cmd.push("--ssl-cert".to_string());
                cmd.push(format!("{}/{}", SSL_MOUNT, SSL_CERT_FILE));
                binds.push(VolumeBind {
                    source: dir.to_string_lossy().into_owned(),
                    target: SSL_MOUNT.to_string(),
                    read_only: true,
                });
            }
            None => debug!("[{}] no TLS material, worker starts without ssl", name),
        }

        let mut env = HashMap::new();
        env.insert("SCHAIN_NAME".to_string(), name.to_string());
        env.insert("DATA_DIR".to_string(), DATA_MOUNT.to_string());

        ContainerSpec {
            name: ContainerKind::Schain.container_name(name),
            image: self.ctx.settings.worker_image.clone(),
            cmd,
            env,
            binds,
            network_mode: self.ctx.settings.network_mode.clone(),
            labels: container_labels(name, ContainerKind::Schain),
        }
    }

    fn relay_spec(&self) -> ContainerSpec {
        let name = self.facts.name();
        let mut env = HashMap::new();
        env.insert("SCHAIN_NAME".to_string(), name.to_string());
        env.insert("SCHAIN_RPC_URL".to_string(), rpc_url(&self.facts.own));
        env.insert("CHAIN_ID".to_string(), self.facts.schain.chain_id.to_string());

        ContainerSpec {
            name: ContainerKind::Ima.container_name(name),
            image: self.ctx.settings.relay_image.clone(),
            cmd: vec![],
            env,
            binds: vec![VolumeBind {
                source: self.ctx.layout.schain_dir(name).to_string_lossy().into_owned(),
                target: CONFIG_MOUNT.to_string(),
                read_only: true,
            }],
            network_mode: self.ctx.settings.network_mode.clone(),
            labels: container_labels(name, ContainerKind::Ima),
        }
    }

    async fn worker_container(&mut self, snapshot: Option<SnapshotMode>) -> Result<bool, ActionError> {
        let status = self.checks.status(CheckName::SkaledContainer);
        if status {
            return Ok(true);
        }
        let name = self.facts.name().to_string();
        let runtime = self.ctx.runtime.clone();

        if !runtime.volume_exists(&volume_name(&name)).await? {
            error!("[{}] data volume does not exist, worker not started", name);
            return Ok(false);
        }

        let container = ContainerKind::Schain.container_name(&name);
        let Some(state) = runtime.container_state(&container).await? else {
            info!("[{}] starting worker container (snapshot: {:?})", name, snapshot);
            runtime.run_container(&self.worker_spec(snapshot.as_ref())).await?;
            self.record.reset_failed_counters().await?;
            return Ok(false);
        };

        let skaled_status = read_skaled_status(&self.ctx.layout.skaled_status_path(&name));
        if skaled_status.exit_time_reached() {
            info!("[{}] worker reached its exit time", name);
            self.record.reset_failed_counters().await?;
        } else if skaled_status.awaits_repair() {
            info!("[{}] worker is waiting for repair", name);
        } else if state.is_failed() {
            warn!("[{}] worker container failed with exit code {}", name, state.exit_code);
            if self.restart_bounded(&container).await? {
                self.record.set(RecordField::FailedRpcCount(0)).await?;
            }
        }
        Ok(status)
    }

    /// Restart unless the restart budget is spent. Returns whether it restarted.
    async fn restart_bounded(&mut self, container: &str) -> Result<bool, ActionError> {
        let name = self.facts.name().to_string();
        let restarts = self.record.get().restart_count;
        let max_restarts = self.ctx.settings.max_restarts;
        if restarts < max_restarts {
            info!("[{}] restarting {} ({}/{})", name, container, restarts + 1, max_restarts);
            self.ctx.runtime.restart_container(container).await?;
            self.record.set(RecordField::RestartCount(restarts + 1)).await?;
            Ok(true)
        } else {
            warn!("[{}] restart limit reached ({}), not restarting", name, restarts);
            let logs = match self.ctx.runtime.container_logs(container, RESTART_LOG_TAIL).await {
                Ok(logs) => logs,
                Err(e) => {
                    warn!("[{}] failed to read logs of {}: {}", name, container, e);
                    String::new()
                }
            };
            self.ctx
                .notifier
                .notify(SchainEvent::RestartLimitReached { schain: name, restart_count: restarts, logs })
                .await;
            Ok(false)
        }
    }

    async fn restart_worker(&mut self) -> Result<bool, ActionError> {
        let name = self.facts.name().to_string();
        let container = ContainerKind::Schain.container_name(&name);
        match self.ctx.runtime.container_state(&container).await? {
            Some(_) => {
                info!("[{}] restarting worker container", name);
                self.ctx.runtime.restart_container(&container).await?;
            }
            None => {
                info!("[{}] worker container absent, starting it", name);
                self.ctx.runtime.run_container(&self.worker_spec(None)).await?;
            }
        }
        self.record.reset_failed_counters().await?;
        Ok(false)
    }

    async fn liveness(&mut self) -> Result<bool, ActionError> {
        let status = self.checks.status(CheckName::Rpc);
        let name = self.facts.name().to_string();
        let container = ContainerKind::Schain.container_name(&name);
        if self.ctx.runtime.container_state(&container).await?.is_none() {
            return Ok(status);
        }

        let failed = self.record.get().failed_rpc_count;
        if status {
            if failed != 0 {
                self.record.set(RecordField::FailedRpcCount(0)).await?;
            }
        } else if failed > self.ctx.settings.max_failed_rpc {
            warn!("[{}] worker RPC failed {} times in a row", name, failed);
            self.restart_bounded(&container).await?;
            self.record.set(RecordField::FailedRpcCount(0)).await?;
        } else {
            debug!("[{}] worker RPC failed ({} so far)", name, failed + 1);
            self.record.set(RecordField::FailedRpcCount(failed + 1)).await?;
        }
        Ok(status)
    }

    async fn relay_container(&mut self) -> Result<bool, ActionError> {
        if !self.facts.bridge_linked {
            return Ok(true);
        }
        let status = self.checks.status(CheckName::ImaContainer);
        if status {
            return Ok(true);
        }
        let name = self.facts.name().to_string();
        let container = ContainerKind::Ima.container_name(&name);
        match self.ctx.runtime.container_state(&container).await? {
            Some(_) => {
                info!("[{}] restarting relay container", name);
                self.ctx.runtime.restart_container(&container).await?;
            }
            None => {
                info!("[{}] starting relay container", name);
                self.ctx.runtime.run_container(&self.relay_spec()).await?;
            }
        }
        Ok(status)
    }

    async fn rotation_request(&mut self) -> Result<bool, ActionError> {
        let name = self.facts.name().to_string();
        let finish_ts = self.rotation.finish_ts;
        let path = self.ctx.layout.exit_schedule_path(&name);

        let status = read_exit_schedule(&path)?.is_some_and(|s| s.timestamp == finish_ts);
        if !status {
            info!("[{}] scheduling worker exit at {}", name, finish_ts);
            self.ctx.rpc.submit_exit_time(&rpc_url(&self.facts.own), finish_ts).await?;
            write_exit_schedule(&path, finish_ts)?;
        }
        Ok(status)
    }

    fn clear_exit_schedule(&mut self) -> Result<bool, ActionError> {
        let path = self.ctx.layout.exit_schedule_path(self.facts.name());
        let removed = remove_if_exists(&path)?;
        if removed {
            info!("[{}] exit schedule cleared", self.facts.name());
        }
        Ok(!removed)
    }
}

fn container_labels(name: &str, kind: ContainerKind) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    labels.insert("schain".to_string(), name.to_string());
    labels.insert("kind".to_string(), kind.as_str().to_string());
    labels
}
