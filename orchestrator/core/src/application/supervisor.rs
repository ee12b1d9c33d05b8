// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Process Supervisor
//!
//! Keeps exactly one live worker process per workload the node serves.
//!
//! ## Tick
//! | Worker state | Action |
//! |--------------|--------|
//! | alive, heartbeat fresh | nothing |
//! | alive, heartbeat older than `dkg_timeout × 2.2` | SIGTERM, wait grace, SIGKILL, respawn |
//! | not alive or never spawned | spawn, record pid |
//!
//! On shutdown every owned worker receives SIGTERM at once, and whatever is
//! still alive after the grace period is killed.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::context::EngineContext;
use crate::domain::chain::ChainError;
use crate::domain::events::SchainEvent;
use crate::domain::process::{stuck_timeout, ProcessError, Signal};
use crate::domain::record::RecordField;
use crate::domain::repository::RepositoryError;
use crate::infrastructure::state_files::read_heartbeat;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub spawned: Vec<String>,
    pub terminated: Vec<String>,
    pub healthy: Vec<String>,
}

pub struct ProcessSupervisor {
    ctx: Arc<EngineContext>,
    owned: Mutex<HashMap<String, u32>>,
}

impl ProcessSupervisor {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx, owned: Mutex::new(HashMap::new()) }
    }

    /// Pids of workers spawned by this supervisor.
    pub fn owned(&self) -> HashMap<String, u32> {
        self.owned.lock().clone()
    }

    /// Active workloads assigned to the node plus the ones it is leaving.
    pub async fn workloads(&self) -> Result<Vec<String>, SupervisorError> {
        let node_id = self.ctx.settings.node_id;
        let mut schains = self.ctx.chain.get_schains_for_node(node_id).await?;
        schains.extend(self.ctx.chain.get_leaving_schains_for_node(node_id).await?);

        let names: BTreeSet<String> = schains
            .into_iter()
            .filter(|s| {
                if !s.active {
                    info!("[{}] workload is inactive, skipping", s.name);
                }
                s.active
            })
            .map(|s| s.name)
            .collect();
        Ok(names.into_iter().collect())
    }

    pub async fn tick(&self) -> Result<TickReport, SupervisorError> {
        let names = self.workloads().await?;
        let stuck_after = stuck_timeout(self.ctx.chain.get_dkg_timeout().await?);
        let mut report = TickReport::default();

        for name in names {
            if let Err(e) = self.supervise(&name, stuck_after, &mut report).await {
                error!("[{}] supervision failed: {}", name, e);
            }
        }

        metrics::gauge!("schain_admin_workers").set(self.owned.lock().len() as f64);
        Ok(report)
    }

    async fn supervise(
        &self,
        name: &str,
        stuck_after: Duration,
        report: &mut TickReport,
    ) -> Result<(), SupervisorError> {
        let record = self.ctx.records.upsert(name).await?;
        let pid = record.monitor_pid;

        if pid != 0 && self.ctx.process.is_alive(pid) {
            let heartbeat = read_heartbeat(&self.ctx.layout.heartbeat_path(name));
            let stuck = heartbeat.is_some_and(|hb| hb.pid == pid && hb.is_stale(Utc::now(), stuck_after));
            if !stuck {
                report.healthy.push(name.to_string());
                return Ok(());
            }
            warn!("[{}] worker {} is stuck (no heartbeat for {:?})", name, pid, stuck_after);
            self.terminate(name, pid).await;
            report.terminated.push(name.to_string());
        }

        let new_pid = self.ctx.process.spawn_worker(name)?;
        self.ctx.records.set(name, RecordField::MonitorPid(new_pid)).await?;
        self.owned.lock().insert(name.to_string(), new_pid);
        info!("[{}] worker spawned with pid {}", name, new_pid);
        metrics::counter!("schain_admin_workers_spawned_total").increment(1);
        report.spawned.push(name.to_string());
        Ok(())
    }

    /// SIGTERM, wait up to the grace period, then SIGKILL. Returns whether the
    /// kill was needed.
    pub async fn terminate(&self, name: &str, pid: u32) -> bool {
        if let Err(e) = self.ctx.process.signal(pid, Signal::Terminate) {
            warn!("[{}] {}", name, e);
        }

        let deadline = Instant::now() + self.ctx.settings.termination_grace;
        while self.ctx.process.is_alive(pid) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }

        let forced = self.ctx.process.is_alive(pid);
        if forced {
            warn!("[{}] worker {} ignored SIGTERM, killing", name, pid);
            if let Err(e) = self.ctx.process.signal(pid, Signal::Kill) {
                error!("[{}] {}", name, e);
            }
        }

        {
            let mut owned = self.owned.lock();
            if owned.get(name) == Some(&pid) {
                owned.remove(name);
            }
        }
        self.ctx
            .notifier
            .notify(SchainEvent::WorkerTerminated { schain: name.to_string(), pid, forced })
            .await;
        forced
    }

    /// Terminate every owned worker concurrently.
    pub async fn shutdown(&self) {
        let workers: Vec<(String, u32)> = self
            .owned()
            .into_iter()
            .filter(|(_, pid)| self.ctx.process.is_alive(*pid))
            .collect();
        if workers.is_empty() {
            return;
        }
        info!("Stopping {} worker(s)", workers.len());
        futures::future::join_all(workers.iter().map(|(name, pid)| self.terminate(name, *pid))).await;
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Process supervisor started (interval {:?})",
            self.ctx.settings.supervisor_interval
        );
        loop {
            match self.tick().await {
                Ok(report) => info!(
                    "Supervisor tick: {} healthy, {} spawned, {} terminated",
                    report.healthy.len(),
                    report.spawned.len(),
                    report.terminated.len()
                ),
                Err(e) => error!("Supervisor tick failed: {}", e),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.ctx.settings.supervisor_interval) => {}
            }
        }
        self.shutdown().await;
        info!("Process supervisor stopped");
    }
}
