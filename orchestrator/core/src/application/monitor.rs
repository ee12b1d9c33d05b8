// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Monitor Runner
//!
//! One reconciliation cycle for one workload:
//!
//! 1. Fetch chain facts and rotation facts, removing the workload when the
//!    node no longer serves it
//! 2. Upsert the record and apply a pending reload
//! 3. Compute checks
//! 4. Classify, pick the program, run its steps in order
//! 5. Clear one-shot record flags
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Glue between checks, classifier and actions
//! - **Related:** `application::reconcile` (the loop around this)

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::actions::{ActionError, ActionManager, ExecutedAction, RecordHandle};
use crate::application::checks::ChecksEngine;
use crate::application::config_generator::read_config;
use crate::application::context::EngineContext;
use crate::domain::checks::ChecksSnapshot;
use crate::domain::events::SchainEvent;
use crate::domain::monitor::{
    classify, rotation_role, ClassifierInputs, MonitorKind, Program, RotationRole,
};
use crate::domain::record::{RecordField, SchainRecord};
use crate::domain::runtime::{volume_name, ContainerKind};
use crate::domain::schain::{RotationFacts, WorkloadFacts};
use crate::infrastructure::state_files::read_exit_schedule;

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub schain: String,
    pub monitor: MonitorKind,
    pub program: Program,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RotationRole>,
    pub checks: ChecksSnapshot,
    pub executed: Vec<ExecutedAction>,
}

impl CycleReport {
    /// `step=initial_status` pairs in execution order.
    pub fn summary(&self) -> String {
        self.executed
            .iter()
            .map(|a| match a.initial_status {
                Some(status) => format!("{}={}", a.step, status),
                None => format!("{}=error", a.step),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(Box<CycleReport>),
    /// The node no longer serves this workload.
    Finished,
}

pub struct MonitorRunner {
    ctx: Arc<EngineContext>,
    checks: ChecksEngine,
}

impl MonitorRunner {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        let checks = ChecksEngine::new(ctx.clone());
        Self { ctx, checks }
    }

    pub async fn gather_facts(&self, name: &str) -> Result<(WorkloadFacts, RotationFacts), ActionError> {
        let chain = &self.ctx.chain;
        let node_id = self.ctx.settings.node_id;

        let schain = chain.get_schain(name).await?;
        let peers = chain.get_peer_list(name).await?;
        let own = match peers.iter().find(|p| p.id == node_id) {
            Some(node) => node.clone(),
            None => chain.get_node(node_id).await?,
        };
        let previous_keys = chain.get_previous_public_keys(name).await?;
        let bridge_linked = chain.is_bridge_linked(name).await?;
        let rotation = chain.get_rotation_facts(name).await?;
        rotation.validate()?;
        own.validate()?;
        for peer in &peers {
            peer.validate()?;
        }

        Ok((WorkloadFacts { schain, peers, own, previous_keys, bridge_linked }, rotation))
    }

    /// Checks only, without touching anything.
    pub async fn inspect(&self, name: &str) -> Result<ChecksSnapshot, ActionError> {
        let (facts, rotation) = self.gather_facts(name).await?;
        let record = match self.ctx.records.get_by_name(name).await? {
            Some(record) => record,
            None => SchainRecord::new(name),
        };
        Ok(self.checks.compute(&facts, &record, &rotation).await)
    }

    pub async fn run_cycle(&self, name: &str) -> Result<CycleOutcome, ActionError> {
        let (facts, rotation) = self.gather_facts(name).await?;

        if !facts.schain.active || (!facts.is_member() && !rotation.in_progress) {
            info!("[{}] node no longer serves this workload", name);
            self.remove_workload(name).await?;
            return Ok(CycleOutcome::Finished);
        }

        let record = self.ctx.records.upsert(name).await?;
        let mut record = RecordHandle::new(self.ctx.records.clone(), record);

        if record.get().needs_reload {
            info!("[{}] reload requested, removing worker container", name);
            self.ctx
                .runtime
                .remove_container(&ContainerKind::Schain.container_name(name))
                .await?;
            record.set(RecordField::NeedsReload(false)).await?;
        }
        record.set(RecordField::MonitorLastSeen(chrono::Utc::now())).await?;

        let checks = self.checks.compute(&facts, record.get(), &rotation).await;
        let first_run = record.get().first_run;
        if first_run {
            record.reset_failed_counters().await?;
        } else if !checks.all_passed() {
            self.ctx
                .notifier
                .notify(SchainEvent::ChecksFailed { schain: name.to_string(), failed: checks.failed() })
                .await;
        }

        let inputs = self.classifier_inputs(name, record.get(), &rotation).await?;
        let monitor = classify(&inputs);
        if monitor == MonitorKind::Repair {
            warn!(
                "[{}] repair triggered (repair_mode: {}, exit_code_ok: {})",
                name, inputs.repair_mode, inputs.exit_code_ok
            );
            self.ctx
                .notifier
                .notify(SchainEvent::RepairTriggered {
                    schain: name.to_string(),
                    repair_mode: inputs.repair_mode,
                    exit_code_ok: inputs.exit_code_ok,
                })
                .await;
        }

        let role = (monitor == MonitorKind::Rotation).then(|| {
            let config_present = self.ctx.layout.config_path(name).is_file();
            rotation_role(self.ctx.settings.node_id, &rotation, config_present)
        });
        let program = Program::select(monitor, role);
        metrics::counter!("schain_admin_monitor_runs_total", "monitor" => monitor.as_str())
            .increment(1);
        info!("[{}] running {} monitor ({:?}, role: {:?})", name, monitor, program, role);

        let mut actions = ActionManager::new(self.ctx.clone(), facts, rotation, checks.clone(), record);
        for step in program.steps() {
            if let Err(e) = actions.execute(*step).await {
                if matches!(e, ActionError::Dkg { .. }) && removes_directory_on_dkg_failure(program) {
                    let dir = self.ctx.layout.schain_dir(name);
                    warn!("[{}] removing workload directory {:?} after failed DKG", name, dir);
                    if let Err(remove_err) = std::fs::remove_dir_all(&dir) {
                        warn!("[{}] failed to remove {:?}: {}", name, dir, remove_err);
                    }
                }
                return Err(e);
            }
        }

        let (mut record, executed) = actions.into_parts();
        if monitor == MonitorKind::Repair {
            record.set(RecordField::RepairMode(false)).await?;
            record.set(RecordField::SnapshotSource(None)).await?;
        }
        if record.get().first_run {
            record.set(RecordField::FirstRun(false)).await?;
        }
        if record.get().new_schain {
            record.set(RecordField::NewSchain(false)).await?;
        }

        let report = CycleReport {
            schain: name.to_string(),
            monitor,
            program,
            role,
            checks,
            executed,
        };
        info!("[{}] {} monitor finished: {}", name, monitor, report.summary());
        Ok(CycleOutcome::Completed(Box::new(report)))
    }

    /// Containers, volume, firewall rules and directory go; the record stays
    /// behind marked deleted.
    async fn remove_workload(&self, name: &str) -> Result<(), ActionError> {
        let runtime = &self.ctx.runtime;
        for kind in [ContainerKind::Schain, ContainerKind::Ima] {
            runtime.remove_container(&kind.container_name(name)).await?;
        }
        runtime.remove_volume(&volume_name(name)).await?;

        // the port window is only known from the config
        if let Some(config) = read_config(&self.ctx.layout.config_path(name))? {
            let controller = self.ctx.rule_controller(name, &config);
            let removed = tokio::task::spawn_blocking(move || controller.cleanup())
                .await
                .map_err(|e| ActionError::Internal(e.to_string()))??;
            info!("[{}] removed {} firewall rules", name, removed);
        }

        let dir = self.ctx.layout.schain_dir(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            info!("[{}] removed workload directory {:?}", name, dir);
        }

        if self.ctx.records.get_by_name(name).await?.is_some() {
            self.ctx.records.set(name, RecordField::IsDeleted(true)).await?;
        }
        Ok(())
    }

    /// A worker state that cannot be read aborts the cycle. Only a confirmed
    /// fatal exit code selects Repair.
    async fn classifier_inputs(
        &self,
        name: &str,
        record: &SchainRecord,
        rotation: &RotationFacts,
    ) -> Result<ClassifierInputs, ActionError> {
        let exit_scheduled = match read_exit_schedule(&self.ctx.layout.exit_schedule_path(name)) {
            Ok(schedule) => schedule.is_some(),
            Err(e) => {
                warn!("[{}] unreadable exit schedule: {}", name, e);
                true
            }
        };
        let worker = self
            .ctx
            .runtime
            .container_state(&ContainerKind::Schain.container_name(name))
            .await?;

        Ok(ClassifierInputs {
            first_run: record.first_run,
            new_schain: record.new_schain,
            backup_run: self.ctx.settings.backup_run,
            repair_mode: record.repair_mode,
            exit_code_ok: worker.map_or(true, |s| s.exit_code_ok()),
            rotation_in_progress: rotation.in_progress,
            exit_scheduled,
            exited_cleanly: worker.is_some_and(|s| s.exited_cleanly()),
        })
    }
}

/// Programs that create the directory in the same cycle as the DKG.
fn removes_directory_on_dkg_failure(program: Program) -> bool {
    matches!(program, Program::Regular | Program::RotationNew)
}
