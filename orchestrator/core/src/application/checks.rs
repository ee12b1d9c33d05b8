// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Checks Engine
//!
//! Probes each aspect of one workload against its external source and
//! collects the answers into a [`ChecksSnapshot`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Side-effect free desired-vs-actual comparison
//!
//! A probe error never escapes `compute`: the aspect degrades to
//! `status = false` with the error text as message.

use std::sync::Arc;

use crate::application::config_generator::read_config;
use crate::application::context::EngineContext;
use crate::domain::checks::{CheckName, CheckResult, ChecksSnapshot};
use crate::domain::firewall::SkaledPorts;
use crate::domain::record::SchainRecord;
use crate::domain::runtime::{volume_name, ContainerKind, ContainerState, RuntimeError};
use crate::domain::schain::{RotationFacts, SchainNode, WorkloadFacts};

/// HTTP JSON-RPC endpoint of the local worker.
pub fn rpc_url(own: &SchainNode) -> String {
    format!("http://{}:{}", own.ip, SkaledPorts::HttpJson.port(own.base_port))
}

pub struct ChecksEngine {
    ctx: Arc<EngineContext>,
}

impl ChecksEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub async fn compute(
        &self,
        facts: &WorkloadFacts,
        record: &SchainRecord,
        rotation: &RotationFacts,
    ) -> ChecksSnapshot {
        let name = facts.name();
        let mut snapshot = ChecksSnapshot::new();

        snapshot.insert(CheckName::ConfigDir, self.config_dir(name));
        snapshot.insert(CheckName::Dkg, self.dkg(name, rotation));
        snapshot.insert(CheckName::Config, self.config(facts, record, rotation));
        snapshot.insert(CheckName::Volume, self.volume(name).await);
        snapshot.insert(CheckName::FirewallRules, self.firewall_rules(name).await);

        let worker = self.container_state(ContainerKind::Schain, name).await;
        snapshot.insert(
            CheckName::SkaledContainer,
            CheckResult::from_probe(worker.as_ref().map(|s| s.is_some_and(|s| s.is_running()))),
        );
        snapshot.insert(
            CheckName::ExitCodeOk,
            CheckResult::from_probe(worker.as_ref().map(|s| s.map_or(true, |s| s.exit_code_ok()))),
        );

        snapshot.insert(CheckName::Rpc, self.rpc(facts, record).await);
        snapshot.insert(CheckName::ImaContainer, self.ima_container(facts).await);
        snapshot.insert(CheckName::Process, self.process(record));

        tracing::debug!("[{}] checks: {}", name, snapshot);
        snapshot
    }

    /// The heartbeat alone may create the workload directory, so the data
    /// subdirectory is what marks it as provisioned.
    fn config_dir(&self, name: &str) -> CheckResult {
        CheckResult::from_bool(self.ctx.layout.data_dir(name).is_dir())
    }

    fn dkg(&self, name: &str, rotation: &RotationFacts) -> CheckResult {
        let path = self.ctx.layout.key_share_path(name, rotation.rotation_id);
        CheckResult::from_bool(path.is_file())
    }

    fn config(
        &self,
        facts: &WorkloadFacts,
        record: &SchainRecord,
        rotation: &RotationFacts,
    ) -> CheckResult {
        let path = self.ctx.layout.config_path(facts.name());
        match read_config(&path) {
            Ok(Some(current)) => {
                if current != self.ctx.generator.generate(facts, rotation) {
                    CheckResult::fail("config is stale")
                } else if record.config_version != self.ctx.settings.engine_version {
                    CheckResult::fail(format!(
                        "config version {} differs from engine version {}",
                        record.config_version, self.ctx.settings.engine_version
                    ))
                } else {
                    CheckResult::pass()
                }
            }
            Ok(None) => CheckResult::fail("config file is absent"),
            Err(e) => CheckResult::fail(e.to_string()),
        }
    }

    async fn volume(&self, name: &str) -> CheckResult {
        CheckResult::from_probe(self.ctx.runtime.volume_exists(&volume_name(name)).await)
    }

    /// Compares against the config on disk, not the expected one.
    async fn firewall_rules(&self, name: &str) -> CheckResult {
        let config = match read_config(&self.ctx.layout.config_path(name)) {
            Ok(Some(config)) => config,
            Ok(None) => return CheckResult::fail("config file is absent"),
            Err(e) => return CheckResult::fail(e.to_string()),
        };
        let controller = self.ctx.rule_controller(name, &config);
        match tokio::task::spawn_blocking(move || controller.is_synced()).await {
            Ok(result) => CheckResult::from_probe(result),
            Err(e) => CheckResult::fail(e.to_string()),
        }
    }

    async fn container_state(
        &self,
        kind: ContainerKind,
        name: &str,
    ) -> Result<Option<ContainerState>, RuntimeError> {
        self.ctx.runtime.container_state(&kind.container_name(name)).await
    }

    async fn rpc(&self, facts: &WorkloadFacts, record: &SchainRecord) -> CheckResult {
        let timeout = self.ctx.settings.rpc_timeout_for(record.failed_rpc_count);
        match self.ctx.rpc.block_number(&rpc_url(&facts.own), timeout).await {
            Ok(_) => CheckResult::pass(),
            Err(e) => CheckResult::fail(e.to_string()),
        }
    }

    async fn ima_container(&self, facts: &WorkloadFacts) -> CheckResult {
        if !facts.bridge_linked {
            return CheckResult::pass();
        }
        let state = self.container_state(ContainerKind::Ima, facts.name()).await;
        CheckResult::from_probe(state.map(|s| s.is_some_and(|s| s.is_running())))
    }

    fn process(&self, record: &SchainRecord) -> CheckResult {
        let pid = record.monitor_pid;
        CheckResult::from_bool(pid != 0 && self.ctx.process.is_alive(pid))
    }
}
