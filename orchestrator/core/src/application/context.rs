// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Collaborators shared by the checks engine, the actions and the loops.
//!
//! Built once per process by the CLI and passed around as `Arc<EngineContext>`.

use std::sync::Arc;

use crate::application::config_generator::ConfigGenerator;
use crate::application::firewall::{FirewallScope, RuleController};
use crate::application::settings::EngineSettings;
use crate::domain::chain::{ChainClient, DkgClient, WorkerRpc};
use crate::domain::events::Notifier;
use crate::domain::firewall::HostFirewall;
use crate::domain::layout::SchainLayout;
use crate::domain::process::ProcessControl;
use crate::domain::repository::SchainRecordRepository;
use crate::domain::runtime::ContainerRuntime;
use crate::domain::schain_config::SchainConfig;

pub struct EngineContext {
    pub settings: EngineSettings,
    pub layout: SchainLayout,
    pub generator: ConfigGenerator,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub firewall: Arc<dyn HostFirewall>,
    pub chain: Arc<dyn ChainClient>,
    pub dkg: Arc<dyn DkgClient>,
    pub rpc: Arc<dyn WorkerRpc>,
    pub records: Arc<dyn SchainRecordRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub process: Arc<dyn ProcessControl>,
}

impl EngineContext {
    /// Rule controller scoped to the port window of `config`.
    pub fn rule_controller(&self, name: &str, config: &SchainConfig) -> RuleController {
        RuleController::new(
            name,
            self.firewall.clone(),
            FirewallScope::from_config(config, &self.settings.sync_ranges),
        )
    }
}
