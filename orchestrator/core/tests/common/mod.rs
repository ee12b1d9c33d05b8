// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory collaborators shared by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use schain_admin_core::application::config_generator::ConfigGenerator;
use schain_admin_core::application::context::EngineContext;
use schain_admin_core::application::settings::EngineSettings;
use schain_admin_core::domain::chain::{
    ChainClient, ChainError, DkgClient, DkgOutcome, DkgRequest, WorkerRpc,
};
use schain_admin_core::domain::events::{Notifier, SchainEvent};
use schain_admin_core::domain::firewall::{FirewallError, FirewallRule, HostFirewall};
use schain_admin_core::domain::layout::SchainLayout;
use schain_admin_core::domain::process::{ProcessControl, ProcessError, Signal};
use schain_admin_core::domain::runtime::{
    ContainerKind, ContainerRuntime, ContainerSpec, ContainerState, ContainerStatus, RuntimeError,
};
use schain_admin_core::domain::schain::{
    NodeId, PreviousPublicKey, RotationFacts, Schain, SchainNode, SchainTier,
};
use schain_admin_core::infrastructure::repositories::InMemorySchainRecordRepository;

pub const SCHAIN: &str = "w1";
pub const BASE_PORT: u16 = 10000;

// ---------------------------------------------------------------------------
// Container runtime
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<String, ContainerState>>,
    volumes: Mutex<HashMap<String, u64>>,
    ops: Mutex<Vec<String>>,
    specs: Mutex<Vec<ContainerSpec>>,
    state_failures: Mutex<HashMap<String, usize>>,
}

impl FakeRuntime {
    /// The next `times` state reads of `name` fail as if the daemon were down.
    pub fn fail_state_reads(&self, name: &str, times: usize) {
        self.state_failures.lock().insert(name.to_string(), times);
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().clone()
    }

    pub fn set_state(&self, name: &str, status: ContainerStatus, exit_code: i64) {
        self.containers
            .lock()
            .insert(name.to_string(), ContainerState { status, exit_code });
    }

    pub fn state(&self, name: &str) -> Option<ContainerState> {
        self.containers.lock().get(name).copied()
    }

    pub fn add_volume(&self, name: &str) {
        self.volumes.lock().insert(name.to_string(), 1);
    }

    pub fn volume_size(&self, name: &str) -> Option<u64> {
        self.volumes.lock().get(name).copied()
    }

    fn record(&self, op: String) {
        self.ops.lock().push(op);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn container_state(&self, name: &str) -> Result<Option<ContainerState>, RuntimeError> {
        if let Some(left) = self.state_failures.lock().get_mut(name) {
            if *left > 0 {
                *left -= 1;
                return Err(RuntimeError::Unavailable("docker daemon not responding".to_string()));
            }
        }
        Ok(self.state(name))
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        self.record(format!("run {}", spec.name));
        self.specs.lock().push(spec.clone());
        self.set_state(&spec.name, ContainerStatus::Running, 0);
        Ok(())
    }

    async fn restart_container(&self, name: &str) -> Result<(), RuntimeError> {
        if self.state(name).is_none() {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        self.record(format!("restart {}", name));
        self.set_state(name, ContainerStatus::Running, 0);
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        if self.containers.lock().remove(name).is_some() {
            self.record(format!("remove {}", name));
        }
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        Ok(self.volumes.lock().contains_key(name))
    }

    async fn create_volume(&self, name: &str, size_bytes: u64) -> Result<(), RuntimeError> {
        self.record(format!("create_volume {}", name));
        self.volumes.lock().insert(name.to_string(), size_bytes);
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        if self.volumes.lock().remove(name).is_some() {
            self.record(format!("remove_volume {}", name));
        }
        Ok(())
    }

    async fn container_logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError> {
        Ok(format!("last {} lines of {}", tail, name))
    }
}

// ---------------------------------------------------------------------------
// Host firewall
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeFirewall {
    rules: Mutex<BTreeSet<FirewallRule>>,
    added: AtomicUsize,
    removed: AtomicUsize,
}

impl FakeFirewall {
    pub fn with_rules(rules: impl IntoIterator<Item = FirewallRule>) -> Self {
        let fw = Self::default();
        fw.rules.lock().extend(rules);
        fw
    }

    pub fn snapshot(&self) -> BTreeSet<FirewallRule> {
        self.rules.lock().clone()
    }

    pub fn added(&self) -> usize {
        self.added.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }
}

impl HostFirewall for FakeFirewall {
    fn rules(&self) -> Result<Vec<FirewallRule>, FirewallError> {
        Ok(self.rules.lock().iter().copied().collect())
    }

    fn add_rule(&self, rule: &FirewallRule) -> Result<(), FirewallError> {
        if self.rules.lock().insert(*rule) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn remove_rule(&self, rule: &FirewallRule) -> Result<(), FirewallError> {
        if self.rules.lock().remove(rule) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chain gateway
// ---------------------------------------------------------------------------

pub fn node(id: NodeId) -> SchainNode {
    SchainNode {
        id,
        name: format!("node-{}", id),
        ip: Ipv4Addr::new(10, 0, 0, id as u8),
        public_ip: Ipv4Addr::new(192, 168, 0, id as u8),
        base_port: BASE_PORT,
        ecdsa_public_key: format!("0xecdsa{}", id),
        schain_index: id as u32,
    }
}

pub fn schain(name: &str) -> Schain {
    Schain {
        name: name.to_string(),
        generation: 1,
        tier: SchainTier::Medium,
        mainnet_owner: "0x0000000000000000000000000000000000000001".to_string(),
        chain_id: 1_289_306_510,
        active: true,
    }
}

pub struct ChainState {
    pub schains: HashMap<String, Schain>,
    pub peers: Vec<SchainNode>,
    pub rotation: RotationFacts,
    pub previous_keys: Vec<PreviousPublicKey>,
    pub bridge_linked: bool,
    pub assigned: Vec<String>,
    pub leaving: Vec<String>,
    pub dkg_timeout: u64,
}

pub struct FakeChain {
    pub state: Mutex<ChainState>,
}

impl FakeChain {
    /// `w1` on nodes 1..=4, no rotation.
    pub fn new() -> Self {
        let mut schains = HashMap::new();
        schains.insert(SCHAIN.to_string(), schain(SCHAIN));
        Self {
            state: Mutex::new(ChainState {
                schains,
                peers: (1..=4).map(node).collect(),
                rotation: RotationFacts::default(),
                previous_keys: vec![],
                bridge_linked: true,
                assigned: vec![SCHAIN.to_string()],
                leaving: vec![],
                dkg_timeout: 3600,
            }),
        }
    }

    pub fn set_rotation(&self, rotation: RotationFacts) {
        self.state.lock().rotation = rotation;
    }

    pub fn set_peers(&self, ids: &[NodeId]) {
        self.state.lock().peers = ids.iter().copied().map(node).collect();
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn get_schains_for_node(&self, _node_id: NodeId) -> Result<Vec<Schain>, ChainError> {
        let state = self.state.lock();
        Ok(state.assigned.iter().filter_map(|n| state.schains.get(n).cloned()).collect())
    }

    async fn get_leaving_schains_for_node(
        &self,
        _node_id: NodeId,
    ) -> Result<Vec<Schain>, ChainError> {
        let state = self.state.lock();
        Ok(state.leaving.iter().filter_map(|n| state.schains.get(n).cloned()).collect())
    }

    async fn get_schain(&self, name: &str) -> Result<Schain, ChainError> {
        self.state
            .lock()
            .schains
            .get(name)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(name.to_string()))
    }

    async fn get_rotation_facts(&self, _name: &str) -> Result<RotationFacts, ChainError> {
        Ok(self.state.lock().rotation.clone())
    }

    async fn get_peer_list(&self, _name: &str) -> Result<Vec<SchainNode>, ChainError> {
        Ok(self.state.lock().peers.clone())
    }

    async fn get_previous_public_keys(
        &self,
        _name: &str,
    ) -> Result<Vec<PreviousPublicKey>, ChainError> {
        Ok(self.state.lock().previous_keys.clone())
    }

    async fn get_node(&self, node_id: NodeId) -> Result<SchainNode, ChainError> {
        Ok(node(node_id))
    }

    async fn is_bridge_linked(&self, _name: &str) -> Result<bool, ChainError> {
        Ok(self.state.lock().bridge_linked)
    }

    async fn get_dkg_timeout(&self) -> Result<u64, ChainError> {
        Ok(self.state.lock().dkg_timeout)
    }
}

// ---------------------------------------------------------------------------
// DKG
// ---------------------------------------------------------------------------

pub struct FakeDkg {
    outcome: Mutex<DkgOutcome>,
    pub requests: Mutex<Vec<DkgRequest>>,
}

impl FakeDkg {
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(DkgOutcome::Done {
                key_share: "0xshare".to_string(),
                public_key: "0xpublic".to_string(),
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_with(&self, reason: &str) {
        *self.outcome.lock() = DkgOutcome::Failed { reason: reason.to_string() };
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl DkgClient for FakeDkg {
    async fn run(&self, request: DkgRequest) -> Result<DkgOutcome, ChainError> {
        self.requests.lock().push(request);
        Ok(self.outcome.lock().clone())
    }
}

// ---------------------------------------------------------------------------
// Worker RPC
// ---------------------------------------------------------------------------

pub struct FakeRpc {
    healthy: Mutex<bool>,
    pub exit_times: Mutex<Vec<(String, i64)>>,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self { healthy: Mutex::new(true), exit_times: Mutex::new(Vec::new()) }
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock() = healthy;
    }

    pub fn exit_time_calls(&self) -> usize {
        self.exit_times.lock().len()
    }
}

#[async_trait]
impl WorkerRpc for FakeRpc {
    async fn block_number(&self, url: &str, timeout: Duration) -> Result<u64, ChainError> {
        if *self.healthy.lock() {
            Ok(42)
        } else {
            Err(ChainError::Request(format!("{} did not answer within {:?}", url, timeout)))
        }
    }

    async fn submit_exit_time(&self, url: &str, finish_ts: i64) -> Result<(), ChainError> {
        self.exit_times.lock().push((url.to_string(), finish_ts));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<SchainEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<SchainEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: SchainEvent) {
        self.events.lock().push(event);
    }
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

pub struct FakeProcess {
    next_pid: AtomicU32,
    alive: Mutex<HashSet<u32>>,
    ignores_term: Mutex<HashSet<u32>>,
    pub spawned: Mutex<Vec<(String, u32)>>,
    pub signals: Mutex<Vec<(u32, Signal)>>,
}

impl FakeProcess {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(1000),
            alive: Mutex::new(HashSet::new()),
            ignores_term: Mutex::new(HashSet::new()),
            spawned: Mutex::new(Vec::new()),
            signals: Mutex::new(Vec::new()),
        }
    }

    /// A process that exists but was not spawned by this fake.
    pub fn adopt(&self, pid: u32) {
        self.alive.lock().insert(pid);
    }

    pub fn ignore_sigterm(&self, pid: u32) {
        self.ignores_term.lock().insert(pid);
    }

    pub fn kill_externally(&self, pid: u32) {
        self.alive.lock().remove(&pid);
    }

    pub fn signals_for(&self, pid: u32) -> Vec<Signal> {
        self.signals.lock().iter().filter(|(p, _)| *p == pid).map(|(_, s)| *s).collect()
    }
}

impl ProcessControl for FakeProcess {
    fn spawn_worker(&self, schain: &str) -> Result<u32, ProcessError> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.alive.lock().insert(pid);
        self.spawned.lock().push((schain.to_string(), pid));
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        pid != 0 && self.alive.lock().contains(&pid)
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError> {
        self.signals.lock().push((pid, signal));
        let stubborn = self.ignores_term.lock().contains(&pid);
        if signal == Signal::Kill || !stubborn {
            self.alive.lock().remove(&pid);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

pub struct TestEnv {
    pub dir: TempDir,
    pub runtime: Arc<FakeRuntime>,
    pub firewall: Arc<FakeFirewall>,
    pub chain: Arc<FakeChain>,
    pub dkg: Arc<FakeDkg>,
    pub rpc: Arc<FakeRpc>,
    pub notifier: Arc<RecordingNotifier>,
    pub process: Arc<FakeProcess>,
    pub records: Arc<InMemorySchainRecordRepository>,
    pub ctx: Arc<EngineContext>,
}

impl TestEnv {
    /// Environment for node `node_id` with default settings.
    pub fn new(node_id: NodeId) -> Self {
        Self::with_settings(node_id, |_| {})
    }

    pub fn with_settings(node_id: NodeId, configure: impl FnOnce(&mut EngineSettings)) -> Self {
        Self::build(node_id, Arc::new(FakeFirewall::default()), configure)
    }

    pub fn with_firewall(node_id: NodeId, firewall: FakeFirewall) -> Self {
        Self::build(node_id, Arc::new(firewall), |_| {})
    }

    fn build(
        node_id: NodeId,
        firewall: Arc<FakeFirewall>,
        configure: impl FnOnce(&mut EngineSettings),
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = Arc::new(FakeRuntime::default());
        let chain = Arc::new(FakeChain::new());
        let dkg = Arc::new(FakeDkg::new());
        let rpc = Arc::new(FakeRpc::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let process = Arc::new(FakeProcess::new());
        let records = Arc::new(InMemorySchainRecordRepository::new());

        let mut settings = EngineSettings {
            node_id,
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(20),
            supervisor_interval: Duration::from_millis(50),
            termination_grace: Duration::from_millis(300),
            ..EngineSettings::default()
        };
        configure(&mut settings);

        let ctx = Arc::new(EngineContext {
            settings,
            layout: SchainLayout::new(dir.path().join("schains")),
            generator: ConfigGenerator::default(),
            runtime: runtime.clone(),
            firewall: firewall.clone(),
            chain: chain.clone(),
            dkg: dkg.clone(),
            rpc: rpc.clone(),
            records: records.clone(),
            notifier: notifier.clone(),
            process: process.clone(),
        });

        Self { dir, runtime, firewall, chain, dkg, rpc, notifier, process, records, ctx }
    }

    pub fn worker(&self) -> String {
        ContainerKind::Schain.container_name(SCHAIN)
    }

    pub fn relay(&self) -> String {
        ContainerKind::Ima.container_name(SCHAIN)
    }
}
