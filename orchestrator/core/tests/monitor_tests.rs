// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use common::{TestEnv, SCHAIN};
use schain_admin_core::application::actions::ActionError;
use schain_admin_core::application::allocation::volume_size;
use schain_admin_core::application::monitor::{CycleOutcome, CycleReport, MonitorRunner};
use schain_admin_core::domain::checks::CheckName;
use schain_admin_core::domain::events::SchainEvent;
use schain_admin_core::domain::monitor::{MonitorKind, Program, Step};
use schain_admin_core::domain::record::{DkgStatus, RecordField};
use schain_admin_core::domain::repository::SchainRecordRepository;
use schain_admin_core::domain::runtime::{ContainerStatus, EC_STATE_ROOT_MISMATCH};
use schain_admin_core::domain::schain::SchainTier;
use schain_admin_core::ENGINE_VERSION;

async fn cycle(env: &TestEnv) -> CycleReport {
    match MonitorRunner::new(env.ctx.clone()).run_cycle(SCHAIN).await {
        Ok(CycleOutcome::Completed(report)) => *report,
        Ok(CycleOutcome::Finished) => panic!("workload unexpectedly finished"),
        Err(e) => panic!("cycle failed: {}", e),
    }
}

/// Record a live supervisor pid so that the process check passes.
async fn adopt_worker(env: &TestEnv) {
    env.process.adopt(4242);
    env.records.set(SCHAIN, RecordField::MonitorPid(4242)).await.unwrap();
}

#[tokio::test]
async fn test_regular_monitor_converges_from_nothing() {
    let env = TestEnv::new(1);

    let report = cycle(&env).await;
    assert_eq!(report.monitor, MonitorKind::Regular);
    assert_eq!(report.program, Program::Regular);
    let steps: Vec<Step> = report.executed.iter().map(|a| a.step).collect();
    assert_eq!(steps, Program::Regular.steps());

    let layout = &env.ctx.layout;
    assert!(layout.data_dir(SCHAIN).is_dir());
    assert!(layout.key_share_path(SCHAIN, 0).is_file());
    assert!(layout.config_path(SCHAIN).is_file());

    assert_eq!(
        env.runtime.volume_size(SCHAIN),
        Some(volume_size(SchainTier::Medium, env.ctx.settings.disk_size_bytes))
    );
    assert_eq!(env.runtime.state(&env.worker()).map(|s| s.status), Some(ContainerStatus::Running));
    assert_eq!(env.runtime.state(&env.relay()).map(|s| s.status), Some(ContainerStatus::Running));

    // 4 internal ports for each of the 3 other peers, plus 9 public ports
    assert_eq!(env.firewall.added(), 21);
    assert_eq!(env.firewall.removed(), 0);

    let requests = env.dkg.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].peers, vec![1, 2, 3, 4]);
    assert_eq!(requests[0].threshold, 3);

    let record = env.records.get_by_name(SCHAIN).await.unwrap().unwrap();
    assert!(!record.first_run);
    assert!(!record.new_schain);
    assert_eq!(record.dkg_status, DkgStatus::Done);
    assert_eq!(record.config_version, ENGINE_VERSION);
}

#[tokio::test]
async fn test_second_cycle_on_converged_workload_does_nothing() {
    let env = TestEnv::new(1);
    cycle(&env).await;
    adopt_worker(&env).await;

    let ops_before = env.runtime.ops();
    let added_before = env.firewall.added();
    let config_before = std::fs::read(env.ctx.layout.config_path(SCHAIN)).unwrap();

    let report = cycle(&env).await;
    assert!(report.checks.all_passed(), "{}", report.checks);
    assert!(report.executed.iter().all(|a| a.initial_status == Some(true)), "{}", report.summary());

    assert_eq!(env.runtime.ops(), ops_before);
    assert_eq!(env.firewall.added(), added_before);
    assert_eq!(env.firewall.removed(), 0);
    assert_eq!(env.dkg.calls(), 1);
    assert_eq!(std::fs::read(env.ctx.layout.config_path(SCHAIN)).unwrap(), config_before);
    assert!(!env
        .notifier
        .events()
        .iter()
        .any(|e| matches!(e, SchainEvent::ChecksFailed { .. })));
}

#[tokio::test]
async fn test_failed_worker_restarts_are_bounded() {
    let env = TestEnv::with_settings(1, |s| s.max_restarts = 2);
    cycle(&env).await;

    for expected in 1..=2 {
        env.runtime.set_state(&env.worker(), ContainerStatus::Exited, 1);
        cycle(&env).await;
        let record = env.records.get_by_name(SCHAIN).await.unwrap().unwrap();
        assert_eq!(record.restart_count, expected);
        assert_eq!(env.runtime.state(&env.worker()).map(|s| s.status), Some(ContainerStatus::Running));
    }

    env.runtime.set_state(&env.worker(), ContainerStatus::Exited, 1);
    cycle(&env).await;

    let record = env.records.get_by_name(SCHAIN).await.unwrap().unwrap();
    assert_eq!(record.restart_count, 2);
    assert_eq!(env.runtime.state(&env.worker()).map(|s| s.status), Some(ContainerStatus::Exited));
    assert!(env.notifier.events().contains(&SchainEvent::RestartLimitReached {
        schain: SCHAIN.to_string(),
        restart_count: 2,
        logs: format!("last 50 lines of {}", env.worker()),
    }));
}

#[tokio::test]
async fn test_running_worker_keeps_restart_count() {
    let env = TestEnv::new(1);
    cycle(&env).await;

    env.runtime.set_state(&env.worker(), ContainerStatus::Exited, 1);
    cycle(&env).await;
    cycle(&env).await;

    let record = env.records.get_by_name(SCHAIN).await.unwrap().unwrap();
    assert_eq!(record.restart_count, 1);
}

#[tokio::test]
async fn test_liveness_failures_restart_after_threshold() {
    let env = TestEnv::with_settings(1, |s| s.max_failed_rpc = 1);
    cycle(&env).await;
    env.rpc.set_healthy(false);

    cycle(&env).await;
    cycle(&env).await;
    let record = env.records.get_by_name(SCHAIN).await.unwrap().unwrap();
    assert_eq!(record.failed_rpc_count, 2);
    assert!(!env.runtime.ops().iter().any(|op| op.starts_with("restart")));

    cycle(&env).await;
    let record = env.records.get_by_name(SCHAIN).await.unwrap().unwrap();
    assert_eq!(record.failed_rpc_count, 0);
    assert_eq!(record.restart_count, 1);
    assert!(env.runtime.ops().contains(&format!("restart {}", env.worker())));

    env.rpc.set_healthy(true);
    let report = cycle(&env).await;
    assert!(report.checks.status(CheckName::Rpc));
}

#[tokio::test]
async fn test_state_root_mismatch_triggers_repair_from_snapshot() {
    let env = TestEnv::new(1);
    cycle(&env).await;
    env.runtime.set_state(&env.worker(), ContainerStatus::Exited, EC_STATE_ROOT_MISMATCH);

    let report = cycle(&env).await;
    assert_eq!(report.monitor, MonitorKind::Repair);
    assert!(!report.checks.status(CheckName::ExitCodeOk));

    let ops = env.runtime.ops();
    assert!(ops.contains(&format!("remove {}", env.worker())));
    assert!(ops.contains(&format!("remove_volume {}", SCHAIN)));
    assert_eq!(env.runtime.state(&env.worker()).map(|s| s.status), Some(ContainerStatus::Running));
    assert_eq!(env.runtime.state(&env.relay()).map(|s| s.status), Some(ContainerStatus::Running));

    let worker_spec = env
        .runtime
        .specs()
        .into_iter()
        .filter(|s| s.name == env.worker())
        .last()
        .unwrap();
    let position = worker_spec.cmd.iter().position(|a| a == "--download-snapshot").unwrap();
    assert_eq!(worker_spec.cmd[position + 1], "readfromconfig");

    assert!(env.notifier.events().contains(&SchainEvent::RepairTriggered {
        schain: SCHAIN.to_string(),
        repair_mode: false,
        exit_code_ok: false,
    }));

    let report = cycle(&env).await;
    assert_eq!(report.monitor, MonitorKind::Regular);
}

#[tokio::test]
async fn test_unreadable_worker_state_does_not_trigger_repair() {
    let env = TestEnv::new(1);
    cycle(&env).await;
    adopt_worker(&env).await;
    let ops_before = env.runtime.ops();

    // the checks read fails, the classifier read succeeds
    env.runtime.fail_state_reads(&env.worker(), 1);
    let report = cycle(&env).await;
    assert_eq!(report.monitor, MonitorKind::Regular);
    assert!(!report.checks.status(CheckName::ExitCodeOk));
    assert_eq!(env.runtime.ops(), ops_before);
    assert!(env.runtime.volume_size(SCHAIN).is_some());

    // both reads fail, the cycle is abandoned before any action
    env.runtime.fail_state_reads(&env.worker(), 2);
    let result = MonitorRunner::new(env.ctx.clone()).run_cycle(SCHAIN).await;
    assert!(matches!(result, Err(ActionError::Runtime(_))));
    assert_eq!(env.runtime.ops(), ops_before);
    assert!(!env
        .notifier
        .events()
        .iter()
        .any(|e| matches!(e, SchainEvent::RepairTriggered { .. })));
}

#[tokio::test]
async fn test_operator_repair_uses_snapshot_source_once() {
    let env = TestEnv::new(1);
    cycle(&env).await;
    env.records.set(SCHAIN, RecordField::RepairMode(true)).await.unwrap();
    env.records
        .set(SCHAIN, RecordField::SnapshotSource(Some("10.0.0.3".to_string())))
        .await
        .unwrap();

    let report = cycle(&env).await;
    assert_eq!(report.program, Program::Repair);

    let worker_spec = env.runtime.specs().into_iter().filter(|s| s.name == env.worker()).last().unwrap();
    assert!(worker_spec.cmd.contains(&"http://10.0.0.3:10003".to_string()));

    let record = env.records.get_by_name(SCHAIN).await.unwrap().unwrap();
    assert!(!record.repair_mode);
    assert_eq!(record.snapshot_source, None);
}

#[tokio::test]
async fn test_backup_run_starts_from_snapshot_without_dkg() {
    let env = TestEnv::with_settings(1, |s| s.backup_run = true);
    env.records.upsert(SCHAIN).await.unwrap();
    env.records.set(SCHAIN, RecordField::NewSchain(false)).await.unwrap();

    let report = cycle(&env).await;
    assert_eq!(report.monitor, MonitorKind::Backup);
    assert_eq!(env.dkg.calls(), 0);
    assert!(env.ctx.layout.config_path(SCHAIN).is_file());

    let worker_spec = env.runtime.specs().into_iter().find(|s| s.name == env.worker()).unwrap();
    assert!(worker_spec.cmd.contains(&"--download-snapshot".to_string()));

    // first_run is cleared, so backup mode happens once
    let report = cycle(&env).await;
    assert_ne!(report.monitor, MonitorKind::Backup);
}

#[tokio::test]
async fn test_worker_gets_tls_material_when_certificates_exist() {
    let certs = tempfile::tempdir().unwrap();
    let ssl_dir = certs.path().to_path_buf();
    let env = TestEnv::with_settings(1, |s| s.ssl_dir = Some(ssl_dir.clone()));

    // key without certificate: no TLS flags
    std::fs::write(ssl_dir.join("ssl_key"), "key").unwrap();
    cycle(&env).await;
    let spec = env.runtime.specs().into_iter().find(|s| s.name == env.worker()).unwrap();
    assert!(!spec.cmd.contains(&"--ssl-key".to_string()));
    assert!(spec.binds.iter().all(|b| b.target != "/ssl"));

    std::fs::write(ssl_dir.join("ssl_cert"), "cert").unwrap();
    env.records.set(SCHAIN, RecordField::NeedsReload(true)).await.unwrap();
    cycle(&env).await;
    let spec = env.runtime.specs().into_iter().filter(|s| s.name == env.worker()).last().unwrap();
    let key = spec.cmd.iter().position(|a| a == "--ssl-key").unwrap();
    assert_eq!(spec.cmd[key + 1], "/ssl/ssl_key");
    let cert = spec.cmd.iter().position(|a| a == "--ssl-cert").unwrap();
    assert_eq!(spec.cmd[cert + 1], "/ssl/ssl_cert");

    let bind = spec.binds.iter().find(|b| b.target == "/ssl").unwrap();
    assert_eq!(bind.source, ssl_dir.to_string_lossy());
    assert!(bind.read_only);
}

#[tokio::test]
async fn test_reload_recreates_worker_container() {
    let env = TestEnv::new(1);
    cycle(&env).await;
    env.records.set(SCHAIN, RecordField::NeedsReload(true)).await.unwrap();

    cycle(&env).await;

    let ops = env.runtime.ops();
    let removed = ops.iter().position(|op| *op == format!("remove {}", env.worker())).unwrap();
    let started = ops.iter().rposition(|op| *op == format!("run {}", env.worker())).unwrap();
    assert!(removed < started);
    let record = env.records.get_by_name(SCHAIN).await.unwrap().unwrap();
    assert!(!record.needs_reload);
}

#[tokio::test]
async fn test_dkg_failure_removes_fresh_workload_directory() {
    let env = TestEnv::new(1);
    env.dkg.fail_with("broadcast timed out");

    let result = MonitorRunner::new(env.ctx.clone()).run_cycle(SCHAIN).await;
    assert!(matches!(result, Err(ActionError::Dkg { .. })));
    assert!(!env.ctx.layout.schain_dir(SCHAIN).exists());

    let record = env.records.get_by_name(SCHAIN).await.unwrap().unwrap();
    assert_eq!(record.dkg_status, DkgStatus::Failed);
    assert!(env.notifier.events().contains(&SchainEvent::DkgFailed {
        schain: SCHAIN.to_string(),
        reason: "broadcast timed out".to_string(),
    }));
    assert!(env.runtime.state(&env.worker()).is_none());
}

#[tokio::test]
async fn test_inactive_or_foreign_workload_finishes() {
    let env = TestEnv::new(9);
    let outcome = MonitorRunner::new(env.ctx.clone()).run_cycle(SCHAIN).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Finished));

    let env = TestEnv::new(1);
    env.chain.state.lock().schains.get_mut(SCHAIN).unwrap().active = false;
    let outcome = MonitorRunner::new(env.ctx.clone()).run_cycle(SCHAIN).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Finished));
    assert!(env.runtime.ops().is_empty());
}

#[tokio::test]
async fn test_peer_with_unaddressable_port_window_is_rejected() {
    let env = TestEnv::new(1);
    env.chain.state.lock().peers[2].base_port = 65530;

    let result = MonitorRunner::new(env.ctx.clone()).run_cycle(SCHAIN).await;
    assert!(matches!(result, Err(ActionError::Chain(_))));
    assert!(env.runtime.ops().is_empty());
    assert_eq!(env.firewall.added(), 0);
    assert!(env.records.get_by_name(SCHAIN).await.unwrap().is_none());
}

#[tokio::test]
async fn test_inspect_has_no_side_effects() {
    let env = TestEnv::new(1);
    let snapshot = MonitorRunner::new(env.ctx.clone()).inspect(SCHAIN).await.unwrap();

    assert!(!snapshot.status(CheckName::ConfigDir));
    assert!(!snapshot.status(CheckName::Config));
    assert!(snapshot.status(CheckName::ExitCodeOk));
    assert!(snapshot.status(CheckName::Rpc));
    assert!(env.runtime.ops().is_empty());
    assert!(env.records.get_by_name(SCHAIN).await.unwrap().is_none());
    assert!(!env.ctx.layout.schain_dir(SCHAIN).exists());
}
