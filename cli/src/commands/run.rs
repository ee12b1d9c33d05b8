// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `schain-admin run`: the process supervisor daemon.

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use schain_admin_core::application::supervisor::ProcessSupervisor;

use crate::bootstrap::{build_context, install_metrics, load_manifest};
use crate::daemon::{get_pid_file_path, shutdown_token, PidFileGuard};

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let manifest = load_manifest(config_path.clone())?;
    let _pid_file = PidFileGuard::create(get_pid_file_path())?;

    info!(
        "sChain admin supervisor starting (PID: {}, node: {} #{})",
        std::process::id(),
        manifest.spec.node.name,
        manifest.spec.node.id
    );

    install_metrics(&manifest)?;
    let ctx = build_context(&manifest, config_path).await?;

    let supervisor = ProcessSupervisor::new(ctx);
    supervisor.run(shutdown_token()).await;

    info!("sChain admin supervisor stopped");
    Ok(())
}
