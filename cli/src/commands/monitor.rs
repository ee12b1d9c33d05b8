// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `schain-admin monitor --schain NAME`: one workload's worker process.
//!
//! Spawned by the supervisor; not meant to be started by hand.

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use schain_admin_core::application::reconcile::{LoopExit, ReconcileLoop};

use crate::bootstrap::{build_context, load_manifest};
use crate::daemon::shutdown_token;

pub async fn execute(config_path: Option<PathBuf>, schain: &str) -> Result<()> {
    let manifest = load_manifest(config_path.clone())?;
    let ctx = build_context(&manifest, config_path).await?;

    let exit = ReconcileLoop::new(ctx, schain).run(shutdown_token()).await;
    match exit {
        LoopExit::Finished => info!("[{}] worker exiting: node left the workload", schain),
        LoopExit::Cancelled => info!("[{}] worker exiting on signal", schain),
    }
    Ok(())
}
