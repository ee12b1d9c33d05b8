// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `schain-admin checks --schain NAME`: read-only view of one workload.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use schain_admin_core::application::monitor::MonitorRunner;
use schain_admin_core::domain::checks::ChecksSnapshot;

use crate::bootstrap::{build_context, load_manifest};

pub async fn execute(config_path: Option<PathBuf>, schain: &str, json: bool) -> Result<()> {
    let manifest = load_manifest(config_path.clone())?;
    let ctx = build_context(&manifest, config_path).await?;

    let snapshot = MonitorRunner::new(ctx)
        .inspect(schain)
        .await
        .with_context(|| format!("Failed to compute checks for {}", schain))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(schain, &snapshot);
    }
    Ok(())
}

fn print_snapshot(schain: &str, snapshot: &ChecksSnapshot) {
    println!("{}", format!("Checks for {}:", schain).bold());
    for (name, result) in snapshot.iter() {
        let status = if result.status { "ok".green() } else { "failed".red() };
        match &result.message {
            Some(message) => println!("  {:<18} {} ({})", name.as_str(), status, message.dimmed()),
            None => println!("  {:<18} {}", name.as_str(), status),
        }
    }
}
