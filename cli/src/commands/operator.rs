// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Operator flags: `repair` and `reload`.
//!
//! Both only write the record; the workload's worker acts on it next cycle.

use anyhow::{Context, Result};
use colored::Colorize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use schain_admin_core::domain::record::RecordField;
use schain_admin_core::domain::repository::SchainRecordRepository;

use crate::bootstrap::{load_manifest, record_repository};

pub async fn repair(
    config_path: Option<PathBuf>,
    schain: &str,
    snapshot_from: Option<String>,
) -> Result<()> {
    if let Some(ip) = &snapshot_from {
        ip.parse::<Ipv4Addr>()
            .with_context(|| format!("Invalid snapshot source address: {}", ip))?;
    }

    let manifest = load_manifest(config_path)?;
    let records = record_repository(&manifest).await?;
    set_repair(records, schain, snapshot_from.clone()).await?;

    match snapshot_from {
        Some(ip) => println!(
            "{}",
            format!("✓ Repair scheduled for {} (snapshot from {})", schain, ip).green()
        ),
        None => println!("{}", format!("✓ Repair scheduled for {}", schain).green()),
    }
    Ok(())
}

pub async fn reload(config_path: Option<PathBuf>, schain: &str) -> Result<()> {
    let manifest = load_manifest(config_path)?;
    let records = record_repository(&manifest).await?;
    set_reload(records, schain).await?;

    println!("{}", format!("✓ Reload scheduled for {}", schain).green());
    Ok(())
}

pub async fn set_repair(
    records: Arc<dyn SchainRecordRepository>,
    schain: &str,
    snapshot_from: Option<String>,
) -> Result<()> {
    records.upsert(schain).await?;
    records.set(schain, RecordField::RepairMode(true)).await?;
    records.set(schain, RecordField::SnapshotSource(snapshot_from)).await?;
    Ok(())
}

pub async fn set_reload(records: Arc<dyn SchainRecordRepository>, schain: &str) -> Result<()> {
    records.upsert(schain).await?;
    records.set(schain, RecordField::NeedsReload(true)).await?;
    Ok(())
}
