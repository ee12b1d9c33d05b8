// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use schain_admin_core::domain::node_config::NodeConfigManifest;
use schain_admin_core::infrastructure::node_config_store::write_manifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a configuration file with every default filled in
    Generate {
        /// Output path (default: ./schain-admin.yaml)
        #[arg(short, long, default_value = "./schain-admin.yaml")]
        output: PathBuf,

        /// Node id on chain
        #[arg(long, default_value_t = 0)]
        node_id: u64,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, node_id } => generate(output, node_id),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = NodeConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SCHAIN_ADMIN_CONFIG_PATH: {}",
            std::env::var("SCHAIN_ADMIN_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./schain-admin.yaml");
        println!("  4. ~/.schain-admin/config.yaml");
        println!("  5. /etc/schain-admin/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node Identity:".bold());
    println!("  ID: {}", spec.node.id);
    if !spec.node.name.is_empty() {
        println!("  Name: {}", spec.node.name);
    }
    println!();

    println!("{}", "Paths:".bold());
    println!("  sChains: {}", spec.paths.schains_dir.display());
    println!("  Node data: {}", spec.paths.node_data_dir.display());
    if let Some(base) = &spec.paths.base_config {
        println!("  Base config: {}", base.display());
    }
    println!();

    println!("{}", "Collaborators:".bold());
    println!("  Chain gateway: {} ({}s)", spec.chain.endpoint, spec.chain.timeout_secs);
    println!("  DKG: {} ({}s)", spec.dkg.endpoint, spec.dkg.timeout_secs);
    println!(
        "  Records: {}",
        if spec.database.is_some() { "postgres" } else { "in-memory" }
    );
    println!();

    println!("{}", "Monitor:".bold());
    let monitor = &spec.monitor;
    println!("  Max restarts: {}", monitor.max_restarts);
    println!("  Max failed RPC: {}", monitor.max_failed_rpc);
    println!(
        "  Interval: {}-{}s",
        monitor.min_interval_secs, monitor.max_interval_secs
    );
    println!("  Backup run: {}", monitor.backup_run);
    println!();

    println!("{}", "Firewall:".bold());
    println!("  Binary: {}", spec.firewall.iptables_path);
    for range in &spec.firewall.sync_ranges {
        println!("  Sync range: {}-{}", range.start, range.end);
    }
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = NodeConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf, node_id: u64) -> Result<()> {
    let mut config = NodeConfigManifest::default();
    config.spec.node.id = node_id;

    write_manifest(&config, &output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
