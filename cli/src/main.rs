// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # sChain Admin
//!
//! The `schain-admin` binary runs the reconciliation engine of one node.
//!
//! ## Process model
//!
//! - `schain-admin run` starts the process supervisor (long-running daemon)
//! - the supervisor re-executes this binary as `schain-admin monitor --schain NAME`
//!   once per workload; each worker runs the reconciliation loop
//!
//! ## Commands
//!
//! - `schain-admin run` - Supervisor daemon
//! - `schain-admin monitor --schain NAME` - Per-workload worker
//! - `schain-admin checks --schain NAME` - Print the current checks
//! - `schain-admin repair|reload --schain NAME` - Operator flags
//! - `schain-admin config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use schain_admin::commands::{self, ConfigCommand};

/// sChain Admin - node-local reconciliation engine for sChain workloads
#[derive(Parser)]
#[command(name = "schain-admin")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SCHAIN_ADMIN_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SCHAIN_ADMIN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the process supervisor
    #[command(name = "run")]
    Run,

    /// Run the reconciliation loop for one workload
    #[command(name = "monitor")]
    Monitor {
        #[arg(long, value_name = "NAME")]
        schain: String,
    },

    /// Compute and print the checks of one workload
    #[command(name = "checks")]
    Checks {
        #[arg(long, value_name = "NAME")]
        schain: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Put a workload into repair mode
    #[command(name = "repair")]
    Repair {
        #[arg(long, value_name = "NAME")]
        schain: String,

        /// Peer IP to download the snapshot from
        #[arg(long, value_name = "IP")]
        snapshot_from: Option<String>,
    },

    /// Recreate the worker container of a workload on its next cycle
    #[command(name = "reload")]
    Reload {
        #[arg(long, value_name = "NAME")]
        schain: String,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Run) => commands::run::execute(cli.config).await,
        Some(Commands::Monitor { schain }) => commands::monitor::execute(cli.config, &schain).await,
        Some(Commands::Checks { schain, json }) => {
            commands::checks::execute(cli.config, &schain, json).await
        }
        Some(Commands::Repair { schain, snapshot_from }) => {
            commands::operator::repair(cli.config, &schain, snapshot_from).await
        }
        Some(Commands::Reload { schain }) => commands::operator::reload(cli.config, &schain).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
