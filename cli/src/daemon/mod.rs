// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon plumbing
//!
//! Handles:
//! - PID file management for the supervisor
//! - Shutdown signals (Ctrl+C, SIGTERM) mapped onto a cancellation token

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const PID_FILE: &str = "/var/run/schain-admin/schain-admin.pid";
const PID_FILE_FALLBACK: &str = "/tmp/schain-admin.pid";

pub fn get_pid_file_path() -> PathBuf {
    let uid = unsafe { libc::geteuid() };
    if uid == 0 {
        PathBuf::from(PID_FILE)
    } else {
        PathBuf::from(PID_FILE_FALLBACK)
    }
}

pub fn process_exists(pid: u32) -> bool {
    pid != 0 && unsafe { libc::kill(pid as i32, 0) == 0 }
}

/// Pid recorded in `path` if that process is still alive.
pub fn running_pid(path: &Path) -> Option<u32> {
    let pid = std::fs::read_to_string(path).ok()?.trim().parse::<u32>().ok()?;
    process_exists(pid).then_some(pid)
}

/// Write the PID file, refusing to start over a live daemon.
pub fn write_pid_file(path: &Path, pid: u32) -> Result<()> {
    if let Some(existing) = running_pid(path) {
        anyhow::bail!("Supervisor already running with pid {} ({:?})", existing, path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create PID file directory: {:?}", parent))?;
    }
    std::fs::write(path, pid.to_string())
        .with_context(|| format!("Failed to write PID file: {:?}", path))?;
    info!("Wrote PID file: {:?}", path);
    Ok(())
}

pub fn remove_pid_file(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove PID file: {:?}", path))?;
        info!("Removed PID file: {:?}", path);
    }
    Ok(())
}

/// Removes the PID file when dropped.
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    pub fn create(path: PathBuf) -> Result<Self> {
        write_pid_file(&path, std::process::id())?;
        Ok(Self { path })
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Err(e) = remove_pid_file(&self.path) {
            warn!("{}", e);
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Token cancelled on the first shutdown signal.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });
    token
}
