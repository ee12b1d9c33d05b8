// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Worker Processes
//!
//! Contract between the process supervisor and the operating system, plus the
//! heartbeat record the worker writes after every cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Heartbeat stuck threshold is the chain DKG timeout times this factor.
pub const STUCK_TIMEOUT_COEFFICIENT: f64 = 2.2;

/// Default wait between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub pid: u32,
    /// Unix seconds of the last completed cycle.
    pub ts: i64,
}

impl Heartbeat {
    pub fn now(pid: u32) -> Self {
        Self { pid, ts: Utc::now().timestamp() }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, stuck_timeout: Duration) -> bool {
        let age = now.timestamp() - self.ts;
        age > stuck_timeout.as_secs() as i64
    }
}

pub fn stuck_timeout(dkg_timeout_secs: u64) -> Duration {
    Duration::from_secs((dkg_timeout_secs as f64 * STUCK_TIMEOUT_COEFFICIENT) as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Kill,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn worker for {schain}: {reason}")]
    Spawn { schain: String, reason: String },

    #[error("Failed to signal process {pid}: {reason}")]
    Signal { pid: u32, reason: String },
}

/// OS process control used by the supervisor.
pub trait ProcessControl: Send + Sync {
    /// Start a worker process for `schain` and return its pid.
    fn spawn_worker(&self, schain: &str) -> Result<u32, ProcessError>;

    /// `false` for pid 0, unknown pids and reaped children.
    fn is_alive(&self, pid: u32) -> bool;

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError>;
}
