// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const CONTAINER_NAME_PREFIX: &str = "skale";

/// Worker exit code for a state root mismatch with the rest of the group.
pub const EC_STATE_ROOT_MISMATCH: i64 = 200;

/// Exit codes that require the Repair program.
pub const FATAL_EXIT_CODES: &[i64] = &[EC_STATE_ROOT_MISMATCH];

/// Containers the engine runs per workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// The sChain worker (`skaled`).
    Schain,
    /// The bridge relay sidecar.
    Ima,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Schain => "schain",
            ContainerKind::Ima => "ima",
        }
    }

    /// `skale_schain_<name>` / `skale_ima_<name>`
    pub fn container_name(&self, schain: &str) -> String {
        format!("{}_{}_{}", CONTAINER_NAME_PREFIX, self.as_str(), schain)
    }
}

/// Data volume name for a workload.
pub fn volume_name(schain: &str) -> String {
    schain.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub status: ContainerStatus,
    pub exit_code: i64,
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Running
    }

    /// Created but never started, or exited with a non-zero code.
    pub fn is_failed(&self) -> bool {
        match self.status {
            ContainerStatus::Created => true,
            ContainerStatus::Exited => self.exit_code != 0,
            _ => false,
        }
    }

    pub fn exited_cleanly(&self) -> bool {
        self.status == ContainerStatus::Exited && self.exit_code == 0
    }

    pub fn exit_code_ok(&self) -> bool {
        !FATAL_EXIT_CODES.contains(&self.exit_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBind {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

/// Everything required to create and start a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub cmd: Vec<String>,
    pub env: HashMap<String, String>,
    pub binds: Vec<VolumeBind>,
    pub network_mode: Option<String>,
    pub labels: HashMap<String, String>,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// `None` when the container does not exist.
    async fn container_state(&self, name: &str) -> Result<Option<ContainerState>, RuntimeError>;

    async fn run_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError>;

    async fn restart_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Stop and remove. Removing an absent container is not an error.
    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn volume_exists(&self, name: &str) -> Result<bool, RuntimeError>;

    async fn create_volume(&self, name: &str, size_bytes: u64) -> Result<(), RuntimeError>;

    /// Removing an absent volume is not an error.
    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError>;

    async fn container_logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError>;
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Container operation failed: {0}")]
    ContainerFailed(String),

    #[error("Volume operation failed: {0}")]
    VolumeFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
