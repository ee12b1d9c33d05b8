// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! On-disk layout of a workload directory.
//!
//! ```text
//! <schains_dir>/<name>/
//!     schain_<name>.json         generated config
//!     secret_key_<rotation>.json DKG key share
//!     process.json               heartbeat
//!     rotation.txt               exit schedule
//!     data_dir/skaled.status     worker status sidecar
//! ```

use std::path::{Path, PathBuf};

pub const HEARTBEAT_FILENAME: &str = "process.json";
pub const EXIT_SCHEDULE_FILENAME: &str = "rotation.txt";
pub const SKALED_STATUS_FILENAME: &str = "skaled.status";
pub const DATA_DIR_NAME: &str = "data_dir";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchainLayout {
    schains_dir: PathBuf,
}

impl SchainLayout {
    pub fn new(schains_dir: impl Into<PathBuf>) -> Self {
        Self { schains_dir: schains_dir.into() }
    }

    pub fn schains_dir(&self) -> &Path {
        &self.schains_dir
    }

    pub fn schain_dir(&self, name: &str) -> PathBuf {
        self.schains_dir.join(name)
    }

    pub fn data_dir(&self, name: &str) -> PathBuf {
        self.schain_dir(name).join(DATA_DIR_NAME)
    }

    pub fn config_path(&self, name: &str) -> PathBuf {
        self.schain_dir(name).join(format!("schain_{}.json", name))
    }

    pub fn key_share_path(&self, name: &str, rotation_id: u64) -> PathBuf {
        self.schain_dir(name).join(format!("secret_key_{}.json", rotation_id))
    }

    pub fn heartbeat_path(&self, name: &str) -> PathBuf {
        self.schain_dir(name).join(HEARTBEAT_FILENAME)
    }

    pub fn exit_schedule_path(&self, name: &str) -> PathBuf {
        self.schain_dir(name).join(EXIT_SCHEDULE_FILENAME)
    }

    pub fn skaled_status_path(&self, name: &str) -> PathBuf {
        self.data_dir(name).join(SKALED_STATUS_FILENAME)
    }
}

/// Hidden sibling used as the write target before an atomic rename.
pub fn tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", file_name))
}
