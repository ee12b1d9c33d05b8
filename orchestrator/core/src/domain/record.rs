// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # sChain Record
//!
//! Local durable monitoring state for one workload. Each field is updated
//! independently through [`RecordField`] so that every setter maps onto a
//! single-column update in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_VERSION: &str = "0.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DkgStatus {
    NotStarted = 1,
    InProgress = 2,
    Done = 3,
    Failed = 4,
    KeyGenerationError = 5,
}

impl DkgStatus {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(DkgStatus::NotStarted),
            2 => Some(DkgStatus::InProgress),
            3 => Some(DkgStatus::Done),
            4 => Some(DkgStatus::Failed),
            5 => Some(DkgStatus::KeyGenerationError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchainRecord {
    pub name: String,
    pub added_at: DateTime<Utc>,
    pub dkg_status: DkgStatus,
    pub is_deleted: bool,
    pub first_run: bool,
    pub new_schain: bool,
    pub repair_mode: bool,
    pub needs_reload: bool,
    pub backup_run: bool,
    pub monitor_pid: u32,
    pub monitor_last_seen: DateTime<Utc>,
    pub restart_count: u32,
    pub failed_rpc_count: u32,
    pub config_version: String,
    pub snapshot_source: Option<String>,
}

impl SchainRecord {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            added_at: now,
            dkg_status: DkgStatus::NotStarted,
            is_deleted: false,
            first_run: true,
            new_schain: true,
            repair_mode: false,
            needs_reload: false,
            backup_run: false,
            monitor_pid: 0,
            monitor_last_seen: now,
            restart_count: 0,
            failed_rpc_count: 0,
            config_version: DEFAULT_CONFIG_VERSION.to_string(),
            snapshot_source: None,
        }
    }

    pub fn apply(&mut self, field: &RecordField) {
        match field {
            RecordField::DkgStatus(v) => self.dkg_status = *v,
            RecordField::IsDeleted(v) => self.is_deleted = *v,
            RecordField::FirstRun(v) => self.first_run = *v,
            RecordField::NewSchain(v) => self.new_schain = *v,
            RecordField::RepairMode(v) => self.repair_mode = *v,
            RecordField::NeedsReload(v) => self.needs_reload = *v,
            RecordField::BackupRun(v) => self.backup_run = *v,
            RecordField::MonitorPid(v) => self.monitor_pid = *v,
            RecordField::MonitorLastSeen(v) => self.monitor_last_seen = *v,
            RecordField::RestartCount(v) => self.restart_count = *v,
            RecordField::FailedRpcCount(v) => self.failed_rpc_count = *v,
            RecordField::ConfigVersion(v) => self.config_version = v.clone(),
            RecordField::SnapshotSource(v) => self.snapshot_source = v.clone(),
        }
    }
}

/// A single-field update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordField {
    DkgStatus(DkgStatus),
    IsDeleted(bool),
    FirstRun(bool),
    NewSchain(bool),
    RepairMode(bool),
    NeedsReload(bool),
    BackupRun(bool),
    MonitorPid(u32),
    MonitorLastSeen(DateTime<Utc>),
    RestartCount(u32),
    FailedRpcCount(u32),
    ConfigVersion(String),
    SnapshotSource(Option<String>),
}

impl RecordField {
    /// Column backing this field in the `schains` table.
    pub fn column(&self) -> &'static str {
        match self {
            RecordField::DkgStatus(_) => "dkg_status",
            RecordField::IsDeleted(_) => "is_deleted",
            RecordField::FirstRun(_) => "first_run",
            RecordField::NewSchain(_) => "new_schain",
            RecordField::RepairMode(_) => "repair_mode",
            RecordField::NeedsReload(_) => "needs_reload",
            RecordField::BackupRun(_) => "backup_run",
            RecordField::MonitorPid(_) => "monitor_pid",
            RecordField::MonitorLastSeen(_) => "monitor_last_seen",
            RecordField::RestartCount(_) => "restart_count",
            RecordField::FailedRpcCount(_) => "failed_rpc_count",
            RecordField::ConfigVersion(_) => "config_version",
            RecordField::SnapshotSource(_) => "snapshot_source",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let record = SchainRecord::new("w1");
        assert!(record.first_run);
        assert!(record.new_schain);
        assert!(!record.repair_mode);
        assert_eq!(record.monitor_pid, 0);
        assert_eq!(record.dkg_status, DkgStatus::NotStarted);
        assert_eq!(record.config_version, DEFAULT_CONFIG_VERSION);
    }

    #[test]
    fn test_apply_touches_one_field() {
        let mut record = SchainRecord::new("w1");
        let before = record.clone();
        record.apply(&RecordField::RestartCount(3));
        assert_eq!(record.restart_count, 3);
        assert_eq!(record.failed_rpc_count, before.failed_rpc_count);
        assert_eq!(record.first_run, before.first_run);
    }

    #[test]
    fn test_dkg_status_codes() {
        for status in [
            DkgStatus::NotStarted,
            DkgStatus::InProgress,
            DkgStatus::Done,
            DkgStatus::Failed,
            DkgStatus::KeyGenerationError,
        ] {
            assert_eq!(DkgStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(DkgStatus::from_code(0), None);
    }
}
