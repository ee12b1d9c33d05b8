// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Small JSON state files shared between the supervisor, the worker process
//! and the worker container. All writes go to a hidden temp file first and
//! are renamed into place.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::domain::layout::tmp_path;
use crate::domain::process::Heartbeat;
use crate::domain::skaled_status::SkaledStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSchedule {
    pub timestamp: i64,
}

/// Stored DKG result for one rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShare {
    pub key_share: String,
    pub public_key: String,
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    let content = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}

/// `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    match std::fs::read(path) {
        Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn write_heartbeat(path: &Path, heartbeat: &Heartbeat) -> io::Result<()> {
    write_json_atomic(path, heartbeat)
}

/// A broken heartbeat reads as absent.
pub fn read_heartbeat(path: &Path) -> Option<Heartbeat> {
    match read_json(path) {
        Ok(heartbeat) => heartbeat,
        Err(e) => {
            tracing::warn!("Failed to read heartbeat {:?}: {}", path, e);
            None
        }
    }
}

pub fn write_exit_schedule(path: &Path, finish_ts: i64) -> io::Result<()> {
    write_json_atomic(path, &ExitSchedule { timestamp: finish_ts })
}

pub fn read_exit_schedule(path: &Path) -> io::Result<Option<ExitSchedule>> {
    read_json(path)
}

/// The sidecar is owned by the worker; a missing or broken file reads as
/// all flags false.
pub fn read_skaled_status(path: &Path) -> SkaledStatus {
    match std::fs::read_to_string(path) {
        Ok(content) => SkaledStatus::from_json(&content).unwrap_or_else(|e| {
            tracing::warn!("Broken status file {:?}: {}", path, e);
            SkaledStatus::default()
        }),
        Err(_) => SkaledStatus::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w1").join("rotation.txt");
        write_exit_schedule(&path, 1700000000).unwrap();

        assert_eq!(
            read_exit_schedule(&path).unwrap(),
            Some(ExitSchedule { timestamp: 1700000000 })
        );
        assert!(!tmp_path(&path).exists());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "timestamp": 1700000000 }));
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_heartbeat(&dir.path().join("process.json")).is_none());
        assert_eq!(read_skaled_status(&dir.path().join("skaled.status")), SkaledStatus::default());
        assert!(!remove_if_exists(&dir.path().join("rotation.txt")).unwrap());
    }

    #[test]
    fn test_broken_heartbeat_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("process.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(read_heartbeat(&path).is_none());

        write_heartbeat(&path, &Heartbeat { pid: 12, ts: 100 }).unwrap();
        assert_eq!(read_heartbeat(&path), Some(Heartbeat { pid: 12, ts: 100 }));
    }
}
