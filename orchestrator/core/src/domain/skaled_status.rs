// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Worker status sidecar (`skaled.status`), written by the worker itself and
//! only ever read here. Unknown or missing keys read as `false`.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkaledStatus {
    #[serde(default)]
    pub subsystem_running: SubsystemRunning,
    #[serde(default)]
    pub exit_state: ExitState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubsystemRunning {
    #[serde(rename = "SnapshotDownloader", default)]
    pub snapshot_downloader: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExitState {
    #[serde(rename = "ClearDataDir", default)]
    pub clear_data_dir: bool,
    #[serde(rename = "StartAgain", default)]
    pub start_again: bool,
    #[serde(rename = "StartFromSnapshot", default)]
    pub start_from_snapshot: bool,
    #[serde(rename = "ExitTimeReached", default)]
    pub exit_time_reached: bool,
}

impl SkaledStatus {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn downloading_snapshot(&self) -> bool {
        self.subsystem_running.snapshot_downloader
    }

    pub fn exit_time_reached(&self) -> bool {
        self.exit_state.exit_time_reached
    }

    /// The worker asked to be re-provisioned from a snapshot.
    pub fn awaits_repair(&self) -> bool {
        self.exit_state.clear_data_dir && self.exit_state.start_from_snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_status() {
        let status = SkaledStatus::from_json(
            r#"{
                "subsystemRunning": {"SnapshotDownloader": true, "Rotation": false},
                "exitState": {
                    "ClearDataDir": true,
                    "StartAgain": false,
                    "StartFromSnapshot": true,
                    "ExitTimeReached": false
                }
            }"#,
        )
        .unwrap();
        assert!(status.downloading_snapshot());
        assert!(status.awaits_repair());
        assert!(!status.exit_time_reached());
    }

    #[test]
    fn test_missing_sections_read_false() {
        let status = SkaledStatus::from_json(r#"{"exitState": {"ExitTimeReached": true}}"#).unwrap();
        assert!(status.exit_time_reached());
        assert!(!status.downloading_snapshot());
        assert!(!status.awaits_repair());
    }
}
