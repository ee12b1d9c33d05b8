// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Checks
//!
//! Named boolean-with-reason results describing whether one aspect of a
//! workload already matches its desired state. A [`ChecksSnapshot`] is built
//! fresh at the start of every cycle and never cached across cycles.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    ConfigDir,
    Dkg,
    Config,
    Volume,
    FirewallRules,
    SkaledContainer,
    ExitCodeOk,
    Rpc,
    ImaContainer,
    Process,
}

impl CheckName {
    pub const ALL: [CheckName; 10] = [
        CheckName::ConfigDir,
        CheckName::Dkg,
        CheckName::Config,
        CheckName::Volume,
        CheckName::FirewallRules,
        CheckName::SkaledContainer,
        CheckName::ExitCodeOk,
        CheckName::Rpc,
        CheckName::ImaContainer,
        CheckName::Process,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::ConfigDir => "config_dir",
            CheckName::Dkg => "dkg",
            CheckName::Config => "config",
            CheckName::Volume => "volume",
            CheckName::FirewallRules => "firewall_rules",
            CheckName::SkaledContainer => "skaled_container",
            CheckName::ExitCodeOk => "exit_code_ok",
            CheckName::Rpc => "rpc",
            CheckName::ImaContainer => "ima_container",
            CheckName::Process => "process",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    pub fn pass() -> Self {
        Self { status: true, message: None }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { status: false, message: Some(message.into()) }
    }

    pub fn from_bool(status: bool) -> Self {
        Self { status, message: None }
    }

    /// A probe error degrades to `status = false` with the error as reason.
    pub fn from_probe<E: fmt::Display>(probe: Result<bool, E>) -> Self {
        match probe {
            Ok(status) => Self::from_bool(status),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChecksSnapshot {
    results: BTreeMap<CheckName, CheckResult>,
}

impl ChecksSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: CheckName, result: CheckResult) {
        self.results.insert(name, result);
    }

    pub fn get(&self, name: CheckName) -> Option<&CheckResult> {
        self.results.get(&name)
    }

    /// Missing aspects count as failing.
    pub fn status(&self, name: CheckName) -> bool {
        self.results.get(&name).map(|r| r.status).unwrap_or(false)
    }

    pub fn all_passed(&self) -> bool {
        CheckName::ALL.iter().all(|name| self.status(*name))
    }

    pub fn failed(&self) -> Vec<CheckName> {
        CheckName::ALL
            .iter()
            .copied()
            .filter(|name| !self.status(*name))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CheckName, &CheckResult)> {
        self.results.iter()
    }
}

impl fmt::Display for ChecksSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .results
            .iter()
            .map(|(name, result)| format!("{}={}", name, result.status))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_aspect_is_failing() {
        let mut snapshot = ChecksSnapshot::new();
        snapshot.insert(CheckName::ConfigDir, CheckResult::pass());
        assert!(snapshot.status(CheckName::ConfigDir));
        assert!(!snapshot.status(CheckName::Volume));
        assert!(!snapshot.all_passed());
        assert!(snapshot.failed().contains(&CheckName::Volume));
        assert!(!snapshot.failed().contains(&CheckName::ConfigDir));
    }

    #[test]
    fn test_probe_error_degrades_to_false() {
        let result = CheckResult::from_probe::<String>(Err("docker unreachable".to_string()));
        assert!(!result.status);
        assert_eq!(result.message.as_deref(), Some("docker unreachable"));
    }

    #[test]
    fn test_serializes_as_map() {
        let mut snapshot = ChecksSnapshot::new();
        snapshot.insert(CheckName::Rpc, CheckResult::fail("timeout"));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["rpc"]["status"], false);
        assert_eq!(json["rpc"]["message"], "timeout");
    }
}
