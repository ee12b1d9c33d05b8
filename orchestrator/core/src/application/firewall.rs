// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Firewall Rule Controller
//!
//! Computes the expected ACL set of one workload and converges the host table
//! toward it with the minimal set of mutations.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** expected / actual / sync / is_synced
//!
//! The host table is shared by every worker process on the node. The
//! controller never caches it: `actual()` re-reads on each call, and each
//! single mutation is serialized by the [`HostFirewall`] implementation. A
//! concurrent reader may see a partially applied diff; the next cycle's
//! `is_synced()` picks that up.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

use crate::domain::firewall::{
    FirewallError, FirewallRule, HostFirewall, IpRange, INTERNAL_PORTS, PUBLIC_PORTS,
    SYNC_AGENT_PORT,
};
use crate::domain::schain_config::SchainConfig;

/// Inputs of the expected rule set, extracted from a workload config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallScope {
    pub base_port: u16,
    pub own_ip: Option<Ipv4Addr>,
    pub node_ips: Vec<Ipv4Addr>,
    pub sync_ranges: Vec<IpRange>,
}

impl FirewallScope {
    pub fn from_config(config: &SchainConfig, sync_ranges: &[IpRange]) -> Self {
        Self {
            base_port: config.base_port(),
            own_ip: Some(config.own_ip()),
            node_ips: config.node_ips(),
            sync_ranges: sync_ranges.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDiff {
    pub to_add: BTreeSet<FirewallRule>,
    pub to_remove: BTreeSet<FirewallRule>,
}

impl RuleDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

pub fn diff_rules(expected: &BTreeSet<FirewallRule>, actual: &BTreeSet<FirewallRule>) -> RuleDiff {
    RuleDiff {
        to_add: expected.difference(actual).copied().collect(),
        to_remove: actual.difference(expected).copied().collect(),
    }
}

pub fn expected_rules(scope: &FirewallScope) -> BTreeSet<FirewallRule> {
    let mut rules = BTreeSet::new();

    for port in INTERNAL_PORTS {
        for ip in &scope.node_ips {
            if Some(*ip) != scope.own_ip {
                rules.insert(FirewallRule::from_ip(port.port(scope.base_port), *ip));
            }
        }
    }

    for port in PUBLIC_PORTS {
        rules.insert(FirewallRule::open(port.port(scope.base_port)));
    }

    let sync_port = SYNC_AGENT_PORT.port(scope.base_port);
    for range in &scope.sync_ranges {
        rules.insert(FirewallRule::from_range(sync_port, *range));
    }

    rules
}

#[derive(Clone)]
pub struct RuleController {
    name: String,
    host: Arc<dyn HostFirewall>,
    scope: FirewallScope,
}

impl RuleController {
    pub fn new(name: impl Into<String>, host: Arc<dyn HostFirewall>, scope: FirewallScope) -> Self {
        Self { name: name.into(), host, scope }
    }

    pub fn scope(&self) -> &FirewallScope {
        &self.scope
    }

    pub fn expected(&self) -> BTreeSet<FirewallRule> {
        expected_rules(&self.scope)
    }

    /// Host rules inside this workload's port window.
    pub fn actual(&self) -> Result<BTreeSet<FirewallRule>, FirewallError> {
        let base_port = self.scope.base_port;
        Ok(self
            .host
            .rules()?
            .into_iter()
            .filter(|rule| rule.in_window(base_port))
            .collect())
    }

    pub fn diff(&self) -> Result<RuleDiff, FirewallError> {
        Ok(diff_rules(&self.expected(), &self.actual()?))
    }

    pub fn is_synced(&self) -> Result<bool, FirewallError> {
        Ok(self.expected() == self.actual()?)
    }

    /// Apply additions, then removals. Returns the applied diff.
    pub fn sync(&self) -> Result<RuleDiff, FirewallError> {
        let diff = self.diff()?;
        if diff.is_empty() {
            return Ok(diff);
        }
        info!(
            "[{}] syncing firewall: {} to add, {} to remove",
            self.name,
            diff.to_add.len(),
            diff.to_remove.len()
        );
        for rule in &diff.to_add {
            self.host.add_rule(rule)?;
        }
        for rule in &diff.to_remove {
            self.host.remove_rule(rule)?;
        }
        Ok(diff)
    }

    /// Remove every rule in this workload's window.
    pub fn cleanup(&self) -> Result<usize, FirewallError> {
        let actual = self.actual()?;
        for rule in &actual {
            self.host.remove_rule(rule)?;
        }
        if !actual.is_empty() {
            info!("[{}] removed {} firewall rules", self.name, actual.len());
        }
        Ok(actual.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    fn scope() -> FirewallScope {
        FirewallScope {
            base_port: 10000,
            own_ip: Some(ip(1)),
            node_ips: vec![ip(1), ip(2), ip(3)],
            sync_ranges: vec![IpRange { start: ip(100), end: ip(110) }],
        }
    }

    #[test]
    fn test_expected_excludes_own_ip() {
        let rules = expected_rules(&scope());
        // 4 internal ports x 2 peers + 9 public + 1 sync range
        assert_eq!(rules.len(), 4 * 2 + 9 + 1);
        assert!(!rules.iter().any(|r| r.first_ip == Some(ip(1))));
        assert!(rules.contains(&FirewallRule::from_ip(10000, ip(2))));
        assert!(rules.contains(&FirewallRule::open(10003)));
        assert!(rules.contains(&FirewallRule::from_range(
            10001,
            IpRange { start: ip(100), end: ip(110) }
        )));
    }

    #[test]
    fn test_diff_is_disjoint_and_converges() {
        let expected = expected_rules(&scope());
        let mut actual: BTreeSet<FirewallRule> = expected.iter().take(5).copied().collect();
        actual.insert(FirewallRule::from_ip(10000, ip(9)));
        actual.insert(FirewallRule::open(10020));

        let diff = diff_rules(&expected, &actual);
        assert!(diff.to_add.is_disjoint(&diff.to_remove));

        let mut applied = actual.clone();
        applied.extend(diff.to_add.iter().copied());
        for rule in &diff.to_remove {
            applied.remove(rule);
        }
        assert_eq!(applied, expected);
    }

    #[test]
    fn test_diff_of_equal_sets_is_empty() {
        let expected = expected_rules(&scope());
        assert!(diff_rules(&expected, &expected).is_empty());
    }
}
