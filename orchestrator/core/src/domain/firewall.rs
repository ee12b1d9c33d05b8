// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Firewall Domain
//!
//! ACL rules owned by the engine and the host packet-filter contract.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Rule value type, port layout, host firewall trait
//!
//! Every workload owns the port window `[base_port, base_port + PORTS_PER_SCHAIN)`.
//! Rules outside of any window are never read or written by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

pub const PORTS_PER_SCHAIN: u16 = 64;

/// Port offsets relative to a node's `base_port` for one workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkaledPorts {
    Proposal,
    Catchup,
    WsJson,
    HttpJson,
    BinaryConsensus,
    ZmqBroadcast,
    ImaMonitoring,
    WssJson,
    HttpsJson,
    InfoHttpJson,
    ImaAgentJson,
    PgHttpRpcJson,
    PgHttpsRpcJson,
    PgInfoHttpRpcJson,
    PgInfoHttpsRpcJson,
}

impl SkaledPorts {
    pub fn offset(&self) -> u16 {
        match self {
            SkaledPorts::Proposal => 0,
            SkaledPorts::Catchup => 1,
            SkaledPorts::WsJson => 2,
            SkaledPorts::HttpJson => 3,
            SkaledPorts::BinaryConsensus => 4,
            SkaledPorts::ZmqBroadcast => 5,
            SkaledPorts::ImaMonitoring => 6,
            SkaledPorts::WssJson => 7,
            SkaledPorts::HttpsJson => 8,
            SkaledPorts::InfoHttpJson => 9,
            SkaledPorts::ImaAgentJson => 10,
            SkaledPorts::PgHttpRpcJson => 11,
            SkaledPorts::PgHttpsRpcJson => 12,
            SkaledPorts::PgInfoHttpRpcJson => 13,
            SkaledPorts::PgInfoHttpsRpcJson => 14,
        }
    }

    pub fn port(&self, base_port: u16) -> u16 {
        base_port.saturating_add(self.offset())
    }
}

/// Whether the whole port window starting at `base_port` is addressable.
pub fn port_window_fits(base_port: u16) -> bool {
    u32::from(base_port) + u32::from(PORTS_PER_SCHAIN) <= u32::from(u16::MAX) + 1
}

/// Consensus ports, open to group peers only.
pub const INTERNAL_PORTS: [SkaledPorts; 4] = [
    SkaledPorts::Proposal,
    SkaledPorts::Catchup,
    SkaledPorts::BinaryConsensus,
    SkaledPorts::ZmqBroadcast,
];

/// RPC ports, open to everyone.
pub const PUBLIC_PORTS: [SkaledPorts; 9] = [
    SkaledPorts::HttpJson,
    SkaledPorts::HttpsJson,
    SkaledPorts::WsJson,
    SkaledPorts::WssJson,
    SkaledPorts::InfoHttpJson,
    SkaledPorts::PgHttpRpcJson,
    SkaledPorts::PgHttpsRpcJson,
    SkaledPorts::PgInfoHttpRpcJson,
    SkaledPorts::PgInfoHttpsRpcJson,
];

/// Port reachable from administrator-supplied sync-agent ranges.
pub const SYNC_AGENT_PORT: SkaledPorts = SkaledPorts::Catchup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IpRange {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

/// One ACL entry. Ordered by port, then source range.
///
/// A single-host source is stored with `first_ip == last_ip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FirewallRule {
    pub port: u16,
    pub first_ip: Option<Ipv4Addr>,
    pub last_ip: Option<Ipv4Addr>,
}

impl FirewallRule {
    pub fn open(port: u16) -> Self {
        Self { port, first_ip: None, last_ip: None }
    }

    pub fn from_ip(port: u16, ip: Ipv4Addr) -> Self {
        Self { port, first_ip: Some(ip), last_ip: Some(ip) }
    }

    pub fn from_range(port: u16, range: IpRange) -> Self {
        Self { port, first_ip: Some(range.start), last_ip: Some(range.end) }
    }

    pub fn is_single_ip(&self) -> bool {
        self.first_ip.is_some() && self.first_ip == self.last_ip
    }

    pub fn in_window(&self, base_port: u16) -> bool {
        self.port >= base_port && u32::from(self.port) < u32::from(base_port) + u32::from(PORTS_PER_SCHAIN)
    }
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first_ip, self.last_ip) {
            (Some(first), Some(last)) if first == last => write!(f, "{} <- {}", self.port, first),
            (Some(first), Some(last)) => write!(f, "{} <- {}-{}", self.port, first, last),
            (Some(first), None) => write!(f, "{} <- {}", self.port, first),
            _ => write!(f, "{} <- any", self.port),
        }
    }
}

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("Firewall command failed: {0}")]
    Command(String),

    #[error("Failed to parse firewall rule: {0}")]
    Parse(String),

    #[error("Firewall lock error: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host packet-filter table.
///
/// `rules` returns only rules of the managed shape. Each `add_rule` and
/// `remove_rule` call must be mutually exclusive with every other mutation on
/// the same host, across processes, and must be a no-op when the table is
/// already in the requested state.
pub trait HostFirewall: Send + Sync {
    fn rules(&self) -> Result<Vec<FirewallRule>, FirewallError>;

    fn add_rule(&self, rule: &FirewallRule) -> Result<(), FirewallError>;

    fn remove_rule(&self, rule: &FirewallRule) -> Result<(), FirewallError>;
}
