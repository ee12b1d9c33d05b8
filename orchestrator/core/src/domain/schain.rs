// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # sChain Facts
//!
//! Read-only workload facts as fetched from the chain every reconciliation
//! cycle. Nothing in this module is ever mutated locally.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Workload, peer and rotation value types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::domain::chain::ChainError;
use crate::domain::firewall::{port_window_fits, PORTS_PER_SCHAIN};

pub type NodeId = u64;

/// Size class of a workload. The on-chain `partOfNode` value selects the tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchainTier {
    Test,
    Test4,
    Small,
    Medium,
    Large,
}

impl SchainTier {
    pub fn from_part_of_node(part_of_node: u8) -> Option<Self> {
        match part_of_node {
            0 => Some(SchainTier::Test),
            32 => Some(SchainTier::Test4),
            1 => Some(SchainTier::Small),
            4 => Some(SchainTier::Medium),
            128 => Some(SchainTier::Large),
            _ => None,
        }
    }

    pub fn part_of_node(&self) -> u8 {
        match self {
            SchainTier::Test => 0,
            SchainTier::Test4 => 32,
            SchainTier::Small => 1,
            SchainTier::Medium => 4,
            SchainTier::Large => 128,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchainTier::Test => "test",
            SchainTier::Test4 => "test4",
            SchainTier::Small => "small",
            SchainTier::Medium => "medium",
            SchainTier::Large => "large",
        }
    }
}

impl fmt::Display for SchainTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed sub-network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schain {
    pub name: String,
    pub generation: u64,
    pub tier: SchainTier,
    pub mainnet_owner: String,
    pub chain_id: u64,
    pub active: bool,
}

/// A node participating in a workload's group, as listed on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchainNode {
    pub id: NodeId,
    pub name: String,
    pub ip: Ipv4Addr,
    pub public_ip: Ipv4Addr,
    pub base_port: u16,
    pub ecdsa_public_key: String,
    pub schain_index: u32,
}

impl SchainNode {
    pub fn validate(&self) -> Result<(), ChainError> {
        if !port_window_fits(self.base_port) {
            return Err(ChainError::InvalidResponse(format!(
                "node {} base port {} leaves no room for {} workload ports",
                self.id, self.base_port, PORTS_PER_SCHAIN
            )));
        }
        Ok(())
    }
}

/// Decode a chain-encoded IPv4 address (4 bytes, big-endian).
pub fn ip_from_bytes(bytes: &[u8]) -> Result<Ipv4Addr, ChainError> {
    let octets: [u8; 4] = bytes.try_into().map_err(|_| {
        ChainError::InvalidResponse(format!(
            "IPv4 address must be 4 bytes, got {}",
            bytes.len()
        ))
    })?;
    Ok(Ipv4Addr::from(octets))
}

/// Current membership change state for a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RotationFacts {
    pub rotation_id: u64,
    pub leaving_node_id: NodeId,
    pub new_node_id: NodeId,
    pub finish_ts: i64,
    pub in_progress: bool,
}

impl RotationFacts {
    /// A rotation moving a node onto itself is never valid chain data.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.in_progress && self.leaving_node_id == self.new_node_id {
            return Err(ChainError::InvalidResponse(format!(
                "rotation {} has identical leaving and new node {}",
                self.rotation_id, self.leaving_node_id
            )));
        }
        Ok(())
    }
}

/// BLS public key of a previous group, kept in config so that the worker can
/// verify blocks signed before the last rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousPublicKey {
    pub bls_public_key: [String; 4],
    pub leaving_node_ecdsa_public_key: String,
    pub new_node_ecdsa_public_key: String,
    pub finish_ts: i64,
}

/// Everything fetched from the chain for one workload in one cycle, except
/// rotation facts which are kept separate.
#[derive(Debug, Clone)]
pub struct WorkloadFacts {
    pub schain: Schain,
    pub peers: Vec<SchainNode>,
    pub own: SchainNode,
    pub previous_keys: Vec<PreviousPublicKey>,
    pub bridge_linked: bool,
}

impl WorkloadFacts {
    pub fn name(&self) -> &str {
        &self.schain.name
    }

    pub fn is_member(&self) -> bool {
        self.peers.iter().any(|p| p.id == self.own.id)
    }

    /// Peers other than this node.
    pub fn others(&self) -> impl Iterator<Item = &SchainNode> {
        let own_id = self.own.id;
        self.peers.iter().filter(move |p| p.id != own_id)
    }
}
