// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # External Collaborator Contracts
//!
//! The on-chain client, the DKG collaborator and the worker's own JSON-RPC
//! endpoint. The engine only consumes these; implementations live in
//! `crate::infrastructure::gateway` and `crate::infrastructure::rpc`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::schain::{NodeId, PreviousPublicKey, RotationFacts, Schain, SchainNode};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Read-only source of cluster facts.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_schains_for_node(&self, node_id: NodeId) -> Result<Vec<Schain>, ChainError>;

    /// Workloads this node is rotating out of but still serves until `finish_ts`.
    async fn get_leaving_schains_for_node(&self, node_id: NodeId)
        -> Result<Vec<Schain>, ChainError>;

    async fn get_schain(&self, name: &str) -> Result<Schain, ChainError>;

    async fn get_rotation_facts(&self, name: &str) -> Result<RotationFacts, ChainError>;

    async fn get_peer_list(&self, name: &str) -> Result<Vec<SchainNode>, ChainError>;

    async fn get_previous_public_keys(&self, name: &str)
        -> Result<Vec<PreviousPublicKey>, ChainError>;

    async fn get_node(&self, node_id: NodeId) -> Result<SchainNode, ChainError>;

    /// Whether the workload is registered with the bridge and needs a relay.
    async fn is_bridge_linked(&self, name: &str) -> Result<bool, ChainError>;

    /// DKG timeout in seconds, used to derive the supervisor's stuck threshold.
    async fn get_dkg_timeout(&self) -> Result<u64, ChainError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgRequest {
    pub schain: String,
    pub group_id: String,
    pub node_id: NodeId,
    pub rotation_id: u64,
    pub peers: Vec<NodeId>,
    pub threshold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DkgOutcome {
    Done { key_share: String, public_key: String },
    Failed { reason: String },
}

/// Signing threshold for a group of `n` nodes: `t = (2n + 1) / 3`.
pub fn dkg_threshold(n: usize) -> usize {
    (2 * n + 1) / 3
}

/// Black-box distributed key generation.
#[async_trait]
pub trait DkgClient: Send + Sync {
    async fn run(&self, request: DkgRequest) -> Result<DkgOutcome, ChainError>;
}

/// The worker process's own RPC surface.
#[async_trait]
pub trait WorkerRpc: Send + Sync {
    async fn block_number(&self, url: &str, timeout: Duration) -> Result<u64, ChainError>;

    async fn submit_exit_time(&self, url: &str, finish_ts: i64) -> Result<(), ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dkg_threshold() {
        assert_eq!(dkg_threshold(4), 3);
        assert_eq!(dkg_threshold(16), 11);
        assert_eq!(dkg_threshold(1), 1);
    }

    #[test]
    fn test_outcome_wire_format() {
        let done: DkgOutcome = serde_json::from_str(
            r#"{"status":"done","key_share":"0xaa","public_key":"0xbb"}"#,
        )
        .unwrap();
        assert_eq!(
            done,
            DkgOutcome::Done {
                key_share: "0xaa".to_string(),
                public_key: "0xbb".to_string()
            }
        );

        let failed: DkgOutcome =
            serde_json::from_str(r#"{"status":"failed","reason":"timeout"}"#).unwrap();
        assert!(matches!(failed, DkgOutcome::Failed { .. }));
    }
}
