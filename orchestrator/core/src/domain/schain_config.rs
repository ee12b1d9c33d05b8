// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Workload Configuration Document
//!
//! The JSON document handed to the worker container. Chain parameters come
//! from a node-wide base config, the `skaleConfig` section is derived from
//! chain facts on every cycle.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::domain::schain::{NodeId, PreviousPublicKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchainConfig {
    pub seal_engine: String,
    pub params: serde_json::Value,
    #[serde(default)]
    pub unddos: serde_json::Value,
    pub genesis: serde_json::Value,
    pub accounts: serde_json::Value,
    pub skale_config: SkaleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkaleConfig {
    #[serde(rename = "nodeInfo")]
    pub node_info: NodeInfo,
    #[serde(rename = "sChain")]
    pub schain: SchainSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub node_id: NodeId,
    pub node_name: String,
    #[serde(rename = "bindIP")]
    pub bind_ip: Ipv4Addr,
    pub base_port: u16,
    pub http_rpc_port: u16,
    pub https_rpc_port: u16,
    pub ws_rpc_port: u16,
    pub wss_rpc_port: u16,
    pub info_http_rpc_port: u16,
    pub rotation_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchainSection {
    pub schain_name: String,
    #[serde(rename = "schainID")]
    pub schain_id: u64,
    pub schain_owner: String,
    pub generation: u64,
    pub nodes: Vec<ConfigNode>,
    #[serde(default)]
    pub previous_bls_public_keys: Vec<PreviousKeyInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigNode {
    pub node_id: NodeId,
    pub node_name: String,
    #[serde(rename = "schainIndex")]
    pub schain_index: u32,
    pub base_port: u16,
    pub http_rpc_port: u16,
    pub ws_rpc_port: u16,
    pub ip: Ipv4Addr,
    #[serde(rename = "publicIP")]
    pub public_ip: Ipv4Addr,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlsPublicKey {
    #[serde(rename = "blsPublicKey0")]
    pub key0: String,
    #[serde(rename = "blsPublicKey1")]
    pub key1: String,
    #[serde(rename = "blsPublicKey2")]
    pub key2: String,
    #[serde(rename = "blsPublicKey3")]
    pub key3: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousKeyInfo {
    pub bls_public_key: BlsPublicKey,
    pub leaving_node_ecdsa_public_key: String,
    pub new_node_ecdsa_public_key: String,
    pub finish_ts: i64,
}

impl From<&PreviousPublicKey> for PreviousKeyInfo {
    fn from(key: &PreviousPublicKey) -> Self {
        let [key0, key1, key2, key3] = key.bls_public_key.clone();
        Self {
            bls_public_key: BlsPublicKey { key0, key1, key2, key3 },
            leaving_node_ecdsa_public_key: key.leaving_node_ecdsa_public_key.clone(),
            new_node_ecdsa_public_key: key.new_node_ecdsa_public_key.clone(),
            finish_ts: key.finish_ts,
        }
    }
}

impl SchainConfig {
    pub fn base_port(&self) -> u16 {
        self.skale_config.node_info.base_port
    }

    pub fn own_ip(&self) -> Ipv4Addr {
        self.skale_config.node_info.bind_ip
    }

    pub fn node_ips(&self) -> Vec<Ipv4Addr> {
        self.skale_config.schain.nodes.iter().map(|n| n.ip).collect()
    }
}
