// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Config Generator
//!
//! Builds the expected [`SchainConfig`] from chain facts. The same document is
//! used both to write the file and to detect a stale file on disk, so the
//! output must be deterministic for identical facts.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::firewall::SkaledPorts;
use crate::domain::schain::{RotationFacts, WorkloadFacts};
use crate::domain::schain_config::{
    ConfigNode, NodeInfo, PreviousKeyInfo, SchainConfig, SchainSection, SkaleConfig,
};
use crate::infrastructure::state_files::{read_json, write_json_atomic};

/// Chain parameters shared by every workload on the node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseConfig {
    pub seal_engine: String,
    pub params: serde_json::Value,
    #[serde(default)]
    pub unddos: serde_json::Value,
    pub genesis: serde_json::Value,
    #[serde(default)]
    pub accounts: serde_json::Value,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            seal_engine: "Ethash".to_string(),
            params: serde_json::json!({
                "accountStartNonce": "0x00",
                "homesteadForkBlock": "0x0",
                "EIP150ForkBlock": "0x0",
                "EIP158ForkBlock": "0x0",
                "byzantiumForkBlock": "0x0",
                "constantinopleForkBlock": "0x0",
                "networkID": "12313219",
                "allowFutureBlocks": true,
                "maximumExtraDataSize": "0x20",
                "minGasLimit": "0x1"
            }),
            unddos: serde_json::json!({}),
            genesis: serde_json::json!({
                "difficulty": "0x0",
                "gasLimit": "0xFFFFFFFFFFFFF",
                "timestamp": "0x0",
                "extraData": "0x"
            }),
            accounts: serde_json::json!({}),
        }
    }
}

impl BaseConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match read_json(path)? {
            Some(base) => Ok(base),
            None => anyhow::bail!("Base config not found at {:?}", path),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigGenerator {
    base: BaseConfig,
}

impl ConfigGenerator {
    pub fn new(base: BaseConfig) -> Self {
        Self { base }
    }

    /// Loads the base document from `path`, or uses built-in defaults.
    pub fn from_path(path: Option<&PathBuf>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Ok(Self::new(BaseConfig::load(path)?)),
            None => Ok(Self::default()),
        }
    }

    pub fn generate(&self, facts: &WorkloadFacts, rotation: &RotationFacts) -> SchainConfig {
        let own = &facts.own;
        let base_port = own.base_port;

        let mut nodes: Vec<ConfigNode> = facts
            .peers
            .iter()
            .map(|node| ConfigNode {
                node_id: node.id,
                node_name: node.name.clone(),
                schain_index: node.schain_index,
                base_port: node.base_port,
                http_rpc_port: SkaledPorts::HttpJson.port(node.base_port),
                ws_rpc_port: SkaledPorts::WsJson.port(node.base_port),
                ip: node.ip,
                public_ip: node.public_ip,
                public_key: node.ecdsa_public_key.clone(),
            })
            .collect();
        nodes.sort_by_key(|n| (n.schain_index, n.node_id));

        // Newest rotation first
        let mut previous_keys: Vec<PreviousKeyInfo> =
            facts.previous_keys.iter().map(PreviousKeyInfo::from).collect();
        previous_keys.sort_by(|a, b| b.finish_ts.cmp(&a.finish_ts));

        SchainConfig {
            seal_engine: self.base.seal_engine.clone(),
            params: self.base.params.clone(),
            unddos: self.base.unddos.clone(),
            genesis: self.base.genesis.clone(),
            accounts: self.base.accounts.clone(),
            skale_config: SkaleConfig {
                node_info: NodeInfo {
                    node_id: own.id,
                    node_name: own.name.clone(),
                    bind_ip: own.ip,
                    base_port,
                    http_rpc_port: SkaledPorts::HttpJson.port(base_port),
                    https_rpc_port: SkaledPorts::HttpsJson.port(base_port),
                    ws_rpc_port: SkaledPorts::WsJson.port(base_port),
                    wss_rpc_port: SkaledPorts::WssJson.port(base_port),
                    info_http_rpc_port: SkaledPorts::InfoHttpJson.port(base_port),
                    rotation_id: rotation.rotation_id,
                },
                schain: SchainSection {
                    schain_name: facts.schain.name.clone(),
                    schain_id: facts.schain.chain_id,
                    schain_owner: facts.schain.mainnet_owner.clone(),
                    generation: facts.schain.generation,
                    nodes,
                    previous_bls_public_keys: previous_keys,
                },
            },
        }
    }
}

/// Write the config document with a temp-file-then-rename.
pub fn write_config(path: &Path, config: &SchainConfig) -> std::io::Result<()> {
    write_json_atomic(path, config)
}

/// `Ok(None)` when the file is absent.
pub fn read_config(path: &Path) -> std::io::Result<Option<SchainConfig>> {
    read_json(path)
}
