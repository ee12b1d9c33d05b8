// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Chain Gateway Clients
//!
//! JSON-over-HTTP adapters for the chain gateway (`ChainClient`) and the DKG
//! service (`DkgClient`).
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Translate domain queries into gateway requests
//! - **Integration:** Chain gateway HTTP API → domain facts
//!
//! # Endpoints
//!
//! | Method | Path | Result |
//! |--------|------|--------|
//! | GET | `/nodes/{id}` | `SchainNode` |
//! | GET | `/nodes/{id}/schains` | `[Schain]` |
//! | GET | `/nodes/{id}/leaving-schains` | `[Schain]` |
//! | GET | `/schains/{name}` | `Schain` |
//! | GET | `/schains/{name}/rotation` | `RotationFacts` |
//! | GET | `/schains/{name}/nodes` | `[SchainNode]` |
//! | GET | `/schains/{name}/previous-keys` | `[PreviousPublicKey]` |
//! | GET | `/schains/{name}/bridge` | `{ "linked": bool }` |
//! | GET | `/dkg/timeout` | `{ "timeout_secs": u64 }` |
//! | POST | `{dkg}/dkg` | `DkgOutcome` |

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::chain::{ChainClient, ChainError, DkgClient, DkgOutcome, DkgRequest};
use crate::domain::schain::{NodeId, PreviousPublicKey, RotationFacts, Schain, SchainNode};

#[derive(Debug, Deserialize)]
struct BridgeStatus {
    linked: bool,
}

#[derive(Debug, Deserialize)]
struct DkgTimeout {
    timeout_secs: u64,
}

fn request_error(url: &str, timeout: Duration, err: reqwest::Error) -> ChainError {
    if err.is_timeout() {
        ChainError::Timeout(timeout)
    } else {
        ChainError::Request(format!("{}: {}", url, err))
    }
}

pub struct HttpChainGateway {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpChainGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| request_error(&url, self.timeout, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ChainError::NotFound(path.to_string())),
            status if !status.is_success() => {
                return Err(ChainError::Request(format!("{} returned {}", url, status)))
            }
            _ => {}
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl ChainClient for HttpChainGateway {
    async fn get_schains_for_node(&self, node_id: NodeId) -> Result<Vec<Schain>, ChainError> {
        self.get(&format!("/nodes/{}/schains", node_id)).await
    }

    async fn get_leaving_schains_for_node(
        &self,
        node_id: NodeId,
    ) -> Result<Vec<Schain>, ChainError> {
        self.get(&format!("/nodes/{}/leaving-schains", node_id)).await
    }

    async fn get_schain(&self, name: &str) -> Result<Schain, ChainError> {
        self.get(&format!("/schains/{}", name)).await
    }

    async fn get_rotation_facts(&self, name: &str) -> Result<RotationFacts, ChainError> {
        self.get(&format!("/schains/{}/rotation", name)).await
    }

    async fn get_peer_list(&self, name: &str) -> Result<Vec<SchainNode>, ChainError> {
        self.get(&format!("/schains/{}/nodes", name)).await
    }

    async fn get_previous_public_keys(
        &self,
        name: &str,
    ) -> Result<Vec<PreviousPublicKey>, ChainError> {
        self.get(&format!("/schains/{}/previous-keys", name)).await
    }

    async fn get_node(&self, node_id: NodeId) -> Result<SchainNode, ChainError> {
        self.get(&format!("/nodes/{}", node_id)).await
    }

    async fn is_bridge_linked(&self, name: &str) -> Result<bool, ChainError> {
        let status: BridgeStatus = self.get(&format!("/schains/{}/bridge", name)).await?;
        Ok(status.linked)
    }

    async fn get_dkg_timeout(&self) -> Result<u64, ChainError> {
        let timeout: DkgTimeout = self.get("/dkg/timeout").await?;
        Ok(timeout.timeout_secs)
    }
}

pub struct HttpDkgClient {
    url: String,
    client: Client,
    timeout: Duration,
}

impl HttpDkgClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: format!("{}/dkg", base_url.into().trim_end_matches('/')),
            client: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl DkgClient for HttpDkgClient {
    async fn run(&self, request: DkgRequest) -> Result<DkgOutcome, ChainError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&self.url, self.timeout, e))?;

        if !response.status().is_success() {
            return Err(ChainError::Request(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }

        response
            .json::<DkgOutcome>()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))
    }
}
