// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! JSON-RPC client for the worker's own endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::domain::chain::{ChainError, WorkerRpc};

/// Timeout for admin calls that are not liveness probes.
const ADMIN_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Clone, Default)]
pub struct JsonRpcWorkerClient {
    client: Client,
}

impl JsonRpcWorkerClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn call(
        &self,
        url: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, ChainError> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainError::Timeout(timeout)
                } else {
                    ChainError::Request(format!("{} {}: {}", method, url, e))
                }
            })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ChainError::Request(format!(
                "{} {} returned {}",
                method,
                url,
                response.status()
            )));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{}: {}", method, e)))?;

        if let Some(error) = rpc.error {
            return Err(ChainError::Request(format!("{} failed: {}", method, error)));
        }
        rpc.result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{}: missing result", method)))
    }
}

pub fn parse_hex_quantity(value: &Value) -> Result<u64, ChainError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ChainError::InvalidResponse(format!("expected hex string, got {}", value)))?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad quantity {}: {}", raw, e)))
}

#[async_trait]
impl WorkerRpc for JsonRpcWorkerClient {
    async fn block_number(&self, url: &str, timeout: Duration) -> Result<u64, ChainError> {
        let result = self.call(url, "eth_blockNumber", json!([]), timeout).await?;
        parse_hex_quantity(&result)
    }

    async fn submit_exit_time(&self, url: &str, finish_ts: i64) -> Result<(), ChainError> {
        self.call(
            url,
            "setSchainExitTime",
            json!([{ "finishTime": finish_ts }]),
            ADMIN_CALL_TIMEOUT,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity(&json!("0x1a")).unwrap(), 26);
        assert_eq!(parse_hex_quantity(&json!("0x0")).unwrap(), 0);
        assert!(parse_hex_quantity(&json!(26)).is_err());
        assert!(parse_hex_quantity(&json!("0xzz")).is_err());
    }

    #[tokio::test]
    async fn test_block_number() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({ "method": "eth_blockNumber" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#)
            .create_async()
            .await;

        let client = JsonRpcWorkerClient::new();
        let number = client.block_number(&server.url(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(number, 16);
    }

    #[tokio::test]
    async fn test_non_200_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#)
            .create_async()
            .await;

        let client = JsonRpcWorkerClient::new();
        assert!(client.block_number(&server.url(), Duration::from_secs(5)).await.is_err());
    }

    #[tokio::test]
    async fn test_submit_exit_time() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({
                "method": "setSchainExitTime",
                "params": [{ "finishTime": 1700000000 }]
            })))
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":true}"#)
            .create_async()
            .await;

        let client = JsonRpcWorkerClient::new();
        client.submit_exit_time(&server.url(), 1_700_000_000).await.unwrap();
        mock.assert_async().await;
    }
}
