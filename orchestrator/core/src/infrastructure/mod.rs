// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Adapters behind the domain collaborator traits: Docker, iptables, the chain
//! gateway, the worker RPC, Postgres, webhooks and OS processes.

pub mod db;
pub mod file_lock;
pub mod gateway;
pub mod iptables;
pub mod node_config_store;
pub mod notifications;
pub mod process;
pub mod repositories;
pub mod rpc;
pub mod runtime;
pub mod state_files;

pub use gateway::{HttpChainGateway, HttpDkgClient};
pub use iptables::IptablesFirewall;
pub use notifications::WebhookNotifier;
pub use process::OsProcessControl;
pub use rpc::JsonRpcWorkerClient;
pub use runtime::DockerRuntime;
