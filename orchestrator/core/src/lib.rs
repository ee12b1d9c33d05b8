// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # sChain Admin Core
//!
//! Reconciliation engine for sChain workloads on a single node.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Checks, monitor selection, remediation actions, rotation,
//!   firewall synchronization and worker process supervision

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;

/// Version marker written to every generated config; a mismatch forces
/// regeneration after an upgrade.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
