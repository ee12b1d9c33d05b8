// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure types, collaborator traits and classification rules of the
//! reconciliation engine.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Workload facts, records, checks, firewall rules, monitor selection

pub mod chain;
pub mod checks;
pub mod events;
pub mod firewall;
pub mod layout;
pub mod monitor;
pub mod node_config;
pub mod process;
pub mod record;
pub mod repository;
pub mod runtime;
pub mod schain;
pub mod schain_config;
pub mod skaled_status;
