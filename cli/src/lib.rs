// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! sChain Admin CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers, engine bootstrap and daemon plumbing

pub mod bootstrap;
pub mod commands;
pub mod daemon;
