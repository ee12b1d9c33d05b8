// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the sChain admin CLI

pub mod checks;
pub mod config;
pub mod monitor;
pub mod operator;
pub mod run;

pub use self::config::ConfigCommand;
