// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod actions;
pub mod allocation;
pub mod checks;
pub mod config_generator;
pub mod context;
pub mod firewall;
pub mod monitor;
pub mod reconcile;
pub mod repository_factory;
pub mod settings;
pub mod supervisor;

pub use actions::{ActionError, ActionManager, ExecutedAction, RecordHandle};
pub use checks::ChecksEngine;
pub use context::EngineContext;
pub use firewall::{RuleController, RuleDiff};
pub use monitor::{CycleOutcome, CycleReport, MonitorRunner};
pub use reconcile::{LoopExit, ReconcileLoop};
pub use supervisor::{ProcessSupervisor, SupervisorError};
