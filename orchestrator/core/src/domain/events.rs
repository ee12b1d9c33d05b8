// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Operator-facing events emitted by the engine. Delivery is best-effort and
//! must never block or fail a reconciliation cycle.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::checks::CheckName;
use crate::domain::monitor::MonitorKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchainEvent {
    ChecksFailed {
        schain: String,
        failed: Vec<CheckName>,
    },
    RepairTriggered {
        schain: String,
        repair_mode: bool,
        exit_code_ok: bool,
    },
    DkgFailed {
        schain: String,
        reason: String,
    },
    RestartLimitReached {
        schain: String,
        restart_count: u32,
        /// Tail of the container output at the time the budget ran out.
        logs: String,
    },
    CycleFailed {
        schain: String,
        monitor: Option<MonitorKind>,
        error: String,
    },
    WorkerTerminated {
        schain: String,
        pid: u32,
        forced: bool,
    },
}

impl SchainEvent {
    pub fn schain(&self) -> &str {
        match self {
            SchainEvent::ChecksFailed { schain, .. }
            | SchainEvent::RepairTriggered { schain, .. }
            | SchainEvent::DkgFailed { schain, .. }
            | SchainEvent::RestartLimitReached { schain, .. }
            | SchainEvent::CycleFailed { schain, .. }
            | SchainEvent::WorkerTerminated { schain, .. } => schain,
        }
    }
}

/// Fire-and-forget notification sink. Implementations swallow their own
/// errors and rate limits.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: SchainEvent);
}

/// Notifier that only logs.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: SchainEvent) {
        tracing::info!("[{}] notification: {:?}", event.schain(), event);
    }
}
