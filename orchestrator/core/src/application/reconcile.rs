// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-workload reconciliation loop, run inside a dedicated worker process.
//!
//! Cancellation is only observed between cycles, so an action that is
//! writing a key share or a config always runs to completion.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::context::EngineContext;
use crate::application::monitor::{CycleOutcome, MonitorRunner};
use crate::domain::events::SchainEvent;
use crate::domain::process::Heartbeat;
use crate::infrastructure::state_files::write_heartbeat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The node left the workload.
    Finished,
    Cancelled,
}

pub struct ReconcileLoop {
    ctx: Arc<EngineContext>,
    runner: MonitorRunner,
    name: String,
    pid: u32,
}

impl ReconcileLoop {
    pub fn new(ctx: Arc<EngineContext>, name: impl Into<String>) -> Self {
        Self {
            runner: MonitorRunner::new(ctx.clone()),
            ctx,
            name: name.into(),
            pid: std::process::id(),
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) -> LoopExit {
        info!("[{}] worker started (pid {})", self.name, self.pid);
        self.heartbeat();

        loop {
            if shutdown.is_cancelled() {
                return LoopExit::Cancelled;
            }

            match self.runner.run_cycle(&self.name).await {
                Ok(CycleOutcome::Finished) => {
                    info!("[{}] worker finished", self.name);
                    return LoopExit::Finished;
                }
                Ok(CycleOutcome::Completed(_)) => {}
                Err(e) => {
                    error!("[{}] cycle failed: {}", self.name, e);
                    metrics::counter!("schain_admin_cycle_failures_total").increment(1);
                    self.ctx
                        .notifier
                        .notify(SchainEvent::CycleFailed {
                            schain: self.name.clone(),
                            monitor: None,
                            error: e.to_string(),
                        })
                        .await;
                }
            }
            self.heartbeat();

            let delay = self.next_interval();
            tokio::select! {
                _ = shutdown.cancelled() => return LoopExit::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Uniform in `[min_interval, max_interval]`.
    pub fn next_interval(&self) -> Duration {
        jittered_interval(self.ctx.settings.min_interval, self.ctx.settings.max_interval)
    }

    fn heartbeat(&self) {
        let path = self.ctx.layout.heartbeat_path(&self.name);
        if let Err(e) = write_heartbeat(&path, &Heartbeat::now(self.pid)) {
            warn!("[{}] failed to write heartbeat: {}", self.name, e);
        }
    }
}

pub fn jittered_interval(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jittered_interval_bounds() {
        let min = Duration::from_secs(20);
        let max = Duration::from_secs(40);
        for _ in 0..100 {
            let d = jittered_interval(min, max);
            assert!(d >= min && d <= max);
        }
        assert_eq!(jittered_interval(max, min), max);
    }
}
