// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Webhook Notifier
//!
//! Posts [`SchainEvent`]s as JSON to an operator webhook. Each workload gets
//! its own rate limit bucket so one flapping workload cannot drown out the
//! rest. Delivery runs on a spawned task, failures are logged and dropped.

use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::events::{Notifier, SchainEvent};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookNotifier {
    url: String,
    client: Client,
    limiter: DefaultKeyedRateLimiter<String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            url: url.into(),
            client: Client::new(),
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
        }
    }

    fn admit(&self, event: &SchainEvent) -> bool {
        self.limiter.check_key(&event.schain().to_string()).is_ok()
    }

    /// Spawns the delivery. `None` when the event was rate limited.
    pub fn dispatch(&self, event: SchainEvent) -> Option<JoinHandle<()>> {
        if !self.admit(&event) {
            debug!("[{}] notification rate limited", event.schain());
            return None;
        }

        let request = self.client.post(&self.url).timeout(DELIVERY_TIMEOUT).json(&event);
        Some(tokio::spawn(async move {
            let result = request.send().await.and_then(|r| r.error_for_status());
            if let Err(e) = result {
                warn!("[{}] Failed to deliver notification: {}", event.schain(), e);
            }
        }))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: SchainEvent) {
        self.dispatch(event);
    }
}
