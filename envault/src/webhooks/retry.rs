//! Background retry of failed webhook events with exponential backoff.
//!
//! Each tick selects Failed events that still have attempts left, checks
//! their backoff window, and re-runs the processor inline for the eligible
//! ones. Delay before attempt N+1 is `base_delay_minutes * 2^(N-1)` minutes,
//! measured from the last attempt. Events that exhaust their attempts are
//! simply no longer selected and wait for manual intervention.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::RetryConfig;
use crate::db::models::events::WebhookEvent;
use crate::db::store::EventStore;
use crate::types::abbrev_uuid;
use crate::webhooks::processor::WebhookProcessor;

pub struct RetryScheduler {
    store: Arc<dyn EventStore>,
    processor: WebhookProcessor,
    config: RetryConfig,
}

impl RetryScheduler {
    pub fn new(store: Arc<dyn EventStore>, processor: WebhookProcessor, config: RetryConfig) -> Self {
        Self {
            store,
            processor,
            config,
        }
    }

    /// Poll loop. Runs until the cancellation token fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            poll_interval = ?self.config.poll_interval,
            max_attempts = self.config.max_attempts,
            base_delay_minutes = self.config.base_delay_minutes,
            "Starting webhook retry scheduler"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "Retry scheduler tick failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Retry scheduler shutting down");
                    return;
                }
            }
        }
    }

    /// Run a single retry pass. One event failing never aborts the batch.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> anyhow::Result<()> {
        let candidates = self
            .store
            .failed_events(self.config.max_attempts, self.config.batch_size)
            .await?;

        if candidates.is_empty() {
            return Ok(());
        }
        debug!(count = candidates.len(), "Found failed webhook events to consider");

        for event in candidates {
            if !self.backoff_elapsed(&event) {
                debug!(event_id = %abbrev_uuid(&event.id), attempts = event.attempt_count, "Backoff window still open, skipping");
                continue;
            }

            info!(
                event_id = %abbrev_uuid(&event.id),
                attempts = event.attempt_count,
                "Retrying failed webhook event"
            );
            self.store.reset_for_retry(event.id).await?;

            if self.processor.process_event(event.id).await.is_err() {
                // The processor already persisted the failure state.
                if event.attempt_count + 1 >= self.config.max_attempts {
                    warn!(
                        event_id = %abbrev_uuid(&event.id),
                        max_attempts = self.config.max_attempts,
                        "Webhook event exhausted its retries, manual intervention required"
                    );
                }
            }
        }

        Ok(())
    }

    /// Whether the exponential backoff window since the last attempt has
    /// passed. An event with no recorded attempt time is always eligible.
    fn backoff_elapsed(&self, event: &WebhookEvent) -> bool {
        let Some(last_attempt_at) = event.last_attempt_at else {
            return true;
        };

        let delay = backoff_minutes(self.config.base_delay_minutes, event.attempt_count);
        Utc::now() - last_attempt_at >= ChronoDuration::minutes(delay)
    }
}

/// Backoff in minutes before the attempt following `attempt_count` failures.
fn backoff_minutes(base_delay_minutes: i64, attempt_count: i32) -> i64 {
    let exponent = (attempt_count - 1).max(0).min(30) as u32;
    base_delay_minutes.saturating_mul(1i64 << exponent)
}
