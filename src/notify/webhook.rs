use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Sink;
use crate::event::PaymentEvent;
use crate::ingest::anon_hash;

/// Async delivery target drained by the webhook worker.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: &PaymentEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Upper bound on delivery attempts per event.
pub const MAX_WEBHOOK_ATTEMPTS: u8 = 8;

/// Longest pause between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Pause after failed attempt `attempt` (1-based): 500ms, 1s, 2s, ... capped.
pub(crate) fn backoff(attempt: u8) -> Duration {
    let exp = u32::from(attempt.saturating_sub(1));
    2u64.checked_pow(exp)
        .and_then(|factor| factor.checked_mul(500))
        .map_or(MAX_BACKOFF, |ms| Duration::from_millis(ms).min(MAX_BACKOFF))
}

/// Posts each event as JSON to a webhook URL, with bounded retries.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: Client,
    timeout: Duration,
    max_attempts: u8,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_attempts: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.max(1));
        self
    }

    /// Total attempts per event, clamped to `1..=MAX_WEBHOOK_ATTEMPTS`.
    pub fn with_retries(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_WEBHOOK_ATTEMPTS);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, event: &PaymentEvent) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.url)
                .timeout(self.timeout)
                .json(event)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("webhook request failed: {e}"),
            };
            if attempt >= self.max_attempts {
                return Err(err);
            }
            tokio::time::sleep(backoff(attempt)).await;
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Non-blocking sink: enqueues onto a bounded channel drained by
/// [`spawn_webhook_worker`]. Rejects when the queue is full or closed.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<PaymentEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<PaymentEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end to hand to a worker.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<PaymentEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn deliver(&self, event: &PaymentEvent) -> bool {
        match self.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(target: "notify", "delivery queue full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(target: "notify", "delivery queue closed");
                false
            }
        }
    }
}

/// Drain `rx` into `notifier` until every sender is dropped.
pub fn spawn_webhook_worker(
    mut rx: mpsc::Receiver<PaymentEvent>,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let id = anon_hash(&event.raw_text);
            match notifier.send(&event).await {
                Ok(()) => {
                    tracing::debug!(target: "notify", %id, notifier = notifier.name(), "delivered");
                }
                Err(e) => {
                    metrics::counter!("webhook_failures_total").increment(1);
                    tracing::warn!(
                        target: "notify",
                        %id,
                        notifier = notifier.name(),
                        error = %e,
                        "webhook delivery failed"
                    );
                }
            }
        }
        tracing::info!(target: "notify", "delivery worker stopped");
    })
}

/// Wait for a worker to drain its queue once every sender is gone.
/// Returns `false` (and logs) if it did not finish within `grace`.
pub async fn finish_webhook_worker(handle: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(target: "notify", error = %e, "delivery worker crashed");
            false
        }
        Err(_) => {
            tracing::warn!(
                target: "notify",
                grace_secs = grace.as_secs(),
                "delivery worker still busy at shutdown, queued events dropped"
            );
            false
        }
    }
}
