// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP webhook delivery of verdict events.
//!
//! `dispatch` only serializes the event and spawns a delivery task on the
//! current tokio runtime, so the series lock held by the caller is released
//! without waiting on the network. Delivery retries transient failures
//! (connection errors, timeouts, 5xx and 429) with exponential backoff and
//! gives up immediately on other 4xx responses.

use benchwatch_core::{AlertSink, Error, Result, VerdictEvent};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Webhook settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Endpoint receiving a JSON POST per event.
    pub url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds, doubled on each retry.
    pub initial_delay_ms: u64,
    /// Upper bound on the retry delay in milliseconds.
    pub max_delay_ms: u64,
    /// Only deliver regressions and improvements.
    pub only_flagged: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_ms: 5_000,
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            only_flagged: true,
        }
    }
}

impl WebhookConfig {
    /// Default settings for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Check the settings before building a client.
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(Error::config(format!(
                "webhook url must be http(s), got {:?}",
                self.url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("webhook timeout_ms must be greater than 0"));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(Error::config(format!(
                "webhook initial_delay_ms ({}) cannot exceed max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Why a delivery failed.
#[derive(Debug, ThisError)]
pub enum DeliveryError {
    /// The endpoint refused the event; retrying will not help.
    #[error("webhook rejected event: HTTP {status}: {body}")]
    Rejected {
        /// Response status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Every attempt failed with a transient error.
    #[error("webhook delivery failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        last: String,
    },
}

/// Sink POSTing each event as JSON to a webhook.
#[derive(Debug)]
pub struct WebhookSink {
    client: reqwest::Client,
    config: WebhookConfig,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl WebhookSink {
    /// Build a sink after validating `config`.
    pub fn new(config: WebhookConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::config(format!("building webhook client: {e}")))?;
        info!(url = %config.url, max_retries = config.max_retries, "webhook sink ready");
        Ok(Self {
            client,
            config,
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Settings in use.
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Whether `event` passes the `only_flagged` filter.
    pub fn accepts(&self, event: &VerdictEvent) -> bool {
        !self.config.only_flagged || event.verdict.is_flagged()
    }

    /// Deliver one event now, retrying per configuration.
    pub async fn deliver(&self, event: &VerdictEvent) -> std::result::Result<(), DeliveryError> {
        deliver(&self.client, &self.config, event).await
    }

    /// Wait for every delivery spawned so far.
    pub async fn flush(&self) {
        let pending = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "webhook delivery task did not complete");
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        match self.pending.lock() {
            Ok(mut pending) => {
                pending.retain(|h| !h.is_finished());
                pending.push(handle);
            }
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }
}

impl AlertSink for WebhookSink {
    fn dispatch(&self, event: &VerdictEvent) {
        if !self.accepts(event) {
            debug!(key = %event.key, verdict = %event.verdict, "webhook skipped unflagged verdict");
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(key = %event.key, "no async runtime, webhook event dropped");
            return;
        };

        let client = self.client.clone();
        let config = self.config.clone();
        let event = event.clone();
        let handle = runtime.spawn(async move {
            if let Err(e) = deliver(&client, &config, &event).await {
                error!(
                    key = %event.key,
                    commit_id = %event.commit_id,
                    error = %e,
                    "webhook delivery failed"
                );
            }
        });
        self.track(handle);
    }
}

async fn deliver(
    client: &reqwest::Client,
    config: &WebhookConfig,
    event: &VerdictEvent,
) -> std::result::Result<(), DeliveryError> {
    let max_delay = Duration::from_millis(config.max_delay_ms);
    let mut delay = Duration::from_millis(config.initial_delay_ms);
    let mut last = String::new();

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            warn!(
                attempt,
                max_retries = config.max_retries,
                delay_ms = delay.as_millis() as u64,
                "retrying webhook delivery"
            );
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(max_delay);
        }

        match client.post(&config.url).json(event).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(key = %event.key, attempt, "webhook delivered");
                return Ok(());
            }
            Ok(response) => {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                if status.is_client_error() && status.as_u16() != 429 {
                    return Err(DeliveryError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }
                last = format!("HTTP {status}: {body}");
            }
            Err(e) => last = e.to_string(),
        }
    }

    Err(DeliveryError::Exhausted {
        attempts: config.max_retries + 1,
        last,
    })
}
