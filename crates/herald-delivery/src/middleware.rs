//! Retry, fallback, and batching middleware over the channel adapters.
//!
//! [`DeliveryMiddleware::deliver`] is the single choke point every outbound
//! message passes through: payload validation, rate-limit waits, bounded
//! retries with exponential backoff, at most one fallback hop, and an
//! overall deadline. Adapters stay single-attempt; callers never talk to an
//! adapter directly.
//!
//! Delivery failures are values, not panics: `deliver` always returns a
//! [`DeliveryResult`], and the orchestrator decides what the user sees.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use herald_channel::{ChannelAdapter, ChannelError, ChannelRegistry, ProviderReceipt};
use herald_types::{ChannelId, ChannelQuota, DeliveryConfig, OutboundPayload, TenantId};

use crate::rate_limiter::RateLimiter;

/// Ceiling for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Terminal classification of a failed delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Text exceeds the channel's configured maximum. Not retried; the
    /// caller must reshape the payload.
    #[error("message of {length} chars exceeds limit of {max} for channel {channel}")]
    MessageTooLong {
        channel: String,
        length: usize,
        max: usize,
    },

    /// Media payload on a channel configured without media support.
    /// Not retried.
    #[error("channel {channel} does not support media payloads")]
    MediaUnsupported { channel: String },

    /// No adapter could be resolved on the final attempt.
    #[error("adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// The provider rejected the send on the final attempt.
    #[error("send failed: {0}")]
    Send(String),

    /// The overall delivery deadline elapsed before any attempt succeeded.
    #[error("delivery deadline of {secs}s exceeded")]
    DeadlineExceeded { secs: u64 },
}

impl From<&ChannelError> for DeliveryError {
    fn from(err: &ChannelError) -> Self {
        match err {
            ChannelError::AdapterUnavailable(reason) => {
                DeliveryError::AdapterUnavailable(reason.clone())
            }
            other => DeliveryError::Send(other.to_string()),
        }
    }
}

/// Outcome of one `deliver` call, including the fallback hop if taken.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub success: bool,
    /// The channel that actually carried the message (fallback on a
    /// successful hop, primary otherwise).
    pub channel: ChannelId,
    pub provider_message_id: Option<String>,
    /// Total adapter attempts performed, primary plus fallback.
    pub attempts: u32,
    /// The last error observed, for failed results.
    pub error: Option<DeliveryError>,
}

impl DeliveryResult {
    fn delivered(channel: ChannelId, receipt: ProviderReceipt, attempts: u32) -> Self {
        Self {
            success: true,
            channel,
            provider_message_id: receipt.provider_message_id,
            attempts,
            error: None,
        }
    }

    fn failed(channel: ChannelId, attempts: u32, error: DeliveryError) -> Self {
        Self {
            success: false,
            channel,
            provider_message_id: None,
            attempts,
            error: Some(error),
        }
    }
}

/// Correlation context threaded through delivery logs.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    pub correlation_id: Uuid,
    /// Interactive turns get priority in logs over bulk traffic.
    pub interactive: bool,
}

impl DeliveryContext {
    pub fn interactive() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            interactive: true,
        }
    }

    pub fn bulk() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            interactive: false,
        }
    }
}

/// Retry/fallback/batching middleware.
pub struct DeliveryMiddleware {
    limiter: Arc<RateLimiter>,
    registry: Arc<ChannelRegistry>,
    quotas: RwLock<HashMap<ChannelId, ChannelQuota>>,
    config: DeliveryConfig,
}

impl DeliveryMiddleware {
    /// Create the middleware over a limiter, a registry, per-channel quota
    /// configuration, and pipeline knobs.
    pub fn new(
        limiter: Arc<RateLimiter>,
        registry: Arc<ChannelRegistry>,
        quotas: HashMap<ChannelId, ChannelQuota>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            limiter,
            registry,
            quotas: RwLock::new(quotas),
            config,
        }
    }

    /// Replace the quota table (hot reload). In-flight `deliver` calls pick
    /// the new values up at their next attempt boundary.
    pub fn reload_quotas(&self, quotas: HashMap<ChannelId, ChannelQuota>) {
        *self.quotas.write().expect("quota table poisoned") = quotas;
    }

    /// Resolve the quota for a channel, falling back to conservative
    /// defaults when unconfigured.
    fn quota_for(&self, channel: &ChannelId) -> ChannelQuota {
        let quotas = self.quotas.read().expect("quota table poisoned");
        match quotas.get(channel) {
            Some(quota) => quota.clone(),
            None => {
                debug!(%channel, "no quota configured; using defaults");
                ChannelQuota::default()
            }
        }
    }

    /// Deliver one payload to one recipient with retries, fallback, and an
    /// overall deadline.
    pub async fn deliver(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        recipient: &str,
        payload: &OutboundPayload,
        ctx: &DeliveryContext,
    ) -> DeliveryResult {
        let quota = self.quota_for(channel);

        // Payload-shape validation: rejected outright, never retried.
        if let Some(text) = payload.text_content() {
            let length = text.chars().count();
            if length > quota.max_message_length {
                warn!(
                    %channel,
                    correlation_id = %ctx.correlation_id,
                    length,
                    max = quota.max_message_length,
                    "rejecting over-length message"
                );
                return DeliveryResult::failed(
                    channel.clone(),
                    0,
                    DeliveryError::MessageTooLong {
                        channel: channel.to_string(),
                        length,
                        max: quota.max_message_length,
                    },
                );
            }
        }
        if payload.is_media() && !quota.supports_media {
            return DeliveryResult::failed(
                channel.clone(),
                0,
                DeliveryError::MediaUnsupported {
                    channel: channel.to_string(),
                },
            );
        }

        let deadline = Duration::from_secs(self.config.overall_deadline_secs);
        match tokio::time::timeout(
            deadline,
            self.deliver_with_fallback(channel, tenant, recipient, payload, &quota, ctx),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    %channel,
                    correlation_id = %ctx.correlation_id,
                    deadline_secs = self.config.overall_deadline_secs,
                    "delivery deadline exceeded"
                );
                DeliveryResult::failed(
                    channel.clone(),
                    quota.retry_attempts,
                    DeliveryError::DeadlineExceeded {
                        secs: self.config.overall_deadline_secs,
                    },
                )
            }
        }
    }

    /// Primary attempts, then at most one fallback hop. No fallback
    /// chaining: the fallback channel's own fallback is never consulted.
    async fn deliver_with_fallback(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        recipient: &str,
        payload: &OutboundPayload,
        quota: &ChannelQuota,
        ctx: &DeliveryContext,
    ) -> DeliveryResult {
        let (attempts, outcome) = self
            .attempt_loop(channel, tenant, recipient, payload, quota, ctx)
            .await;

        let last_error = match outcome {
            Ok(receipt) => return DeliveryResult::delivered(channel.clone(), receipt, attempts),
            Err(error) => error,
        };

        let Some(fallback) = quota.fallback_channel.as_deref() else {
            return DeliveryResult::failed(channel.clone(), attempts, (&last_error).into());
        };
        if fallback == channel.as_str() {
            return DeliveryResult::failed(channel.clone(), attempts, (&last_error).into());
        }

        let fallback_id = ChannelId::new(fallback);
        let fallback_quota = self.quota_for(&fallback_id);
        if payload.is_media() && !fallback_quota.supports_media {
            debug!(
                %channel,
                fallback = %fallback_id,
                "skipping fallback: media unsupported there"
            );
            return DeliveryResult::failed(channel.clone(), attempts, (&last_error).into());
        }

        info!(
            %channel,
            fallback = %fallback_id,
            correlation_id = %ctx.correlation_id,
            "primary channel exhausted; trying fallback once"
        );

        self.limiter.wait_until_allowed(&fallback_id).await;
        match self
            .single_attempt(&fallback_id, tenant, recipient, payload)
            .await
        {
            Ok(receipt) => DeliveryResult::delivered(fallback_id, receipt, attempts + 1),
            Err(error) => {
                warn!(
                    fallback = %fallback_id,
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "fallback attempt failed"
                );
                DeliveryResult::failed(channel.clone(), attempts + 1, (&error).into())
            }
        }
    }

    /// Sequential retry loop on the primary channel. Returns the attempt
    /// count and either the success receipt or the last error.
    async fn attempt_loop(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        recipient: &str,
        payload: &OutboundPayload,
        quota: &ChannelQuota,
        ctx: &DeliveryContext,
    ) -> (u32, Result<ProviderReceipt, ChannelError>) {
        let mut last = Err(ChannelError::Other(
            "no delivery attempts configured".into(),
        ));

        for attempt in 1..=quota.retry_attempts {
            self.limiter.wait_until_allowed(channel).await;

            match self
                .single_attempt(channel, tenant, recipient, payload)
                .await
            {
                Ok(receipt) => {
                    debug!(
                        %channel,
                        correlation_id = %ctx.correlation_id,
                        attempt,
                        "delivery succeeded"
                    );
                    return (attempt, Ok(receipt));
                }
                Err(error) => {
                    warn!(
                        %channel,
                        correlation_id = %ctx.correlation_id,
                        attempt,
                        max_attempts = quota.retry_attempts,
                        error = %error,
                        "delivery attempt failed"
                    );
                    last = Err(error);
                    if attempt < quota.retry_attempts {
                        tokio::time::sleep(backoff_delay(quota.retry_base_delay_secs, attempt))
                            .await;
                    }
                }
            }
        }

        (quota.retry_attempts, last)
    }

    /// One adapter attempt, including capability-aware options handling.
    async fn single_attempt(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        recipient: &str,
        payload: &OutboundPayload,
    ) -> Result<ProviderReceipt, ChannelError> {
        let adapter = self.registry.get_adapter(channel, tenant).await?;

        match payload {
            OutboundPayload::Text { text } => adapter.send_text(recipient, text).await,
            OutboundPayload::Options { text, options } => {
                self.send_options_respecting_capabilities(&*adapter, recipient, text, options)
                    .await
            }
            OutboundPayload::Image { image, caption } => {
                adapter
                    .send_image(recipient, image, caption.as_deref())
                    .await
            }
            OutboundPayload::Document { document, caption } => {
                adapter
                    .send_document(recipient, document, caption.as_deref())
                    .await
            }
        }
    }

    /// Send options within the adapter's advertised capability: direct when
    /// they fit, native paginated list when advertised, otherwise ordered
    /// chunks with a pacing delay. Option order is preserved across chunks.
    async fn send_options_respecting_capabilities(
        &self,
        adapter: &dyn ChannelAdapter,
        recipient: &str,
        text: &str,
        options: &[herald_types::MessageOption],
    ) -> Result<ProviderReceipt, ChannelError> {
        let caps = adapter.capabilities();
        if options.len() <= caps.max_inline_options {
            return adapter.send_options(recipient, text, options).await;
        }

        if caps.supports_paginated_lists {
            return adapter.send_paginated_options(recipient, text, options).await;
        }

        let chunk_size = caps.max_inline_options.max(1);
        let total_chunks = options.len().div_ceil(chunk_size);
        let pacing = Duration::from_millis(self.config.chunk_pacing_ms);
        let mut receipt = ProviderReceipt::default();

        for (index, chunk) in options.chunks(chunk_size).enumerate() {
            let chunk_text = if index == 0 {
                text.to_string()
            } else {
                format!("({}/{total_chunks})", index + 1)
            };
            receipt = adapter.send_options(recipient, &chunk_text, chunk).await?;
            if index + 1 < total_chunks {
                tokio::time::sleep(pacing).await;
            }
        }
        Ok(receipt)
    }

    /// Deliver a batch of payloads on one channel, paced to stay under the
    /// channel's configured messages-per-minute so bulk traffic does not
    /// starve interactive sends.
    pub async fn deliver_batch(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        items: &[(String, OutboundPayload)],
    ) -> Vec<DeliveryResult> {
        let quota = self.quota_for(channel);
        let pacing = Duration::from_secs_f64(60.0 / f64::from(quota.rate_limit_per_minute.max(1)));
        let total_groups = items.len().div_ceil(quota.batch_size.max(1));
        let mut results = Vec::with_capacity(items.len());

        for (group_index, group) in items.chunks(quota.batch_size.max(1)).enumerate() {
            let ctx = DeliveryContext::bulk();
            debug!(
                %channel,
                correlation_id = %ctx.correlation_id,
                group = group_index + 1,
                total_groups,
                "delivering batch group"
            );
            for (recipient, payload) in group {
                results.push(self.deliver(channel, tenant, recipient, payload, &ctx).await);
            }
            if group_index + 1 < total_groups {
                tokio::time::sleep(pacing).await;
            }
        }

        results
    }
}

/// Exponential backoff with ±12% jitter, capped at [`MAX_BACKOFF`].
fn backoff_delay(base_secs: u64, attempt: u32) -> Duration {
    let base = base_secs.max(1) as f64;
    let exp = base * 2f64.powi(attempt.saturating_sub(1) as i32);
    let jitter = rand::thread_rng().gen_range(0.88..=1.12);
    Duration::from_secs_f64((exp * jitter).min(MAX_BACKOFF.as_secs_f64()))
}
