//! Per-channel fixed-window rate limiting.
//!
//! One [`RateBucket`] per channel, all guarded by a single mutex — the
//! critical section is O(1), so contention across channels is acceptable
//! and per-channel counts stay consistent under concurrent callers.
//!
//! Unknown channels always pass ("fail open"): a misconfigured channel must
//! never silently block delivery.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use herald_types::{ChannelId, ChannelQuota};

/// Default polling interval for [`RateLimiter::wait_until_allowed`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Quota slice the limiter needs per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowQuota {
    /// Maximum sends approved within one window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl From<&ChannelQuota> for WindowQuota {
    fn from(quota: &ChannelQuota) -> Self {
        Self {
            max_requests: quota.max_requests_per_window,
            window: Duration::from_secs(quota.window_seconds),
        }
    }
}

/// Runtime counter for one channel's current window.
#[derive(Debug)]
struct RateBucket {
    count_in_window: u32,
    window_started_at: Instant,
}

/// Fixed-window rate limiter keyed by channel id.
pub struct RateLimiter {
    quotas: RwLock<HashMap<ChannelId, WindowQuota>>,
    buckets: Mutex<HashMap<ChannelId, RateBucket>>,
    poll_interval: Duration,
}

impl RateLimiter {
    /// Create a limiter with the given per-channel quotas.
    pub fn new(quotas: HashMap<ChannelId, WindowQuota>) -> Self {
        Self {
            quotas: RwLock::new(quotas),
            buckets: Mutex::new(HashMap::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create a limiter from full channel quota configuration.
    pub fn from_config<'a>(
        channels: impl IntoIterator<Item = (&'a String, &'a ChannelQuota)>,
    ) -> Self {
        let quotas = channels
            .into_iter()
            .map(|(id, quota)| (ChannelId::new(id.as_str()), WindowQuota::from(quota)))
            .collect();
        Self::new(quotas)
    }

    /// Override the polling interval used by `wait_until_allowed`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Install or replace the quota for a channel (hot reload).
    pub fn set_quota(&self, channel: impl Into<ChannelId>, quota: WindowQuota) {
        self.quotas
            .write()
            .expect("quota table poisoned")
            .insert(channel.into(), quota);
    }

    /// Drop the quota for a channel; it becomes unlimited (fail open).
    pub fn remove_quota(&self, channel: &ChannelId) {
        self.quotas
            .write()
            .expect("quota table poisoned")
            .remove(channel);
    }

    /// Try to take one send slot for a channel.
    ///
    /// Resets the window if it has elapsed, then approves and counts the
    /// send if capacity remains. Unknown channels are always approved.
    pub fn allow(&self, channel: &ChannelId) -> bool {
        let quota = {
            let quotas = self.quotas.read().expect("quota table poisoned");
            match quotas.get(channel) {
                Some(quota) => *quota,
                None => {
                    debug!(%channel, "no quota configured; failing open");
                    return true;
                }
            }
        };

        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("rate buckets poisoned");
        let bucket = buckets.entry(channel.clone()).or_insert(RateBucket {
            count_in_window: 0,
            window_started_at: now,
        });

        if now.duration_since(bucket.window_started_at) > quota.window {
            bucket.count_in_window = 0;
            bucket.window_started_at = now;
        }

        if bucket.count_in_window < quota.max_requests {
            bucket.count_in_window += 1;
            true
        } else {
            warn!(
                %channel,
                count = bucket.count_in_window,
                limit = quota.max_requests,
                "channel quota exceeded"
            );
            false
        }
    }

    /// Suspend the calling task until a send slot is available.
    ///
    /// Polls [`allow`](Self::allow) at the configured interval instead of
    /// busy-spinning; only the calling task sleeps, so an over-quota channel
    /// cannot starve deliveries on other channels.
    pub async fn wait_until_allowed(&self, channel: &ChannelId) {
        loop {
            if self.allow(channel) {
                return;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Current count in the channel's window, for diagnostics.
    pub fn current_count(&self, channel: &ChannelId) -> u32 {
        self.buckets
            .lock()
            .expect("rate buckets poisoned")
            .get(channel)
            .map(|b| b.count_in_window)
            .unwrap_or(0)
    }
}
