//! Per-client sliding-window rate limiting
//!
//! Each client keeps the timestamps of its admitted requests inside the
//! trailing window. A request is admitted while fewer than `max_requests`
//! timestamps are newer than `now - window`. Denied requests are not
//! recorded, so hammering a closed window does not extend it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Window shape; identical for every client
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self { window: Duration::from_secs(60), max_requests: 100 }
    }
}

impl From<&crate::config::RateLimitConfig> for RateLimitPolicy {
    fn from(config: &crate::config::RateLimitConfig) -> Self {
        Self { window: config.window(), max_requests: config.max_requests }
    }
}

/// Verdict for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed { limit: u32, remaining: u32 },
    Denied { limit: u32, retry_after_secs: u64, reset_at: DateTime<Utc> },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Statistics for monitoring
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub tracked_clients: usize,
    pub total_requests: usize,
    pub window_ms: u64,
    pub max_requests: u32,
}

/// Sliding-window log limiter keyed by client identity
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self { policy, windows: RwLock::new(HashMap::new()) }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Admit or deny a request from `client_id` now
    pub async fn admit(&self, client_id: &str) -> Admission {
        self.admit_at(client_id, Instant::now()).await
    }

    /// Admit or deny a request from `client_id` at `now`
    pub async fn admit_at(&self, client_id: &str, now: Instant) -> Admission {
        let limit = self.policy.max_requests;
        let mut windows = self.windows.write().await;
        let timestamps = windows.entry(client_id.to_string()).or_default();

        Self::prune(timestamps, now, self.policy.window);

        if timestamps.len() < limit as usize {
            timestamps.push_back(now);
            return Admission::Allowed { limit, remaining: limit - timestamps.len() as u32 };
        }

        // Full window: the oldest timestamp decides when a slot frees up
        let wait = timestamps
            .front()
            .and_then(|oldest| oldest.checked_add(self.policy.window))
            .map_or(self.policy.window, |frees_at| frees_at.saturating_duration_since(now));
        let retry_after_secs = ceil_secs(wait).max(1);

        log::warn!("🚫 Rate limit exceeded for {} (retry in {}s)", client_id, retry_after_secs);

        Admission::Denied {
            limit,
            retry_after_secs,
            reset_at: chrono::Duration::from_std(wait)
                .ok()
                .and_then(|wait| Utc::now().checked_add_signed(wait))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Drop clients whose timestamps are all outside the window.
    ///
    /// Returns the number of clients removed.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, timestamps| {
            Self::prune(timestamps, now, self.policy.window);
            !timestamps.is_empty()
        });
        before - windows.len()
    }

    pub async fn stats(&self) -> RateLimitStats {
        let windows = self.windows.read().await;
        RateLimitStats {
            tracked_clients: windows.len(),
            total_requests: windows.values().map(VecDeque::len).sum(),
            window_ms: self.policy.window.as_millis() as u64,
            max_requests: self.policy.max_requests,
        }
    }

    fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = timestamps.front() {
            if now.saturating_duration_since(*oldest) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
