//! Rate-limit gate for the GitHub API.
//!
//! The gate caches the last known quota, refreshes it when nothing is cached,
//! and suspends callers until the reset time once the remaining quota drops to
//! [`MIN_REMAINING_THRESHOLD`] or below.

use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Remaining requests at or below which the gate waits for the reset.
pub const MIN_REMAINING_THRESHOLD: u32 = 5;

/// Resource name GitHub reports for the regular REST quota.
pub const CORE_RESOURCE: &str = "core";

/// Maximum time to wait for a rate limit reset (1 hour).
const MAX_WAIT: Duration = Duration::from_secs(3600);

/// Source of wall-clock time, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Quota snapshot as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitState {
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp (seconds) when the window resets.
    pub reset: u64,
    #[serde(default)]
    pub used: u32,
}

impl RateLimitState {
    /// Reads the `x-ratelimit-*` headers GitHub attaches to every response.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let get = |name: &str| -> Option<u64> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
        };

        Some(Self {
            limit: get("x-ratelimit-limit")? as u32,
            remaining: get("x-ratelimit-remaining")? as u32,
            reset: get("x-ratelimit-reset")?,
            used: get("x-ratelimit-used").unwrap_or(0) as u32,
        })
    }

    /// Like [`from_headers`](Self::from_headers), but only for responses
    /// billed to the core quota. Search and other resources have their own
    /// windows and must not drive the gate.
    pub fn core_from_headers(headers: &HeaderMap) -> Option<Self> {
        let resource = headers
            .get("x-ratelimit-resource")
            .and_then(|v| v.to_str().ok())
            .map(str::trim);
        match resource {
            None | Some(CORE_RESOURCE) => Self::from_headers(headers),
            Some(_) => None,
        }
    }
}

/// How long to wait before the next request, if at all.
pub fn wait_duration(state: &RateLimitState, now_millis: u64) -> Option<Duration> {
    if state.remaining > MIN_REMAINING_THRESHOLD {
        return None;
    }

    let reset_millis = state.reset.saturating_mul(1000);
    if reset_millis <= now_millis {
        return None;
    }

    let wait = Duration::from_millis(reset_millis - now_millis);
    if wait > MAX_WAIT {
        warn!(
            wait_secs = wait.as_secs(),
            max_wait_secs = MAX_WAIT.as_secs(),
            "Rate limit reset too far in future, capping wait time"
        );
        return Some(MAX_WAIT);
    }
    Some(wait)
}

/// Process-scoped quota state shared by the requests of one GitHub client.
///
/// The lock is held across refreshes and waits, so callers sharing a gate
/// are serialized through it.
pub struct RateLimitGate {
    state: Mutex<Option<RateLimitState>>,
    clock: Arc<dyn Clock>,
}

impl RateLimitGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(None),
            clock,
        }
    }

    pub fn with_state(state: RateLimitState, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            clock,
        }
    }

    pub async fn current(&self) -> Option<RateLimitState> {
        *self.state.lock().await
    }

    pub async fn record(&self, state: RateLimitState) {
        *self.state.lock().await = Some(state);
    }

    /// Waits until the quota allows another request.
    ///
    /// `refresh` is called when no state is cached, or always when
    /// `force_refresh` is set. A refresh yielding `None` keeps the previous
    /// state. Returns the time spent waiting.
    pub async fn pass<F, Fut>(&self, force_refresh: bool, refresh: F) -> Duration
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<RateLimitState>>,
    {
        let mut guard = self.state.lock().await;

        if (force_refresh || guard.is_none())
            && let Some(fresh) = refresh().await
        {
            *guard = Some(fresh);
        }

        let Some(state) = *guard else {
            return Duration::ZERO;
        };

        match wait_duration(&state, self.clock.now_millis()) {
            Some(wait) => {
                info!(
                    remaining = state.remaining,
                    wait_secs = wait.as_secs(),
                    "Rate limit low, waiting for reset"
                );
                tokio::time::sleep(wait).await;
                wait
            }
            None => Duration::ZERO,
        }
    }
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
