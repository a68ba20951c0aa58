//! Per-domain rate limiting with exponential backoff
//!
//! Each domain gets its own pacing state: a current delay that starts at a
//! randomized sample from the configured base range, doubles (up to a
//! ceiling) every time the domain throttles us, and resets to a fresh base
//! sample after a success. A task that is still throttled after the retry
//! budget terminates with a `ThrottleExhausted` outcome instead of retrying
//! forever, so a single hostile domain cannot monopolize the crawl.

use crate::config::RateLimiterConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// What a worker should do after a throttling response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Wait for the (now doubled) delay and retry the fetch
    Backoff,
    /// The retry budget is spent; give up on this task
    Exhausted,
}

/// Per-domain pacing state
#[derive(Debug, Clone)]
struct DomainPacing {
    current_delay: Duration,
    consecutive_throttles: u32,
    retries_used: u32,
}

/// Shared rate limiter, keyed by domain
///
/// The pacing map is guarded by a mutex; the lock is held only for state
/// updates, never across a sleep.
pub struct RateLimiter {
    config: RateLimiterConfig,
    pacing: Mutex<HashMap<String, DomainPacing>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            pacing: Mutex::new(HashMap::new()),
        }
    }

    /// Samples a fresh delay from the configured base range
    ///
    /// Randomizing within the range keeps independently-created domain
    /// entries from synchronizing their request times.
    fn sample_base_delay(&self) -> Duration {
        let (min, max) = self.config.base_delay_ms;
        let ms = if min == max {
            min
        } else {
            rand::random_range(min..=max)
        };
        Duration::from_millis(ms)
    }

    /// Waits out the current delay for a domain before a fetch
    ///
    /// A domain seen for the first time gets a base-range sample. Returns
    /// the delay that was applied.
    pub async fn wait_for(&self, domain: &str) -> Duration {
        let delay = {
            let mut pacing = self.pacing.lock().unwrap();
            let entry = pacing
                .entry(domain.to_string())
                .or_insert_with(|| DomainPacing {
                    current_delay: self.sample_base_delay(),
                    consecutive_throttles: 0,
                    retries_used: 0,
                });
            entry.current_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        delay
    }

    /// Records a throttling signal (HTTP 429 or equivalent) for a domain
    ///
    /// Doubles the domain's delay, bounded by the configured ceiling. Once
    /// the retry budget is spent the pacing entry is reset, so future
    /// unrelated tasks for the domain start over from the base range.
    pub fn record_throttle(&self, domain: &str) -> ThrottleDecision {
        let mut pacing = self.pacing.lock().unwrap();
        let entry = pacing
            .entry(domain.to_string())
            .or_insert_with(|| DomainPacing {
                current_delay: self.sample_base_delay(),
                consecutive_throttles: 0,
                retries_used: 0,
            });

        entry.consecutive_throttles += 1;
        let max_delay = Duration::from_millis(self.config.max_delay_ms);
        entry.current_delay = (entry.current_delay * 2).min(max_delay);

        if entry.retries_used >= self.config.max_retries {
            let base = self.sample_base_delay();
            *entry = DomainPacing {
                current_delay: base,
                consecutive_throttles: 0,
                retries_used: 0,
            };
            ThrottleDecision::Exhausted
        } else {
            entry.retries_used += 1;
            ThrottleDecision::Backoff
        }
    }

    /// Records a successful fetch: the domain's pacing resets to base
    pub fn record_success(&self, domain: &str) {
        let mut pacing = self.pacing.lock().unwrap();
        if let Some(entry) = pacing.get_mut(domain) {
            entry.current_delay = self.sample_base_delay();
            entry.consecutive_throttles = 0;
            entry.retries_used = 0;
        }
    }

    /// Returns (current delay, consecutive throttles) for a domain, if seen
    pub fn domain_state(&self, domain: &str) -> Option<(Duration, u32)> {
        let pacing = self.pacing.lock().unwrap();
        pacing
            .get(domain)
            .map(|e| (e.current_delay, e.consecutive_throttles))
    }
}
