//! Per-source rate limiting
//!
//! - `Pacer`: minimum spacing between two calls to the same source
//! - `SourceBudget`: hourly request budget (token bucket via governor)
//!
//! The pacer measures from the end of the previous call, not from its
//! admission as a GCRA quota would, and runs on tokio's clock so paused
//! test time drives it. The budget only counts admissions, so governor's
//! own clock is fine there.

use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;

/// Hourly request budget for one source
pub type SourceBudget = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create an hourly budget; `None` for 0 (unlimited)
pub fn create_budget(requests_per_hour: u32) -> Option<SourceBudget> {
    NonZeroU32::new(requests_per_hour).map(|n| RateLimiter::direct(Quota::per_hour(n)))
}

/// Enforces a minimum interval between calls
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// Sleep until the next call is allowed; returns the time waited
    pub async fn wait_turn(&self) -> Duration {
        let Some(last) = self.last_call else {
            return Duration::ZERO;
        };
        let ready_at = last + self.min_interval;
        let now = Instant::now();
        if ready_at <= now {
            return Duration::ZERO;
        }
        tokio::time::sleep_until(ready_at).await;
        ready_at - now
    }

    /// Record that a call just finished
    pub fn mark(&mut self) {
        self.last_call = Some(Instant::now());
    }
}
