//! Retry policy
//!
//! Exponential backoff with a hard attempt ceiling. Retry `n` (0-based)
//! waits `min(base * 2^n, max)` plus an optional jitter drawn from a seeded
//! generator, so the same configuration always yields the same delays.

use leadforge_common::config::RetryConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Jitter seed used when none is configured
pub const DEFAULT_JITTER_SEED: u64 = 0x1ead_f0e9;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
    jitter_seed: u64,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try and is at least 1
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: Duration::ZERO,
            jitter_seed: DEFAULT_JITTER_SEED,
        }
    }

    /// Add up to `jitter` of extra delay per retry
    pub fn with_jitter(mut self, jitter: Duration, seed: u64) -> Self {
        self.jitter = jitter;
        self.jitter_seed = seed;
        self
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
        .with_jitter(
            Duration::from_millis(config.jitter_ms),
            config.jitter_seed.unwrap_or(DEFAULT_JITTER_SEED),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before retry `retry` (0 = first retry), without jitter
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Fresh jitter source; one per guarded source
    pub fn jitter_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.jitter_seed)
    }

    /// Backoff plus bounded jitter
    pub fn delay_with_jitter(&self, retry: u32, rng: &mut StdRng) -> Duration {
        let delay = self.backoff_delay(retry);
        if self.jitter.is_zero() {
            return delay;
        }
        let jitter_ms = rng.gen_range(0..=self.jitter.as_millis() as u64);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
