//! Source guard: the single entry point for calling an adapter
//!
//! Wraps one adapter with its spacing, hourly budget and retry policy.
//! Calls through the same guard are serialized (single-flight), and every
//! failure comes back as a typed outcome rather than an `Err`.

use crate::limiter::{create_budget, Pacer, SourceBudget};
use crate::retry::RetryPolicy;
use leadforge_common::{metrics, AppConfig, SourceTag, SourceUnavailable};
use leadforge_sources::{FetchResult, SourceAdapter};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// What happened when a source was called
#[derive(Debug)]
pub struct CallReport {
    pub source: SourceTag,
    /// Fetch attempts actually made (0 when the budget refused the call)
    pub attempts: u32,
    /// Backoff delays slept between attempts
    pub delays: Vec<Duration>,
    pub outcome: FetchResult,
}

struct GuardState {
    pacer: Pacer,
    rng: StdRng,
}

pub struct SourceGuard {
    adapter: Arc<dyn SourceAdapter>,
    policy: RetryPolicy,
    budget: Option<SourceBudget>,
    state: Mutex<GuardState>,
}

impl SourceGuard {
    pub fn new(adapter: Arc<dyn SourceAdapter>, policy: RetryPolicy, min_interval: Duration) -> Self {
        let rng = policy.jitter_rng();
        Self {
            adapter,
            policy,
            budget: None,
            state: Mutex::new(GuardState {
                pacer: Pacer::new(min_interval),
                rng,
            }),
        }
    }

    /// Cap requests per hour (0 disables the cap)
    pub fn with_hourly_budget(mut self, requests_per_hour: u32) -> Self {
        self.budget = create_budget(requests_per_hour);
        self
    }

    /// Guard configured from the adapter's `sources.<name>` section.
    /// Sources without a section get the global retry policy and no spacing.
    pub fn from_config(adapter: Arc<dyn SourceAdapter>, config: &AppConfig) -> Self {
        let name = adapter.tag();
        let policy = RetryPolicy::from_config(&config.retry_policy_for(name.as_str()));

        match config.sources.get(name.as_str()) {
            Some(source) => Self::new(adapter, policy, source.min_interval())
                .with_hourly_budget(source.hourly_limit.unwrap_or(0)),
            None => Self::new(adapter, policy, Duration::ZERO),
        }
    }

    pub fn source(&self) -> SourceTag {
        self.adapter.tag()
    }

    /// Call the adapter under spacing, budget and retry rules.
    ///
    /// Transient failures are retried with backoff up to the attempt
    /// ceiling; `Blocked` and `MalformedResponse` end the call at once.
    /// The result never holds more than `limit` records.
    pub async fn call_with_policy(
        &self,
        keyword: &str,
        location: Option<&str>,
        limit: usize,
    ) -> CallReport {
        let source = self.adapter.tag();
        let started = Instant::now();
        let mut state = self.state.lock().await;
        let mut delays = Vec::new();
        let mut attempts = 0;

        let outcome = loop {
            if self.budget.as_ref().is_some_and(|b| b.check().is_err()) {
                warn!(source = %source, "Hourly request budget exhausted");
                break Err(SourceUnavailable::rate_limited(
                    source.clone(),
                    "hourly request budget exhausted",
                ));
            }

            state.pacer.wait_turn().await;
            attempts += 1;
            info!(source = %source, attempt = attempts, requested = limit, "adapter attempted");

            let result = self.adapter.fetch(keyword, location, limit).await;
            state.pacer.mark();

            match result {
                Ok(mut records) => {
                    records.truncate(limit);
                    break Ok(records);
                }
                Err(err) if err.is_transient() && attempts < self.policy.max_attempts() => {
                    let delay = self.policy.delay_with_jitter(attempts - 1, &mut state.rng);
                    warn!(
                        source = %source,
                        attempt = attempts,
                        kind = %err.kind,
                        delay_ms = delay.as_millis() as u64,
                        "Transient source failure, backing off"
                    );
                    metrics::record_retry(source.as_str(), err.kind);
                    delays.push(delay);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => break Err(err),
            }
        };
        drop(state);

        metrics::record_source_call(
            source.as_str(),
            outcome.as_ref().err().map(|e| e.kind),
            outcome.as_ref().map(Vec::len).unwrap_or(0),
            started.elapsed().as_secs_f64(),
        );

        CallReport {
            source,
            attempts,
            delays,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadforge_common::{FailureKind, RawRecord};
    use leadforge_sources::{MockAdapter, MockStep};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let adapter = Arc::new(MockAdapter::scripted(
            "geo",
            vec![
                MockStep::Fail(FailureKind::RateLimited),
                MockStep::Records(vec![RawRecord::named("A")]),
            ],
        ));
        let guard = SourceGuard::new(adapter.clone(), policy(), Duration::ZERO);

        let report = guard.call_with_policy("dentists", Some("Miami"), 5).await;
        assert_eq!(report.attempts, 2);
        assert_eq!(report.delays, vec![Duration::from_millis(100)]);
        assert_eq!(report.outcome.unwrap().len(), 1);
        assert_eq!(adapter.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let adapter = Arc::new(MockAdapter::failing("geo", FailureKind::ServerError));
        let guard = SourceGuard::new(adapter.clone(), policy(), Duration::ZERO);

        let report = guard.call_with_policy("dentists", None, 5).await;
        assert_eq!(report.attempts, 3);
        assert_eq!(
            report.delays,
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
        assert_eq!(report.outcome.unwrap_err().kind, FailureKind::ServerError);
    }

    #[tokio::test]
    async fn test_malformed_fails_fast() {
        let adapter = Arc::new(MockAdapter::failing("dir", FailureKind::MalformedResponse));
        let guard = SourceGuard::new(adapter.clone(), policy(), Duration::ZERO);

        let report = guard.call_with_policy("dentists", None, 5).await;
        assert_eq!(report.attempts, 1);
        assert!(report.delays.is_empty());
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_skips_network() {
        let adapter = Arc::new(MockAdapter::numbered("dir", 2));
        let guard = SourceGuard::new(adapter.clone(), policy(), Duration::ZERO).with_hourly_budget(1);

        assert!(guard.call_with_policy("a", None, 5).await.outcome.is_ok());

        let report = guard.call_with_policy("b", None, 5).await;
        assert_eq!(report.attempts, 0);
        assert_eq!(report.outcome.unwrap_err().kind, FailureKind::RateLimited);
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_between_calls() {
        let adapter = Arc::new(MockAdapter::numbered("web", 1));
        let guard = SourceGuard::new(adapter, policy(), Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        guard.call_with_policy("a", None, 1).await;
        guard.call_with_policy("b", None, 1).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_truncates_to_limit() {
        let adapter = Arc::new(MockAdapter::numbered("dir", 4));
        let guard = SourceGuard::new(adapter, policy(), Duration::ZERO);
        let report = guard.call_with_policy("a", None, 2).await;
        assert_eq!(report.outcome.unwrap().len(), 2);
    }
}
