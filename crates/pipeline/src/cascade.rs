//! Cascade orchestrator
//!
//! Walks the configured sources in priority order and stops as soon as the
//! requested number of raw records is in hand. Sources run sequentially:
//! a later source is only consulted when the earlier ones came up short.
//!
//! State machine per request:
//! `Pending -> Running(i) -> { Running(i+1) | Accumulating | Done }`

use crate::guard::SourceGuard;
use leadforge_common::{CancelFlag, FailureKind, RawRecord, SearchRequest, SourceTag};
use serde::Serialize;
use tracing::{info, warn};

/// Why a cascade stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    /// Enough records accumulated; remaining sources were skipped
    LimitReached,
    /// Every source was tried
    SourcesExhausted,
    /// Cancellation observed at a step boundary
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeState {
    Pending,
    Running { index: usize },
    Accumulating { after: usize },
    Done(DoneReason),
}

/// A raw record with the tag of the source that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedRecord {
    pub record: RawRecord,
    pub source: SourceTag,
}

/// Terminal outcome of one source within a cascade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceAttempt {
    pub source: SourceTag,
    /// Records asked for (what was still missing)
    pub requested: usize,
    pub attempts: u32,
    /// Records accepted from this source
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug)]
pub struct CascadeResult {
    pub records: Vec<SourcedRecord>,
    pub attempts: Vec<SourceAttempt>,
    pub reason: DoneReason,
}

/// Ordered list of guarded sources
pub struct CascadeOrchestrator {
    guards: Vec<SourceGuard>,
}

impl CascadeOrchestrator {
    pub fn new(guards: Vec<SourceGuard>) -> Self {
        Self { guards }
    }

    /// Source tags in cascade order
    pub fn sources(&self) -> Vec<SourceTag> {
        self.guards.iter().map(SourceGuard::source).collect()
    }

    /// Run a fresh cascade for one request
    pub async fn run(&self, request: &SearchRequest, cancel: &CancelFlag) -> CascadeResult {
        let mut run = CascadeRun {
            guards: &self.guards,
            request,
            state: CascadeState::Pending,
            records: Vec::new(),
            attempts: Vec::new(),
        };

        let reason = loop {
            match run.state {
                CascadeState::Done(reason) => break reason,
                _ => run.step(cancel).await,
            }
        };

        CascadeResult {
            records: run.records,
            attempts: run.attempts,
            reason,
        }
    }
}

struct CascadeRun<'a> {
    guards: &'a [SourceGuard],
    request: &'a SearchRequest,
    state: CascadeState,
    records: Vec<SourcedRecord>,
    attempts: Vec<SourceAttempt>,
}

impl CascadeRun<'_> {
    async fn step(&mut self, cancel: &CancelFlag) {
        let state = self.state;
        self.state = match state {
            CascadeState::Pending => self.start_at(0),
            CascadeState::Running { index } => {
                if cancel.is_cancelled() {
                    info!(remaining = self.guards.len() - index, "Cascade cancelled");
                    CascadeState::Done(DoneReason::Cancelled)
                } else {
                    self.invoke(index).await
                }
            }
            CascadeState::Accumulating { after } => self.start_at(after + 1),
            done @ CascadeState::Done(_) => done,
        };
    }

    fn start_at(&self, index: usize) -> CascadeState {
        if index < self.guards.len() {
            CascadeState::Running { index }
        } else {
            CascadeState::Done(DoneReason::SourcesExhausted)
        }
    }

    async fn invoke(&mut self, index: usize) -> CascadeState {
        let guard = &self.guards[index];
        let requested = self.request.limit.saturating_sub(self.records.len());

        let report = guard
            .call_with_policy(&self.request.keyword, self.request.location.as_deref(), requested)
            .await;

        match report.outcome {
            Ok(records) => {
                let accepted = records.len().min(requested);
                info!(
                    source = %report.source,
                    outcome = "success",
                    records = accepted,
                    attempts = report.attempts,
                    "adapter outcome"
                );
                self.records.extend(records.into_iter().take(requested).map(|record| SourcedRecord {
                    record,
                    source: report.source.clone(),
                }));
                self.attempts.push(SourceAttempt {
                    source: report.source,
                    requested,
                    attempts: report.attempts,
                    records: accepted,
                    failure: None,
                    message: None,
                });

                if self.records.len() >= self.request.limit {
                    CascadeState::Done(DoneReason::LimitReached)
                } else {
                    CascadeState::Accumulating { after: index }
                }
            }
            Err(err) => {
                warn!(
                    source = %report.source,
                    outcome = %err.kind,
                    records = 0,
                    attempts = report.attempts,
                    error = %err.message,
                    "adapter outcome"
                );
                self.attempts.push(SourceAttempt {
                    source: report.source,
                    requested,
                    attempts: report.attempts,
                    records: 0,
                    failure: Some(err.kind),
                    message: Some(err.message),
                });
                self.start_at(index + 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use leadforge_sources::MockAdapter;
    use std::sync::Arc;
    use std::time::Duration;

    fn guard(adapter: Arc<MockAdapter>) -> SourceGuard {
        SourceGuard::new(adapter, RetryPolicy::new(1, Duration::ZERO, Duration::ZERO), Duration::ZERO)
    }

    fn request(limit: usize) -> SearchRequest {
        SearchRequest::new("dentists", Some("Miami"), limit).unwrap()
    }

    #[tokio::test]
    async fn test_asks_later_sources_only_for_the_shortfall() {
        let a = Arc::new(MockAdapter::numbered("a", 3));
        let b = Arc::new(MockAdapter::numbered("b", 10));
        let cascade = CascadeOrchestrator::new(vec![guard(a.clone()), guard(b.clone())]);

        let result = cascade.run(&request(5), &CancelFlag::new()).await;
        assert_eq!(result.reason, DoneReason::LimitReached);
        assert_eq!(result.records.len(), 5);
        assert_eq!(a.requested_limits(), vec![5]);
        assert_eq!(b.requested_limits(), vec![2]);
        assert_eq!(result.records[3].source, SourceTag::new("b"));
    }

    #[tokio::test]
    async fn test_unavailable_source_is_skipped() {
        let a = Arc::new(MockAdapter::failing("a", FailureKind::Blocked));
        let b = Arc::new(MockAdapter::numbered("b", 2));
        let cascade = CascadeOrchestrator::new(vec![guard(a), guard(b)]);

        let result = cascade.run(&request(5), &CancelFlag::new()).await;
        assert_eq!(result.reason, DoneReason::SourcesExhausted);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.attempts[0].failure, Some(FailureKind::Blocked));
        assert_eq!(result.attempts[1].records, 2);
    }

    #[tokio::test]
    async fn test_no_sources_is_exhausted_not_error() {
        let cascade = CascadeOrchestrator::new(Vec::new());
        let result = cascade.run(&request(5), &CancelFlag::new()).await;
        assert_eq!(result.reason, DoneReason::SourcesExhausted);
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_source() {
        let a = Arc::new(MockAdapter::numbered("a", 3));
        let cascade = CascadeOrchestrator::new(vec![guard(a.clone())]);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = cascade.run(&request(5), &cancel).await;
        assert_eq!(result.reason, DoneReason::Cancelled);
        assert_eq!(a.calls(), 0);
    }
}
