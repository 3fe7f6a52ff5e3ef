//! Lead pipeline facade
//!
//! Query parsing, the source cascade and reconciliation wired together.
//! One `LeadPipeline` owns one set of guarded adapters; each request (or
//! each query of a batch) gets its own fresh cascade run.

use crate::cascade::{CascadeOrchestrator, DoneReason, SourceAttempt};
use crate::guard::SourceGuard;
use crate::reconcile::DedupIndex;
use chrono::{DateTime, Utc};
use leadforge_common::{
    metrics, AppConfig, AppError, CancelFlag, NormalizedRecord, QueryParser, Result, SearchRequest, SourceTag,
};
use leadforge_sources::build_adapters;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// How a pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Finished normally with at least one record
    Complete,
    /// Every source was tried and nothing came back
    AllSourcesExhausted,
    /// Stopped early by the cancellation flag
    Cancelled,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Complete => "complete",
            PipelineStatus::AllSourcesExhausted => "all_sources_exhausted",
            PipelineStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    /// Requests executed, in order (one for a single search)
    pub requests: Vec<SearchRequest>,
    pub records: Vec<NormalizedRecord>,
    pub status: PipelineStatus,
    /// Terminal outcome of every adapter call
    pub attempts: Vec<SourceAttempt>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineOutcome {
    /// Zero records is an answer, not an error
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct LeadPipeline {
    parser: QueryParser,
    orchestrator: CascadeOrchestrator,
    default_limit: usize,
    max_limit: usize,
}

impl LeadPipeline {
    pub fn new(guards: Vec<SourceGuard>, default_limit: usize, max_limit: usize) -> Self {
        Self {
            parser: QueryParser::default(),
            orchestrator: CascadeOrchestrator::new(guards),
            default_limit,
            max_limit,
        }
    }

    /// Build adapters in configured order and guard each one
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let guards = build_adapters(&config.sources, &config.acquisition.user_agent)?
            .into_iter()
            .map(|adapter| SourceGuard::from_config(adapter, config))
            .collect::<Vec<_>>();

        info!(
            sources = ?guards.iter().map(SourceGuard::source).map(|s| s.to_string()).collect::<Vec<_>>(),
            "Pipeline ready"
        );

        Ok(Self::new(
            guards,
            config.acquisition.default_limit,
            config.acquisition.max_limit,
        ))
    }

    pub fn sources(&self) -> Vec<SourceTag> {
        self.orchestrator.sources()
    }

    /// Parse a free-form query and run it.
    ///
    /// Fails only for structurally invalid input (empty keyword, bad
    /// limit); source failures end up in `attempts`.
    pub async fn run(
        &self,
        query: &str,
        location: Option<&str>,
        limit: Option<usize>,
        cancel: &CancelFlag,
    ) -> Result<PipelineOutcome> {
        let request = self.prepare(query, location, limit)?;
        Ok(self.execute(Uuid::new_v4(), vec![request], cancel).await)
    }

    /// Run an already-built request
    pub async fn run_request(&self, request: SearchRequest, cancel: &CancelFlag) -> Result<PipelineOutcome> {
        self.check_limit(request.limit)?;
        Ok(self.execute(Uuid::new_v4(), vec![request], cancel).await)
    }

    /// Run several queries sharing one location and limit.
    ///
    /// All queries are validated before any source is called. Duplicates
    /// across queries are merged; each record keeps the metadata of the
    /// query that first produced it.
    pub async fn run_batch<S: AsRef<str>>(
        &self,
        queries: &[S],
        location: Option<&str>,
        limit: Option<usize>,
        cancel: &CancelFlag,
    ) -> Result<PipelineOutcome> {
        let requests = queries
            .iter()
            .map(|query| self.prepare(query.as_ref(), location, limit))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.execute(Uuid::new_v4(), requests, cancel).await)
    }

    fn prepare(&self, query: &str, location: Option<&str>, limit: Option<usize>) -> Result<SearchRequest> {
        let limit = limit.unwrap_or(self.default_limit);
        self.check_limit(limit)?;
        self.parser.parse(query, location)?.into_request(limit)
    }

    fn check_limit(&self, limit: usize) -> Result<()> {
        if limit == 0 || limit > self.max_limit {
            return Err(AppError::InvalidLimit {
                limit,
                max: self.max_limit,
            });
        }
        Ok(())
    }

    #[instrument(skip_all, fields(run_id = %run_id, queries = requests.len()))]
    async fn execute(&self, run_id: Uuid, requests: Vec<SearchRequest>, cancel: &CancelFlag) -> PipelineOutcome {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut index = DedupIndex::new();
        let mut attempts = Vec::new();
        let mut cancelled = false;

        for request in &requests {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let cascade = self.orchestrator.run(request, cancel).await;
            let raw = cascade.records.len();
            attempts.extend(cascade.attempts);
            let added = index.absorb(cascade.records, request);

            info!(
                keyword = %request.keyword,
                raw_records = raw,
                added,
                reason = ?cascade.reason,
                "Cascade finished"
            );

            if cascade.reason == DoneReason::Cancelled {
                cancelled = true;
                break;
            }
        }

        let records = index.into_records();
        let status = if cancelled {
            PipelineStatus::Cancelled
        } else if records.is_empty() {
            PipelineStatus::AllSourcesExhausted
        } else {
            PipelineStatus::Complete
        };

        if status == PipelineStatus::AllSourcesExhausted {
            warn!(sources = attempts.len(), "All sources exhausted with no results");
        }
        info!(records = records.len(), status = status.as_str(), "final count");
        metrics::record_pipeline(status.as_str(), started.elapsed().as_secs_f64(), records.len());

        PipelineOutcome {
            run_id,
            requests,
            records,
            status,
            attempts,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
