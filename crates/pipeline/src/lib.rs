//! LeadForge pipeline
//!
//! Turns a search query into a deduplicated list of business listings:
//! - `SourceGuard`: spacing, hourly budget and retry around one adapter
//! - `CascadeOrchestrator`: ordered, short-circuiting walk over sources
//! - `Reconciler` / `DedupIndex`: metadata stamping and deduplication
//! - `LeadPipeline`: parser, cascade and reconciler behind one call

pub mod cascade;
pub mod guard;
pub mod limiter;
pub mod pipeline;
pub mod reconcile;
pub mod retry;

pub use cascade::{CascadeOrchestrator, CascadeResult, CascadeState, DoneReason, SourceAttempt, SourcedRecord};
pub use guard::{CallReport, SourceGuard};
pub use pipeline::{LeadPipeline, PipelineOutcome, PipelineStatus};
pub use reconcile::{DedupIndex, Reconciler};
pub use retry::RetryPolicy;
