//! LeadForge Common Library
//!
//! Shared code for the acquisition crates including:
//! - Listing record types and search metadata
//! - Query parsing and location normalization
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability
//! - Cooperative cancellation

pub mod cancel;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod query;
pub mod records;

// Re-export commonly used types
pub use cancel::CancelFlag;
pub use config::{AppConfig, Secret, SourceConfig, SourcesConfig};
pub use errors::{AppError, FailureKind, Result, SourceUnavailable};
pub use query::{ParsedQuery, QueryParser};
pub use records::{DedupKey, NormalizedRecord, RawRecord, SearchRequest, SourceTag};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of listings requested per search
pub const DEFAULT_LIMIT: usize = 10;

/// Hard ceiling on listings per search
pub const MAX_LIMIT: usize = 500;
