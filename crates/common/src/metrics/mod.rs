//! Metrics and observability utilities
//!
//! Counters and histograms for source calls, retries, dedup collisions and
//! whole pipeline runs. Names share the `leadforge` prefix.

use crate::errors::FailureKind;
use metrics::{counter, describe_counter, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all LeadForge metrics
pub const METRICS_PREFIX: &str = "leadforge";

/// Histogram buckets for one source call including retries (in seconds)
pub const SOURCE_CALL_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
];

/// Buckets for a full pipeline run (slower, spans several sources)
pub const PIPELINE_BUCKETS: &[f64] = &[
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
    300.0,  // 5m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Source metrics
    describe_counter!(
        format!("{}_source_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Source calls by outcome"
    );

    describe_histogram!(
        format!("{}_source_call_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Source call latency including retries"
    );

    describe_counter!(
        format!("{}_source_records_total", METRICS_PREFIX),
        Unit::Count,
        "Raw records returned by sources"
    );

    describe_counter!(
        format!("{}_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Retries scheduled after transient failures"
    );

    // Reconciliation metrics
    describe_counter!(
        format!("{}_dedup_collisions_total", METRICS_PREFIX),
        Unit::Count,
        "Records that collided with an already accepted listing"
    );

    // Pipeline metrics
    describe_counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Pipeline runs by final status"
    );

    describe_histogram!(
        format!("{}_pipeline_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end pipeline latency"
    );

    tracing::info!("Metrics registered");
}

/// Record one source call after the retry layer settled it
pub fn record_source_call(
    source: &str,
    failure: Option<FailureKind>,
    records: usize,
    duration_secs: f64,
) {
    let outcome = failure.map(FailureKind::as_str).unwrap_or("success");

    counter!(
        format!("{}_source_calls_total", METRICS_PREFIX),
        "source" => source.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_source_call_duration_seconds", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .record(duration_secs);

    if records > 0 {
        counter!(
            format!("{}_source_records_total", METRICS_PREFIX),
            "source" => source.to_string()
        )
        .increment(records as u64);
    }
}

/// Helper to record a scheduled retry
pub fn record_retry(source: &str, kind: FailureKind) {
    counter!(
        format!("{}_retries_total", METRICS_PREFIX),
        "source" => source.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Helper to record a dedup collision
pub fn record_dedup_collision(replaced: bool) {
    let resolution = if replaced { "replaced" } else { "kept_first" };

    counter!(
        format!("{}_dedup_collisions_total", METRICS_PREFIX),
        "resolution" => resolution
    )
    .increment(1);
}

/// Helper to record a finished pipeline run
pub fn record_pipeline(status: &str, duration_secs: f64, record_count: usize) {
    counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(format!("{}_pipeline_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_pipeline_last_record_count", METRICS_PREFIX)).set(record_count as f64);
}
