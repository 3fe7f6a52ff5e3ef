//! End-to-end pipeline scenarios against scripted adapters

use std::sync::Arc;
use std::time::Duration;

use leadforge_common::{AppConfig, AppError, CancelFlag, FailureKind, RawRecord, SourceTag};
use leadforge_pipeline::{LeadPipeline, PipelineStatus, RetryPolicy, SourceGuard};
use leadforge_sources::{MockAdapter, MockStep};
use serde_json::json;
use tokio_test::assert_ok;

fn no_wait() -> RetryPolicy {
    RetryPolicy::new(3, Duration::ZERO, Duration::ZERO)
}

fn pipeline(adapters: &[Arc<MockAdapter>]) -> LeadPipeline {
    let guards = adapters
        .iter()
        .map(|a| SourceGuard::new(a.clone(), no_wait(), Duration::ZERO))
        .collect();
    LeadPipeline::new(guards, 10, 500)
}

#[tokio::test]
async fn test_first_source_satisfies_limit_and_short_circuits() {
    let a = Arc::new(MockAdapter::numbered("a", 8));
    let b = Arc::new(MockAdapter::numbered("b", 8));
    let c = Arc::new(MockAdapter::numbered("c", 8));

    let outcome = assert_ok!(
        pipeline(&[a.clone(), b.clone(), c.clone()])
            .run("dentists", Some("Miami"), Some(5), &CancelFlag::new())
            .await
    );

    assert_eq!(outcome.records.len(), 5);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
    assert_eq!(c.calls(), 0);
    assert_eq!(outcome.attempts.len(), 1);
}

#[tokio::test]
async fn test_miami_dentists_fill_from_second_source() {
    let geo = Arc::new(MockAdapter::numbered("geo", 3));
    let directory = Arc::new(MockAdapter::numbered("directory", 4));

    let outcome = assert_ok!(
        pipeline(&[geo.clone(), directory.clone()])
            .run("dentists", Some("Miami"), Some(5), &CancelFlag::new())
            .await
    );

    assert_eq!(geo.requested_limits(), vec![5]);
    assert_eq!(directory.requested_limits(), vec![2]);
    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.status, PipelineStatus::Complete);
    for record in &outcome.records {
        assert_eq!(record.search_location, "Miami");
        assert_eq!(record.search_keyword, "dentists");
        assert_eq!(record.full_query, "dentists in Miami");
    }
    assert_eq!(outcome.records[0].source, SourceTag::new("geo"));
    assert_eq!(outcome.records[4].source, SourceTag::new("directory"));
}

#[tokio::test]
async fn test_empty_keyword_never_reaches_sources() {
    let a = Arc::new(MockAdapter::numbered("a", 3));
    let p = pipeline(&[a.clone()]);
    let cancel = CancelFlag::new();

    assert!(matches!(p.run("", Some("Miami"), Some(5), &cancel).await, Err(AppError::EmptyKeyword)));
    assert!(matches!(p.run("   ", None, Some(5), &cancel).await, Err(AppError::EmptyKeyword)));
    assert!(matches!(p.run("in Miami", None, Some(5), &cancel).await, Ok(_)));
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn test_combined_query_is_split_on_last_separator() {
    let a = Arc::new(MockAdapter::numbered("a", 2));
    let outcome = assert_ok!(
        pipeline(&[a.clone()])
            .run("drop in center in Austin, TX", None, Some(2), &CancelFlag::new())
            .await
    );

    assert_eq!(outcome.requests[0].keyword, "drop in center");
    assert_eq!(outcome.requests[0].location.as_deref(), Some("Austin, TX"));
    assert_eq!(outcome.records[0].search_location, "Austin");
    assert_eq!(outcome.records[0].full_query, "drop in center in Austin, TX");
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_retried_with_exponential_backoff() {
    let adapter = Arc::new(MockAdapter::scripted(
        "geo",
        vec![
            MockStep::Fail(FailureKind::Timeout),
            MockStep::Fail(FailureKind::Timeout),
            MockStep::Records(vec![RawRecord::named("Bright Smiles").with_address("1 Main St")]),
        ],
    ));
    let policy = RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(8));
    let guard = SourceGuard::new(adapter.clone(), policy, Duration::ZERO);

    let report = guard.call_with_policy("dentists", Some("Miami"), 5).await;

    assert_eq!(report.attempts, 3);
    assert_eq!(report.delays, vec![Duration::from_millis(500), Duration::from_millis(1000)]);
    assert_eq!(report.outcome.unwrap().len(), 1);
    assert_eq!(adapter.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_invisible_to_the_caller() {
    let flaky = Arc::new(MockAdapter::scripted(
        "geo",
        vec![
            MockStep::Fail(FailureKind::RateLimited),
            MockStep::Records(vec![RawRecord::named("Bright Smiles").with_address("1 Main St")]),
        ],
    ));
    let guard = SourceGuard::new(
        flaky.clone(),
        RetryPolicy::new(3, Duration::from_millis(250), Duration::from_secs(1)),
        Duration::ZERO,
    );
    let p = LeadPipeline::new(vec![guard], 10, 500);

    let start = tokio::time::Instant::now();
    let outcome = assert_ok!(p.run("dentists", Some("Miami"), Some(1), &CancelFlag::new()).await);

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.attempts[0].attempts, 2);
    assert!(outcome.attempts[0].failure.is_none());
    assert!(start.elapsed() >= Duration::from_millis(250));
}

#[tokio::test]
async fn test_blocked_source_is_not_retried_and_cascade_moves_on() {
    let blocked = Arc::new(MockAdapter::failing("web", FailureKind::Blocked));
    let directory = Arc::new(MockAdapter::numbered("directory", 3));

    let outcome = assert_ok!(
        pipeline(&[blocked.clone(), directory.clone()])
            .run("dentists", Some("Miami"), Some(3), &CancelFlag::new())
            .await
    );

    assert_eq!(blocked.calls(), 1);
    assert_eq!(outcome.attempts[0].failure, Some(FailureKind::Blocked));
    assert_eq!(outcome.records.len(), 3);
    assert!(outcome.records.iter().all(|r| r.source == SourceTag::new("directory")));
}

#[tokio::test]
async fn test_adapter_metadata_is_overridden() {
    let mut guessed = RawRecord::named("Bright Smiles").with_address("1 Main St");
    guessed.extra.insert("search_keyword".into(), json!("dental offices"));
    guessed.extra.insert("source".into(), json!("somewhere"));
    guessed.extra.insert("opening_hours".into(), json!("Mo-Fr 09:00-17:00"));
    let a = Arc::new(MockAdapter::returning("geo", vec![guessed]));

    let outcome = assert_ok!(
        pipeline(&[a])
            .run("dentists", Some("Miami"), Some(5), &CancelFlag::new())
            .await
    );

    let record = &outcome.records[0];
    assert_eq!(record.search_keyword, "dentists");
    assert_eq!(record.source, SourceTag::new("geo"));
    assert!(!record.record.extra.contains_key("search_keyword"));
    assert_eq!(record.record.extra["opening_hours"], json!("Mo-Fr 09:00-17:00"));

    let value = serde_json::to_value(record).unwrap();
    assert_eq!(value["search_keyword"], json!("dentists"));
    assert_eq!(value["source"], json!("geo"));
}

#[tokio::test]
async fn test_duplicates_across_sources_keep_most_complete() {
    let geo = Arc::new(MockAdapter::returning(
        "geo",
        vec![RawRecord::named("Bright Smiles").with_address("100 Main St")],
    ));
    let directory = Arc::new(MockAdapter::returning(
        "directory",
        vec![
            RawRecord::named("Bright Smiles, LLC")
                .with_address("100 Main St.")
                .with_phone("305.555.0100")
                .with_website("https://brightsmiles.example"),
            RawRecord::named("Coral Dental").with_address("9 Bay Rd"),
        ],
    ));

    let outcome = assert_ok!(
        pipeline(&[geo, directory])
            .run("dentists", Some("Miami"), Some(5), &CancelFlag::new())
            .await
    );

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].source, SourceTag::new("directory"));
    assert_eq!(outcome.records[0].record.phone.as_deref(), Some("(305) 555-0100"));
    assert_eq!(outcome.records[1].record.name, "Coral Dental");
}

#[tokio::test]
async fn test_all_sources_exhausted_is_a_status_not_an_error() {
    let a = Arc::new(MockAdapter::failing("a", FailureKind::Timeout));
    let b = Arc::new(MockAdapter::returning("b", Vec::new()));

    let outcome = assert_ok!(
        pipeline(&[a, b])
            .run("unicorn groomers", Some("Boise"), Some(5), &CancelFlag::new())
            .await
    );

    assert!(outcome.is_empty());
    assert_eq!(outcome.status, PipelineStatus::AllSourcesExhausted);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.attempts[0].attempts, 3);
}

#[tokio::test]
async fn test_no_location_is_not_fabricated() {
    let a = Arc::new(MockAdapter::numbered("a", 1));
    let outcome = assert_ok!(
        pipeline(&[a])
            .run("dentists", None, Some(1), &CancelFlag::new())
            .await
    );
    assert_eq!(outcome.records[0].search_location, "");
    assert_eq!(outcome.records[0].full_query, "dentists");
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let a = Arc::new(MockAdapter::numbered("a", 3));
    let cancel = CancelFlag::new();
    cancel.cancel();

    let outcome = assert_ok!(pipeline(&[a.clone()]).run("dentists", Some("Miami"), Some(3), &cancel).await);

    assert_eq!(outcome.status, PipelineStatus::Cancelled);
    assert!(outcome.records.is_empty());
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_batch_dedups_across_queries() {
    let shared = RawRecord::named("Bright Smiles").with_address("1 Main St");
    let a = Arc::new(MockAdapter::returning(
        "geo",
        vec![shared.clone(), RawRecord::named("Coral Dental").with_address("9 Bay Rd")],
    ));

    let outcome = assert_ok!(
        pipeline(&[a.clone()])
            .run_batch(&["dentists", "orthodontists"], Some("Miami"), Some(5), &CancelFlag::new())
            .await
    );

    assert_eq!(a.calls(), 2);
    assert_eq!(outcome.requests.len(), 2);
    assert_eq!(outcome.records.len(), 2);
    assert!(outcome.records.iter().all(|r| r.search_keyword == "dentists"));
}

#[tokio::test]
async fn test_batch_upgrade_keeps_first_query_metadata() {
    let a = Arc::new(MockAdapter::scripted(
        "geo",
        vec![
            MockStep::Records(vec![RawRecord::named("Bright Smiles").with_address("1 Main St")]),
            MockStep::Records(vec![RawRecord::named("Bright Smiles")
                .with_address("1 Main St")
                .with_phone("305-555-0100")]),
        ],
    ));

    let outcome = assert_ok!(
        pipeline(&[a])
            .run_batch(&["dentists", "orthodontists"], Some("Miami"), Some(5), &CancelFlag::new())
            .await
    );

    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.record.phone.as_deref(), Some("(305) 555-0100"));
    assert_eq!(record.search_keyword, "dentists");
    assert_eq!(record.full_query, "dentists in Miami");
}

#[tokio::test]
async fn test_batch_records_keep_their_own_query() {
    let a = Arc::new(MockAdapter::scripted(
        "geo",
        vec![
            MockStep::Records(vec![RawRecord::named("Bright Smiles").with_address("1 Main St")]),
            MockStep::Records(vec![RawRecord::named("Straight Teeth").with_address("2 Main St")]),
        ],
    ));

    let outcome = assert_ok!(
        pipeline(&[a])
            .run_batch(&["dentists", "orthodontists near Coral Gables"], Some("Miami"), Some(5), &CancelFlag::new())
            .await
    );

    assert_eq!(outcome.records[0].search_keyword, "dentists");
    assert_eq!(outcome.records[1].search_keyword, "orthodontists near Coral Gables");
    assert_eq!(outcome.records[1].search_location, "Miami");
}

#[tokio::test]
async fn test_pipeline_from_default_config_uses_configured_order() {
    let mut config = AppConfig::default();
    config.sources.order = vec!["directory".to_string(), "openstreetmap".to_string()];

    let p = assert_ok!(LeadPipeline::from_config(&config));
    assert_eq!(
        p.sources(),
        vec![SourceTag::new("directory"), SourceTag::new("openstreetmap")]
    );
}

#[tokio::test]
async fn test_unknown_source_in_config_is_rejected() {
    let mut config = AppConfig::default();
    config.sources.order = vec!["carrier_pigeon".to_string()];

    assert!(matches!(
        LeadPipeline::from_config(&config),
        Err(AppError::UnknownSource { .. })
    ));
}
