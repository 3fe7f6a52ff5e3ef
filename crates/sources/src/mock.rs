//! Scripted adapter for tests and dry runs
//!
//! Counts calls and remembers the limits it was asked for, so tests can
//! assert that a source was (or was never) consulted.

use crate::{FetchResult, SourceAdapter};
use async_trait::async_trait;
use leadforge_common::{FailureKind, RawRecord, SourceTag, SourceUnavailable};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One scripted response
#[derive(Debug, Clone)]
pub enum MockStep {
    Records(Vec<RawRecord>),
    Fail(FailureKind),
}

/// Mock adapter returning scripted responses
pub struct MockAdapter {
    tag: SourceTag,
    script: Mutex<VecDeque<MockStep>>,
    fallback: MockStep,
    calls: AtomicUsize,
    limits: Mutex<Vec<usize>>,
}

impl MockAdapter {
    fn with_script(tag: &str, script: Vec<MockStep>, fallback: MockStep) -> Self {
        Self {
            tag: SourceTag::new(tag),
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            limits: Mutex::new(Vec::new()),
        }
    }

    /// Always returns `records` (truncated to the requested limit)
    pub fn returning(tag: &str, records: Vec<RawRecord>) -> Self {
        Self::with_script(tag, Vec::new(), MockStep::Records(records))
    }

    /// Always returns `count` distinct listings named `"{tag} listing {n}"`
    pub fn numbered(tag: &str, count: usize) -> Self {
        let records = (1..=count)
            .map(|n| {
                RawRecord::named(format!("{} listing {}", tag, n))
                    .with_address(format!("{} {} Avenue", n, tag))
            })
            .collect();
        Self::returning(tag, records)
    }

    /// Always fails with `kind`
    pub fn failing(tag: &str, kind: FailureKind) -> Self {
        Self::with_script(tag, Vec::new(), MockStep::Fail(kind))
    }

    /// Plays `steps` in order, then returns no records
    pub fn scripted(tag: &str, steps: Vec<MockStep>) -> Self {
        Self::with_script(tag, steps, MockStep::Records(Vec::new()))
    }

    /// Number of `fetch` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Limits passed to each `fetch`, in call order
    pub fn requested_limits(&self) -> Vec<usize> {
        self.limits.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn next_step(&self) -> MockStep {
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn tag(&self) -> SourceTag {
        self.tag.clone()
    }

    async fn fetch(&self, _keyword: &str, _location: Option<&str>, limit: usize) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut limits) = self.limits.lock() {
            limits.push(limit);
        }

        match self.next_step() {
            MockStep::Records(mut records) => {
                records.truncate(limit);
                Ok(records)
            }
            MockStep::Fail(kind) => Err(SourceUnavailable::new(
                self.tag.clone(),
                kind,
                format!("scripted {}", kind),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_steps_then_empty() {
        let adapter = MockAdapter::scripted(
            "geo",
            vec![
                MockStep::Fail(FailureKind::Timeout),
                MockStep::Records(vec![RawRecord::named("A"), RawRecord::named("B")]),
            ],
        );

        assert_eq!(adapter.fetch("k", None, 5).await.unwrap_err().kind, FailureKind::Timeout);
        assert_eq!(adapter.fetch("k", None, 1).await.unwrap().len(), 1);
        assert!(adapter.fetch("k", None, 5).await.unwrap().is_empty());
        assert_eq!(adapter.calls(), 3);
        assert_eq!(adapter.requested_limits(), vec![5, 1, 5]);
    }

    #[tokio::test]
    async fn test_numbered_records_are_distinct() {
        let adapter = MockAdapter::numbered("dir", 3);
        let records = adapter.fetch("k", Some("Miami"), 10).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_ne!(records[0].address, records[1].address);
    }
}
