//! Reconciler / deduplicator
//!
//! Turns accumulated raw records into the final listing set:
//! 1. Field hygiene: trim, drop placeholders, format phone numbers
//! 2. Stamp request metadata, overriding anything an adapter guessed
//! 3. Merge records that share a `DedupKey`, keeping the more complete one
//!    in the slot of the first-seen record (and that record's request
//!    metadata)
//! 4. Cap at the request limit

use crate::cascade::SourcedRecord;
use leadforge_common::{
    metrics,
    query::search_location,
    records::{clean_field, format_phone, METADATA_KEYS},
    DedupKey, NormalizedRecord, RawRecord, SearchRequest,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// Accumulates survivors across one or more requests
#[derive(Debug, Default)]
pub struct DedupIndex {
    slots: Vec<NormalizedRecord>,
    keys: HashMap<DedupKey, usize>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one request's records into the index. At most `request.limit`
    /// new listings are added; later duplicates may still upgrade an
    /// existing slot. Returns the number of new listings.
    pub fn absorb(&mut self, records: Vec<SourcedRecord>, request: &SearchRequest) -> usize {
        let location = search_location(request.location.as_deref());
        let full_query = request.full_query();
        let mut added = 0;

        for SourcedRecord { record, source } in records {
            let record = scrub(record);
            let key = DedupKey::for_record(&record);
            let candidate = NormalizedRecord {
                record,
                search_keyword: request.keyword.clone(),
                search_location: location.clone(),
                full_query: full_query.clone(),
                source,
            };

            match key.as_ref().and_then(|k| self.keys.get(k).copied()) {
                Some(slot) => self.resolve_collision(slot, candidate, key.as_ref()),
                None if added < request.limit => {
                    if let Some(key) = key {
                        self.keys.insert(key, self.slots.len());
                    }
                    self.slots.push(candidate);
                    added += 1;
                }
                None => debug!(source = %candidate.source, "Over limit, record dropped"),
            }
        }

        added
    }

    fn resolve_collision(&mut self, slot: usize, candidate: NormalizedRecord, key: Option<&DedupKey>) {
        let existing = &mut self.slots[slot];
        let replace = candidate.record.completeness() > existing.record.completeness();
        let (kept, dropped) = if replace {
            (&candidate.source, &existing.source)
        } else {
            (&existing.source, &candidate.source)
        };

        info!(
            kept = %kept,
            dropped = %dropped,
            key = %key.map(ToString::to_string).unwrap_or_default(),
            replaced = replace,
            "dedup collision resolved"
        );
        metrics::record_dedup_collision(replace);

        // The slot keeps the metadata of the request that opened it
        if replace {
            existing.record = candidate.record;
            existing.source = candidate.source;
        }
    }

    /// Survivors in first-seen order
    pub fn into_records(self) -> Vec<NormalizedRecord> {
        self.slots
    }
}

/// Stateless reconciliation of a single request
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    pub fn reconcile(&self, records: Vec<SourcedRecord>, request: &SearchRequest) -> Vec<NormalizedRecord> {
        let mut index = DedupIndex::new();
        index.absorb(records, request);
        index.into_records()
    }
}

/// Normalize fields so completeness counts and keys see real values only
fn scrub(mut record: RawRecord) -> RawRecord {
    record.name = record.name.split_whitespace().collect::<Vec<_>>().join(" ");
    record.address = clean_field(record.address.as_deref())
        .map(|a| a.split_whitespace().collect::<Vec<_>>().join(" "));
    record.phone = clean_field(record.phone.as_deref()).map(|p| format_phone(&p));
    record.email = clean_field(record.email.as_deref()).map(|e| e.to_lowercase());
    record.website = clean_field(record.website.as_deref());
    record.rating = record.rating.filter(|r| r.is_finite() && *r > 0.0);

    let mut categories: Vec<String> = Vec::with_capacity(record.categories.len());
    for category in record.categories.drain(..) {
        if let Some(category) = clean_field(Some(category.as_str())) {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
    }
    record.categories = categories;

    for key in METADATA_KEYS {
        record.extra.remove(*key);
    }
    record
}
