//! Listing records and search metadata
//!
//! - `SearchRequest`: one validated keyword/location/limit invocation
//! - `RawRecord`: what a source hands back, in a common shape
//! - `NormalizedRecord`: a raw record stamped with request-derived metadata
//! - `DedupKey`: entity identity used to merge duplicates across sources

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Metadata keys owned by the reconciler. Adapters may not set them.
pub const METADATA_KEYS: &[&str] = &["search_keyword", "search_location", "full_query", "source"];

/// Values providers use to mean "we don't know"
const PLACEHOLDERS: &[&str] = &[
    "na",
    "n/a",
    "none",
    "null",
    "not available",
    "address not found",
    "address not available",
    "phone not available",
    "website not available",
    "unknown",
];

/// Identifies the adapter a record came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceTag(String);

impl SourceTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One search invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Business keyword, trimmed and non-empty
    pub keyword: String,

    /// Location as supplied by the caller; `None` when absent or blank
    pub location: Option<String>,

    /// Maximum listings to return
    pub limit: usize,
}

impl SearchRequest {
    /// Validate and build a request
    pub fn new(keyword: &str, location: Option<&str>, limit: usize) -> Result<Self> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::EmptyKeyword);
        }
        if limit == 0 {
            return Err(AppError::InvalidLimit {
                limit,
                max: crate::MAX_LIMIT,
            });
        }

        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        Ok(Self {
            keyword: keyword.to_string(),
            location,
            limit,
        })
    }

    /// `"{keyword} in {location}"`, or the bare keyword without a location
    pub fn full_query(&self) -> String {
        match &self.location {
            Some(location) => format!("{} in {}", self.keyword, location),
            None => self.keyword.clone(),
        }
    }
}

/// A listing as returned by one source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    /// Provider-specific fields (osm ids, opening hours, place ids, ...)
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Count of populated optional contact fields (address, phone, email,
    /// website, rating). Used to pick the survivor of a dedup collision.
    pub fn completeness(&self) -> usize {
        let text_fields = [&self.address, &self.phone, &self.email, &self.website]
            .into_iter()
            .filter(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()))
            .count();
        let rating = usize::from(self.rating.is_some_and(|r| r > 0.0));
        text_fields + rating
    }
}

/// A record stamped with the metadata of the request that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(flatten)]
    pub record: RawRecord,

    /// Exact keyword of the originating request
    pub search_keyword: String,

    /// Title-cased city, or empty when the request had no location
    pub search_location: String,

    /// Reconstructed query string
    pub full_query: String,

    /// Adapter that produced the record
    pub source: SourceTag,
}

/// Deterministic entity identity: hex SHA-256 of the normalized name plus
/// normalized address (or phone when the address is missing)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    /// `None` when the record carries nothing usable to identify it
    pub fn for_record(record: &RawRecord) -> Option<Self> {
        let name = normalize_name(&record.name);
        if name.is_empty() {
            return None;
        }

        let address = record
            .address
            .as_deref()
            .map(normalize_address)
            .filter(|a| !a.is_empty());
        let (kind, value) = match address {
            Some(address) => ("addr", address),
            None => {
                let phone = record.phone.as_deref().map(phone_digits)?;
                if phone.is_empty() {
                    return None;
                }
                ("phone", phone)
            }
        };

        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b"|");
        hasher.update(kind.as_bytes());
        hasher.update(b"|");
        hasher.update(value.as_bytes());
        Some(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for logs
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

const NAME_SUFFIXES: &[&str] = &["llc", "inc", "corp", "corporation", "ltd", "co", "company", "pllc", "pc"];

/// Lowercase, drop punctuation, fold `&` into `and`, and strip legal
/// suffixes and a leading "the"
pub fn normalize_name(name: &str) -> String {
    let folded = name.to_lowercase().replace("&amp;", " and ").replace('&', " and ");
    let cleaned: String = folded
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.len() > 1 && words[0] == "the" {
        words.remove(0);
    }
    while words.len() > 1 && words.last().is_some_and(|w| NAME_SUFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}

/// Trimmed field value, `None` for blanks and placeholders
pub fn clean_field(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || PLACEHOLDERS.contains(&value.to_lowercase().as_str()) {
        return None;
    }
    Some(value.to_string())
}

/// Lowercase, alphanumerics only, single spaces
pub fn normalize_address(address: &str) -> String {
    let cleaned: String = address
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Digits only, with a leading US country code dropped
pub fn phone_digits(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    }
}

/// Format US numbers as `(555) 123-4567` / `+1 (555) 123-4567`; other
/// shapes are returned trimmed
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        11 if digits.starts_with('1') => {
            format!("+1 ({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..])
        }
        _ => phone.trim().to_string(),
    }
}
