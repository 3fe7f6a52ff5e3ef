//! Query Parser - splits a listing search into keyword and location
//!
//! Grammar for combined input: `<keyword> <SEP> <location>` where SEP is a
//! separator word ("in", "near") matched case-insensitively as a whole
//! word. The split happens at the last separator that is not the first
//! word and still has text after it, so "fish and chips in Austin",
//! "drop in center in Austin" and "dentists in Indianapolis, IN" keep both
//! halves intact.

use crate::errors::{AppError, Result};
use crate::records::SearchRequest;
use serde::{Deserialize, Serialize};
use tracing::info;

/// How the input was supplied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryFormat {
    /// Keyword and location arrived as separate fields
    Structured,
    /// Single string of the form "X in Y"
    Combined,
    /// Single string with no location
    KeywordOnly,
}

/// Non-fatal observations about the input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "issue")]
pub enum QueryIssue {
    /// Explicit location given while the query also reads "X in Y"
    SeparatorInStructuredQuery,
    /// Explicit location field was present but blank
    BlankLocation,
    /// Query ends with its only separator and names no location ("dentists in")
    DanglingSeparator { separator: String },
    /// More than one separator word; the last one followed by text was used
    MultipleSeparators { count: usize },
}

/// Validation record emitted with every parse
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryValidation {
    pub format: QueryFormat,
    pub issues: Vec<QueryIssue>,
}

/// Query parse result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Trimmed, non-empty keyword
    pub keyword: String,

    /// Trimmed location, `None` when absent
    pub location: Option<String>,

    /// What the parser noticed along the way
    pub validation: QueryValidation,
}

impl ParsedQuery {
    /// Build the search request for this query
    pub fn into_request(self, limit: usize) -> Result<SearchRequest> {
        SearchRequest::new(&self.keyword, self.location.as_deref(), limit)
    }

    /// Reconstructed combined query
    pub fn full_query(&self) -> String {
        match &self.location {
            Some(location) => format!("{} in {}", self.keyword, location),
            None => self.keyword.clone(),
        }
    }
}

/// Query parser configuration
#[derive(Debug, Clone)]
pub struct QueryParserConfig {
    /// Separator words meaning "X in Y"
    pub separators: Vec<String>,
}

impl Default for QueryParserConfig {
    fn default() -> Self {
        Self {
            separators: vec!["in".to_string(), "near".to_string()],
        }
    }
}

/// Byte span of one separator word within the query
#[derive(Debug, Clone, Copy)]
struct SeparatorHit {
    start: usize,
    end: usize,
}

/// Query parser for listing searches
#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    config: QueryParserConfig,
}

impl QueryParser {
    /// Create a new query parser
    pub fn new(config: QueryParserConfig) -> Self {
        Self { config }
    }

    /// Split a query into keyword and location.
    ///
    /// An explicit, non-blank `location` wins and the whole query becomes
    /// the keyword. Otherwise the last separator splits the query.
    pub fn parse(&self, query: &str, location: Option<&str>) -> Result<ParsedQuery> {
        let query = query.trim();
        let explicit = location.map(str::trim);
        let hits = self.find_separators(query);
        let mut issues = Vec::new();

        let (keyword, location, format) = match explicit {
            Some(loc) if !loc.is_empty() => {
                if !hits.is_empty() {
                    issues.push(QueryIssue::SeparatorInStructuredQuery);
                }
                (query, Some(loc), QueryFormat::Structured)
            }
            blank => {
                if blank.is_some() {
                    issues.push(QueryIssue::BlankLocation);
                }
                match hits.last() {
                    Some(last) => {
                        if hits.len() > 1 {
                            issues.push(QueryIssue::MultipleSeparators { count: hits.len() });
                        }
                        // A trailing separator word ("Indianapolis, IN") is part of
                        // the location when an earlier separator introduces it
                        let split = hits
                            .iter()
                            .rev()
                            .find(|hit| !query[hit.end..].trim().is_empty());
                        match split {
                            Some(hit) => (
                                query[..hit.start].trim(),
                                Some(query[hit.end..].trim()),
                                QueryFormat::Combined,
                            ),
                            None => {
                                issues.push(QueryIssue::DanglingSeparator {
                                    separator: query[last.start..last.end].to_lowercase(),
                                });
                                (query[..last.start].trim(), None, QueryFormat::KeywordOnly)
                            }
                        }
                    }
                    None => (query, None, QueryFormat::KeywordOnly),
                }
            }
        };

        if keyword.is_empty() {
            return Err(AppError::EmptyKeyword);
        }

        let validation = QueryValidation { format, issues };
        info!(
            format = ?validation.format,
            keyword = keyword,
            location = location.unwrap_or(""),
            issues = ?validation.issues,
            "query parsed"
        );

        Ok(ParsedQuery {
            keyword: keyword.to_string(),
            location: location.map(str::to_string),
            validation,
        })
    }

    /// Separator words after the first word, in order of appearance
    fn find_separators(&self, query: &str) -> Vec<SeparatorHit> {
        word_spans(query)
            .into_iter()
            .skip(1)
            .filter(|&(start, end)| {
                let word = &query[start..end];
                self.config
                    .separators
                    .iter()
                    .any(|sep| word.eq_ignore_ascii_case(sep))
            })
            .map(|(start, end)| SeparatorHit { start, end })
            .collect()
    }
}

/// Byte spans of whitespace-delimited words
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> QueryParser {
        QueryParser::new(QueryParserConfig::default())
    }

    #[test]
    fn test_combined_query() {
        let result = parser().parse("dentists in Miami", None).unwrap();

        assert_eq!(result.keyword, "dentists");
        assert_eq!(result.location.as_deref(), Some("Miami"));
        assert_eq!(result.validation.format, QueryFormat::Combined);
        assert!(result.validation.issues.is_empty());
    }

    #[test]
    fn test_last_separator_wins() {
        let result = parser().parse("drop in center IN Austin, TX", None).unwrap();

        assert_eq!(result.keyword, "drop in center");
        assert_eq!(result.location.as_deref(), Some("Austin, TX"));
        assert_eq!(
            result.validation.issues,
            vec![QueryIssue::MultipleSeparators { count: 2 }]
        );
    }

    #[test]
    fn test_separator_must_be_whole_word() {
        let result = parser().parse("fish and chips Austin", None).unwrap();
        assert_eq!(result.keyword, "fish and chips Austin");
        assert_eq!(result.location, None);

        let result = parser().parse("coffee shops inside malls", None).unwrap();
        assert_eq!(result.location, None);
    }

    #[test]
    fn test_near_separator() {
        let result = parser().parse("plumbers near Denver", None).unwrap();
        assert_eq!(result.keyword, "plumbers");
        assert_eq!(result.location.as_deref(), Some("Denver"));
    }

    #[test]
    fn test_structured_location_wins() {
        let result = parser().parse("  fish and chips in Austin ", Some(" Dallas ")).unwrap();

        assert_eq!(result.keyword, "fish and chips in Austin");
        assert_eq!(result.location.as_deref(), Some("Dallas"));
        assert_eq!(result.validation.format, QueryFormat::Structured);
        assert_eq!(
            result.validation.issues,
            vec![QueryIssue::SeparatorInStructuredQuery]
        );
    }

    #[test]
    fn test_blank_location_falls_back_to_split() {
        let result = parser().parse("bakeries in Boston", Some("   ")).unwrap();
        assert_eq!(result.keyword, "bakeries");
        assert_eq!(result.location.as_deref(), Some("Boston"));
        assert!(result.validation.issues.contains(&QueryIssue::BlankLocation));
    }

    #[test]
    fn test_dangling_separator() {
        let result = parser().parse("dentists in", None).unwrap();
        assert_eq!(result.keyword, "dentists");
        assert_eq!(result.location, None);
        assert_eq!(result.validation.format, QueryFormat::KeywordOnly);
    }

    #[test]
    fn test_trailing_state_abbreviation_in() {
        let result = parser().parse("dentists in Indianapolis, IN", None).unwrap();
        assert_eq!(result.keyword, "dentists");
        assert_eq!(result.location.as_deref(), Some("Indianapolis, IN"));
        assert_eq!(result.validation.format, QueryFormat::Combined);

        let result = parser().parse("drop in center in Fort Wayne IN", None).unwrap();
        assert_eq!(result.keyword, "drop in center");
        assert_eq!(result.location.as_deref(), Some("Fort Wayne IN"));
        assert!(!result
            .validation
            .issues
            .iter()
            .any(|i| matches!(i, QueryIssue::DanglingSeparator { .. })));
    }

    #[test]
    fn test_leading_separator_is_part_of_keyword() {
        let result = parser().parse("In N Out Burger", None).unwrap();
        assert_eq!(result.keyword, "In N Out Burger");
        assert_eq!(result.location, None);
    }

    #[test]
    fn test_empty_keyword_rejected() {
        assert!(matches!(parser().parse("", None), Err(AppError::EmptyKeyword)));
        assert!(matches!(parser().parse("   ", Some("Miami")), Err(AppError::EmptyKeyword)));
        assert!(matches!(parser().parse("x in", Some("Miami")), Ok(_)));
    }

    #[test]
    fn test_reparse_full_query() {
        let cases = [
            ("dentists", Some("Miami")),
            ("fish and chips", Some("Austin, TX")),
            ("drop in center", Some("Salt Lake City")),
            ("dentists", Some("Fort Wayne IN")),
            ("dentists", Some("Indianapolis, IN")),
            ("yoga studios", None),
        ];

        for (keyword, location) in cases {
            let first = parser().parse(keyword, location).unwrap();
            let again = parser().parse(&first.full_query(), None).unwrap();
            assert_eq!(
                (first.keyword.as_str(), first.location.as_deref()),
                (again.keyword.as_str(), again.location.as_deref()),
                "reparse of {:?}",
                first.full_query()
            );
        }
    }
}
