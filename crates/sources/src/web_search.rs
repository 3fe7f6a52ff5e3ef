//! Web search scraper
//!
//! Reads a DuckDuckGo-style HTML results page. Result titles become
//! listing names; phone numbers and street addresses are pulled out of the
//! snippet text.

use crate::http::{build_client, regex, selector, send_for_text, squash_whitespace, BotWall};
use crate::{FetchResult, SourceAdapter};
use async_trait::async_trait;
use leadforge_common::{config::SourceConfig, RawRecord, Result, SourceTag};
use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub const SOURCE_NAME: &str = "web_search";

const DEFAULT_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

const PHONE_PATTERN: &str = r"\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}";
const ADDRESS_PATTERN: &str = r"(?i)\b\d+\s+(?:[a-z0-9.'-]+\s+){0,4}?(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Way|Court|Ct)\b\.?";

/// Compiled selectors and patterns
pub struct Patterns {
    result: Selector,
    title: Selector,
    snippet: Selector,
    phone: Regex,
    address: Regex,
}

impl Patterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            result: selector("div.result__body")?,
            title: selector("a.result__a")?,
            snippet: selector(".result__snippet")?,
            phone: regex(PHONE_PATTERN)?,
            address: regex(ADDRESS_PATTERN)?,
        })
    }
}

/// Generic web search adapter
pub struct WebSearchAdapter {
    client: reqwest::Client,
    base_url: String,
    patterns: Patterns,
    wall: BotWall,
    tag: SourceTag,
}

impl WebSearchAdapter {
    pub fn new(config: &SourceConfig, user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(user_agent, config.timeout())?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            patterns: Patterns::new()?,
            wall: BotWall::new()?,
            tag: SourceTag::new(SOURCE_NAME),
        })
    }
}

#[async_trait]
impl SourceAdapter for WebSearchAdapter {
    fn tag(&self) -> SourceTag {
        self.tag.clone()
    }

    async fn fetch(&self, keyword: &str, location: Option<&str>, limit: usize) -> FetchResult {
        let query = match location {
            Some(location) => format!("{} {}", keyword, location),
            None => keyword.to_string(),
        };

        let request = self.client.get(&self.base_url).query(&[("q", query.as_str())]);
        let Some(body) = send_for_text(&self.tag, request).await? else {
            return Ok(Vec::new());
        };

        let results = parse_results(&self.patterns, &body, limit);
        if results.is_empty() {
            self.wall.check(&self.tag, &body)?;
        }
        Ok(results)
    }
}

/// Listings from a results page, at most `limit`
pub fn parse_results(patterns: &Patterns, html: &str, limit: usize) -> Vec<RawRecord> {
    let document = Html::parse_document(html);

    document
        .select(&patterns.result)
        .filter_map(|result| result_to_record(result, patterns))
        .take(limit)
        .collect()
}

fn result_to_record(result: ElementRef<'_>, patterns: &Patterns) -> Option<RawRecord> {
    let title = result.select(&patterns.title).next()?;
    let name = listing_name(&squash_whitespace(&title.text().collect::<String>()))?;

    let mut record = RawRecord::named(name);
    record.website = title.value().attr("href").and_then(resolve_link);

    if let Some(snippet) = result.select(&patterns.snippet).next() {
        let text = squash_whitespace(&snippet.text().collect::<String>());
        record.phone = patterns.phone.find(&text).map(|m| m.as_str().to_string());
        record.address = patterns
            .address
            .find(&text)
            .map(|m| m.as_str().trim().to_string());
        if !text.is_empty() {
            record.extra.insert("snippet".into(), serde_json::Value::String(text));
        }
    }

    Some(record)
}

/// Result titles look like "Bright Smiles Dental - Miami Dentist | Yelp";
/// keep the part before the first separator
fn listing_name(title: &str) -> Option<String> {
    let name = [" | ", " - ", " – ", " — "]
        .iter()
        .fold(title, |acc, sep| acc.split(sep).next().unwrap_or(acc))
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Result links are either direct or `//duckduckgo.com/l/?uddg=<target>`
fn resolve_link(href: &str) -> Option<String> {
    let base = Url::parse("https://duckduckgo.com").ok()?;
    let url = base.join(href).ok()?;

    let target = match url.query_pairs().find(|(key, _)| key == "uddg") {
        Some((_, target)) => Url::parse(&target).ok()?,
        None => url,
    };
    matches!(target.scheme(), "http" | "https").then(|| target.to_string())
}
