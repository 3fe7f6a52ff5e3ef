//! Shared HTTP plumbing for adapters
//!
//! Every adapter owns its own `reqwest::Client`. This module builds those
//! clients and maps transport and status failures onto `FailureKind`:
//! - timeout -> `Timeout`
//! - connect failure, 5xx -> `ServerError`
//! - 429 -> `RateLimited`
//! - 401/403, captcha walls -> `Blocked`
//! - undecodable body -> `MalformedResponse`
//! - 404 -> no results

use leadforge_common::{AppError, FailureKind, SourceTag, SourceUnavailable};
use regex_lite::Regex;
use reqwest::{RequestBuilder, StatusCode};
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Phrases an interstitial puts in its title, headline or form
const WALL_PHRASES: &[&str] = &[
    "captcha",
    "unusual traffic",
    "are you a robot",
    "verify you are human",
];

/// Elements only an interstitial carries
const WALL_ELEMENTS: &str = r#"[class*="anomaly-modal"], #challenge-form, #captcha-form, form[action*="captcha"]"#;

/// Page parts whose text names the wall
const WALL_TEXT: &str = "title, h1, form";

/// Create the HTTP client an adapter owns
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, AppError> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Send a request and return its body, `None` on 404
pub async fn send_for_text(
    source: &SourceTag,
    request: RequestBuilder,
) -> Result<Option<String>, SourceUnavailable> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_error(source, e))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if let Some(kind) = classify_status(status) {
        return Err(SourceUnavailable::new(
            source.clone(),
            kind,
            format!("HTTP {}", status.as_u16()),
        ));
    }

    let body = response
        .text()
        .await
        .map_err(|e| classify_error(source, e))?;
    Ok(Some(body))
}

/// Decode a JSON body
pub fn parse_json<T: DeserializeOwned>(source: &SourceTag, body: &str) -> Result<T, SourceUnavailable> {
    serde_json::from_str(body)
        .map_err(|e| SourceUnavailable::malformed(source.clone(), format!("invalid JSON: {}", e)))
}

/// Recognizes bot-detection interstitials served with a 200.
///
/// Only the page's own furniture is inspected: challenge elements plus the
/// text of the title, main headline and forms. Result snippets and scripts
/// (an embedded reCAPTCHA loader, say) never trip it.
pub struct BotWall {
    elements: Selector,
    text: Selector,
}

impl BotWall {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            elements: selector(WALL_ELEMENTS)?,
            text: selector(WALL_TEXT)?,
        })
    }

    /// Fail with `Blocked` when `body` is a bot-detection wall
    pub fn check(&self, source: &SourceTag, body: &str) -> Result<(), SourceUnavailable> {
        let document = Html::parse_document(body);

        if document.select(&self.elements).next().is_some() {
            return Err(SourceUnavailable::blocked(source.clone(), "bot check detected (challenge element)"));
        }

        let furniture = document
            .select(&self.text)
            .flat_map(|element| element.text())
            .collect::<String>()
            .to_lowercase();
        match WALL_PHRASES.iter().find(|phrase| furniture.contains(*phrase)) {
            Some(phrase) => Err(SourceUnavailable::blocked(
                source.clone(),
                format!("bot check detected ({})", phrase),
            )),
            None => Ok(()),
        }
    }
}

/// Failure kind for a non-success status, `None` when the status is fine
pub fn classify_status(status: StatusCode) -> Option<FailureKind> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Some(FailureKind::RateLimited),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(FailureKind::Blocked),
        s if s.is_server_error() => Some(FailureKind::ServerError),
        s if s.is_success() => None,
        // Other 4xx
        _ => Some(FailureKind::MalformedResponse),
    }
}

/// Map a transport error. The URL is stripped so query-string credentials
/// never reach an error message.
pub fn classify_error(source: &SourceTag, err: reqwest::Error) -> SourceUnavailable {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_decode() {
        FailureKind::MalformedResponse
    } else if let Some(status) = err.status() {
        classify_status(status).unwrap_or(FailureKind::ServerError)
    } else {
        FailureKind::ServerError
    };

    SourceUnavailable::new(source.clone(), kind, err.without_url().to_string())
}

/// Compile a CSS selector
pub fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::Internal {
        message: format!("invalid selector {:?}: {}", css, e),
    })
}

/// Compile a regular expression
pub fn regex(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(pattern).map_err(|e| AppError::Internal {
        message: format!("invalid pattern: {}", e),
    })
}

/// Collapse runs of whitespace (scraped text is full of them)
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
