//! Maps search API adapter (SerpApi `google_maps` engine)

use crate::http::{build_client, parse_json, send_for_text};
use crate::{FetchResult, SourceAdapter};
use async_trait::async_trait;
use leadforge_common::records::clean_field;
use leadforge_common::{config::{Secret, SourceConfig}, RawRecord, Result, SourceTag, SourceUnavailable};
use serde::Deserialize;
use serde_json::json;

pub const SOURCE_NAME: &str = "serp_maps";

const DEFAULT_SERP_URL: &str = "https://serpapi.com/search.json";

/// The API pages at 20 local results
const MAX_RESULTS_PER_REQUEST: usize = 20;

#[derive(Deserialize)]
struct SerpResponse {
    #[serde(default)]
    local_results: Vec<SerpPlace>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct SerpPlace {
    title: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    rating: Option<f64>,
    reviews: Option<u32>,
    #[serde(rename = "type")]
    kind: Option<String>,
    place_id: Option<String>,
}

/// Keyed maps search adapter
pub struct SerpMapsAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<Secret>,
    tag: SourceTag,
}

impl SerpMapsAdapter {
    pub fn new(config: &SourceConfig, user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(user_agent, config.timeout())?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_SERP_URL.to_string()),
            api_key: config.api_key.clone().filter(|k| !k.expose().trim().is_empty()),
            tag: SourceTag::new(SOURCE_NAME),
        })
    }
}

#[async_trait]
impl SourceAdapter for SerpMapsAdapter {
    fn tag(&self) -> SourceTag {
        self.tag.clone()
    }

    async fn fetch(&self, keyword: &str, location: Option<&str>, limit: usize) -> FetchResult {
        let Some(api_key) = &self.api_key else {
            return Err(SourceUnavailable::blocked(self.tag.clone(), "no API key configured"));
        };

        let query = match location {
            Some(location) => format!("{} in {}", keyword, location),
            None => keyword.to_string(),
        };
        let num = limit.min(MAX_RESULTS_PER_REQUEST).to_string();

        let request = self.client.get(&self.base_url).query(&[
            ("engine", "google_maps"),
            ("type", "search"),
            ("q", query.as_str()),
            ("num", num.as_str()),
            ("api_key", api_key.expose()),
        ]);

        let Some(body) = send_for_text(&self.tag, request).await? else {
            return Ok(Vec::new());
        };
        let response: SerpResponse = parse_json(&self.tag, &body)?;

        if response.local_results.is_empty() {
            if let Some(error) = response.error {
                tracing::debug!(error = %error, "Maps search returned no results");
            }
            return Ok(Vec::new());
        }

        Ok(response
            .local_results
            .into_iter()
            .filter_map(place_to_record)
            .take(limit)
            .collect())
    }
}

fn place_to_record(place: SerpPlace) -> Option<RawRecord> {
    let mut record = RawRecord::named(clean_field(place.title.as_deref())?);
    record.address = clean_field(place.address.as_deref());
    record.phone = clean_field(place.phone.as_deref());
    record.website = clean_field(place.website.as_deref());
    record.rating = place.rating.filter(|r| *r > 0.0);
    record.review_count = place.reviews;
    record.categories = clean_field(place.kind.as_deref()).into_iter().collect();
    if let Some(place_id) = place.place_id {
        record.extra.insert("place_id".into(), json!(place_id));
    }
    Some(record)
}
