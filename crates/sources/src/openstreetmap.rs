//! OpenStreetMap adapter
//!
//! Two requests per fetch:
//! 1. Geocode the location to a bounding box (Nominatim), falling back to a
//!    table of major-city boxes when the geocoder is down or unhelpful
//! 2. Query Overpass for named elements matching the keyword's OSM tags
//!
//! A global Overpass query is not meaningful, so a fetch without a location
//! returns no records.

use crate::http::{build_client, parse_json, send_for_text};
use crate::{FetchResult, SourceAdapter};
use async_trait::async_trait;
use leadforge_common::records::clean_field;
use leadforge_common::{config::SourceConfig, RawRecord, Result, SourceTag, SourceUnavailable};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "openstreetmap";

const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Keyword to Overpass tag filters. Order matters for partial matches.
const TAG_FILTERS: &[(&str, &str)] = &[
    // Food & drink
    ("restaurant", r#"[amenity~"restaurant"]"#),
    ("restaurants", r#"[amenity~"restaurant"]"#),
    ("cafe", r#"[amenity~"cafe"]"#),
    ("coffee", r#"[amenity~"cafe"]"#),
    ("coffee shop", r#"[amenity~"cafe"]"#),
    ("bar", r#"[amenity~"bar"]"#),
    ("bars", r#"[amenity~"bar"]"#),
    ("pub", r#"[amenity~"pub"]"#),
    ("fast food", r#"[amenity~"fast_food"]"#),
    ("pizza", r#"[amenity~"restaurant"][cuisine~"pizza"]"#),
    // Professional services
    ("lawyer", r#"[office~"lawyer"]"#),
    ("lawyers", r#"[office~"lawyer"]"#),
    ("attorney", r#"[office~"lawyer"]"#),
    ("law firm", r#"[office~"lawyer"]"#),
    ("dentist", r#"[amenity~"dentist"]"#),
    ("dentists", r#"[amenity~"dentist"]"#),
    ("doctor", r#"[amenity~"doctors"]"#),
    ("medical", r#"[amenity~"clinic|doctors|hospital"]"#),
    ("accountant", r#"[office~"accountant"]"#),
    ("real estate", r#"[office~"estate_agent"]"#),
    ("insurance", r#"[office~"insurance"]"#),
    // Retail
    ("shop", "[shop]"),
    ("store", "[shop]"),
    ("grocery", r#"[shop~"supermarket|convenience"]"#),
    ("pharmacy", r#"[amenity~"pharmacy"]"#),
    ("gas station", r#"[amenity~"fuel"]"#),
    ("bank", r#"[amenity~"bank"]"#),
    ("atm", r#"[amenity~"atm"]"#),
    // Services
    ("hotel", r#"[tourism~"hotel"]"#),
    ("gym", r#"[leisure~"fitness_centre"]"#),
    ("fitness", r#"[leisure~"fitness_centre"]"#),
    ("salon", r#"[shop~"hairdresser|beauty"]"#),
    ("beauty", r#"[shop~"beauty|cosmetics"]"#),
    ("auto repair", r#"[shop~"car_repair"]"#),
    ("mechanic", r#"[shop~"car_repair"]"#),
    // Entertainment
    ("cinema", r#"[amenity~"cinema"]"#),
    ("theater", r#"[amenity~"theatre"]"#),
    ("museum", r#"[tourism~"museum"]"#),
];

/// Approximate boxes for when the geocoder can't help
const CITY_BOXES: &[(&str, BoundingBox)] = &[
    ("new york", BoundingBox::new(40.4774, -74.2591, 40.9176, -73.7004)),
    ("los angeles", BoundingBox::new(33.7037, -118.6681, 34.3373, -118.1553)),
    ("chicago", BoundingBox::new(41.6444, -87.9402, 42.0230, -87.5242)),
    ("las vegas", BoundingBox::new(36.0395, -115.3183, 36.2946, -114.9962)),
    ("miami", BoundingBox::new(25.7617, -80.4337, 25.8557, -80.1918)),
    ("san francisco", BoundingBox::new(37.7049, -122.5280, 37.8114, -122.3549)),
];

/// South, west, north, east in degrees (Overpass order)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self { south, west, north, east }
    }

    fn to_overpass(self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

#[derive(Deserialize)]
struct NominatimPlace {
    /// [south, north, west, east] as strings
    #[serde(default)]
    boundingbox: Vec<String>,
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

/// Free geographic database adapter
pub struct OpenStreetMapAdapter {
    client: reqwest::Client,
    overpass_url: String,
    nominatim_url: String,
    tag: SourceTag,
}

impl OpenStreetMapAdapter {
    pub fn new(config: &SourceConfig, user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(user_agent, config.timeout())?,
            overpass_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OVERPASS_URL.to_string()),
            nominatim_url: config
                .lookup_url
                .clone()
                .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            tag: SourceTag::new(SOURCE_NAME),
        })
    }

    /// Bounding box for a location, `None` when nobody knows the place
    async fn resolve_bbox(&self, location: &str) -> std::result::Result<Option<BoundingBox>, SourceUnavailable> {
        let request = self.client.get(&self.nominatim_url).query(&[
            ("q", location),
            ("format", "json"),
            ("limit", "1"),
        ]);

        let geocoded = match send_for_text(&self.tag, request).await {
            Ok(Some(body)) => parse_json::<Vec<NominatimPlace>>(&self.tag, &body)
                .map(|places| places.into_iter().next().and_then(|p| nominatim_bbox(&p.boundingbox))),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        match geocoded {
            Ok(Some(bbox)) => Ok(Some(bbox)),
            Ok(None) => Ok(city_bbox(location)),
            Err(e) => match city_bbox(location) {
                Some(bbox) => {
                    warn!(error = %e, location = location, "Geocoder failed, using built-in city box");
                    Ok(Some(bbox))
                }
                None => Err(e),
            },
        }
    }
}

#[async_trait]
impl SourceAdapter for OpenStreetMapAdapter {
    fn tag(&self) -> SourceTag {
        self.tag.clone()
    }

    async fn fetch(&self, keyword: &str, location: Option<&str>, limit: usize) -> FetchResult {
        let Some(location) = location else {
            debug!("No location given, skipping map search");
            return Ok(Vec::new());
        };

        let Some(bbox) = self.resolve_bbox(location).await? else {
            warn!(location = location, "Could not resolve a bounding box");
            return Ok(Vec::new());
        };

        let query = overpass_query(&tag_filters(keyword), bbox, limit);
        let request = self
            .client
            .post(&self.overpass_url)
            .header("Content-Type", "text/plain")
            .body(query);

        let Some(body) = send_for_text(&self.tag, request).await? else {
            return Ok(Vec::new());
        };
        let response: OverpassResponse = parse_json(&self.tag, &body)?;

        let records: Vec<RawRecord> = response
            .elements
            .into_iter()
            .filter_map(element_to_record)
            .take(limit)
            .collect();

        debug!(count = records.len(), "Overpass elements converted");
        Ok(records)
    }
}

/// Overpass tag filters for a keyword: exact match, then whole-word
/// partial match, then a shop category of the same name
pub fn tag_filters(keyword: &str) -> String {
    let term = keyword.trim().to_lowercase();

    if let Some((_, filters)) = TAG_FILTERS.iter().find(|(key, _)| *key == term) {
        return filters.to_string();
    }
    if let Some((_, filters)) = TAG_FILTERS
        .iter()
        .find(|(key, _)| contains_words(&term, key) || contains_words(key, &term))
    {
        return filters.to_string();
    }

    let escaped = term.replace('\\', "\\\\").replace('"', "\\\"");
    format!(r#"[shop~"{}"]"#, escaped)
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

fn overpass_query(filters: &str, bbox: BoundingBox, limit: usize) -> String {
    let bbox = bbox.to_overpass();
    format!(
        "[out:json][timeout:25];\n(\n  node{f}[\"name\"]({b});\n  way{f}[\"name\"]({b});\n  relation{f}[\"name\"]({b});\n);\nout center {limit};",
        f = filters,
        b = bbox,
        limit = limit,
    )
}

fn nominatim_bbox(raw: &[String]) -> Option<BoundingBox> {
    let values: Vec<f64> = raw.iter().filter_map(|v| v.parse().ok()).collect();
    match values.as_slice() {
        [south, north, west, east] => Some(BoundingBox::new(*south, *west, *north, *east)),
        _ => None,
    }
}

fn city_bbox(location: &str) -> Option<BoundingBox> {
    let location = location.to_lowercase();
    CITY_BOXES
        .iter()
        .find(|(city, _)| location.contains(city))
        .map(|(_, bbox)| *bbox)
}

fn element_to_record(element: OverpassElement) -> Option<RawRecord> {
    let tags = &element.tags;
    let tag = |key: &str| clean_field(tags.get(key).map(String::as_str));

    let name = tag("name")?;

    let street = [tag("addr:housenumber"), tag("addr:street")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let region = [tag("addr:state"), tag("addr:postcode")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let address = [Some(street), tag("addr:city"), Some(region)]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let mut record = RawRecord::named(name);
    record.address = clean_field(Some(address.as_str()));
    record.phone = tag("phone").or_else(|| tag("contact:phone"));
    record.email = tag("email").or_else(|| tag("contact:email"));
    record.website = tag("website").or_else(|| tag("contact:website"));
    record.categories = business_type(tags).into_iter().collect();

    let (lat, lon) = match (&element.center, element.lat, element.lon) {
        (_, Some(lat), Some(lon)) => (Some(lat), Some(lon)),
        (Some(center), _, _) => (Some(center.lat), Some(center.lon)),
        _ => (None, None),
    };

    record.extra.insert("osm_id".into(), json!(element.id));
    record.extra.insert("osm_type".into(), json!(element.kind));
    if let (Some(lat), Some(lon)) = (lat, lon) {
        record.extra.insert("latitude".into(), json!(lat));
        record.extra.insert("longitude".into(), json!(lon));
    }
    for (key, field) in [("opening_hours", "opening_hours"), ("cuisine", "cuisine")] {
        if let Some(value) = tag(key) {
            record.extra.insert(field.into(), json!(value));
        }
    }

    Some(record)
}

fn business_type(tags: &HashMap<String, String>) -> Option<String> {
    let pretty = |value: &str| value.replace('_', " ");
    if let Some(amenity) = tags.get("amenity") {
        Some(pretty(amenity))
    } else if let Some(shop) = tags.get("shop") {
        Some(format!("{} shop", pretty(shop)))
    } else if let Some(office) = tags.get("office") {
        Some(format!("{} office", pretty(office)))
    } else {
        tags.get("tourism").map(|t| pretty(t))
    }
}
