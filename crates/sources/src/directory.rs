//! Business directory scraper (YellowPages-style result cards)

use crate::http::{build_client, selector, send_for_text, squash_whitespace, BotWall};
use crate::{FetchResult, SourceAdapter};
use async_trait::async_trait;
use leadforge_common::records::clean_field;
use leadforge_common::{config::SourceConfig, RawRecord, Result, SourceTag};
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub const SOURCE_NAME: &str = "directory";

const DEFAULT_DIRECTORY_URL: &str = "https://www.yellowpages.com";

/// Nationwide search when the request names no location
const NATIONWIDE: &str = "USA";

const RATING_WORDS: &[(&str, f64)] = &[
    ("one", 1.0),
    ("two", 2.0),
    ("three", 3.0),
    ("four", 4.0),
    ("five", 5.0),
];

struct CardSelectors {
    card: Selector,
    name: Selector,
    phone: Selector,
    street: Selector,
    locality: Selector,
    website: Selector,
    categories: Selector,
    rating: Selector,
    review_count: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            card: selector("div.result")?,
            name: selector("a.business-name")?,
            phone: selector("div.phones")?,
            street: selector("div.street-address")?,
            locality: selector("div.locality")?,
            website: selector("a.track-visit-website")?,
            categories: selector("div.categories a")?,
            rating: selector("div.result-rating")?,
            review_count: selector("span.count")?,
        })
    }
}

/// Directory listing adapter
pub struct DirectoryAdapter {
    client: reqwest::Client,
    base_url: String,
    selectors: CardSelectors,
    wall: BotWall,
    tag: SourceTag,
}

impl DirectoryAdapter {
    pub fn new(config: &SourceConfig, user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(user_agent, config.timeout())?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string()),
            selectors: CardSelectors::new()?,
            wall: BotWall::new()?,
            tag: SourceTag::new(SOURCE_NAME),
        })
    }

    fn parse_cards(&self, html: &str, limit: usize) -> Vec<RawRecord> {
        let document = Html::parse_document(html);

        document
            .select(&self.selectors.card)
            .filter_map(|card| self.card_to_record(card))
            .take(limit)
            .collect()
    }

    fn card_to_record(&self, card: ElementRef<'_>) -> Option<RawRecord> {
        let s = &self.selectors;
        let text_of = |sel: &Selector| card.select(sel).next().and_then(element_text);

        let mut record = RawRecord::named(text_of(&s.name)?);
        record.phone = text_of(&s.phone);

        let address = [text_of(&s.street), text_of(&s.locality)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        record.address = clean_field(Some(address.as_str()));

        record.website = card
            .select(&s.website)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| self.absolute_link(href));

        record.categories = card
            .select(&s.categories)
            .filter_map(element_text)
            .collect();

        record.rating = card
            .select(&s.rating)
            .next()
            .and_then(|el| rating_from_classes(el.value().classes()));

        record.review_count = card
            .select(&s.review_count)
            .next()
            .and_then(|el| {
                let digits: String = el.text().collect::<String>().chars().filter(char::is_ascii_digit).collect();
                digits.parse().ok()
            });

        Some(record)
    }

    fn absolute_link(&self, href: &str) -> Option<String> {
        let base = Url::parse(&self.base_url).ok()?;
        base.join(href).ok().map(|url| url.to_string())
    }
}

#[async_trait]
impl SourceAdapter for DirectoryAdapter {
    fn tag(&self) -> SourceTag {
        self.tag.clone()
    }

    async fn fetch(&self, keyword: &str, location: Option<&str>, limit: usize) -> FetchResult {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let request = self.client.get(&url).query(&[
            ("search_terms", keyword),
            ("geo_location_terms", location.unwrap_or(NATIONWIDE)),
        ]);

        let Some(body) = send_for_text(&self.tag, request).await? else {
            return Ok(Vec::new());
        };

        let cards = self.parse_cards(&body, limit);
        if cards.is_empty() {
            self.wall.check(&self.tag, &body)?;
        }
        Ok(cards)
    }
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = squash_whitespace(&element.text().collect::<String>());
    clean_field(Some(text.as_str()))
}

/// Star rating from class names such as `result-rating four half`
fn rating_from_classes<'a>(classes: impl Iterator<Item = &'a str>) -> Option<f64> {
    let mut stars = None;
    let mut half = false;
    for class in classes {
        if let Some((_, value)) = RATING_WORDS.iter().find(|(word, _)| *word == class) {
            stars = Some(*value);
        } else if class == "half" {
            half = true;
        }
    }
    stars.map(|s| if half { s + 0.5 } else { s })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="search-results organic">
          <div class="result" id="lid-1">
            <a class="business-name" href="/miami-fl/mip/bright-smiles-1"><span>Bright Smiles Dental</span></a>
            <div class="result-rating four half"><span class="count">(37)</span></div>
            <div class="categories"><a href="/c/dentists">Dentists</a><a href="/c/ortho">Orthodontists</a></div>
            <div class="phones phone primary">(305) 555-0100</div>
            <div class="adr">
              <div class="street-address">100 Main St</div>
              <div class="locality">Miami, FL 33101</div>
            </div>
            <a class="track-visit-website" href="https://brightsmiles.test">Website</a>
          </div>
          <div class="result" id="lid-2">
            <a class="business-name"><span>Coral Dental</span></a>
            <div class="phones phone primary">Not available</div>
          </div>
          <div class="result" id="lid-3">
            <div class="phones">(305) 555-0199</div>
          </div>
        </div>
    "#;

    fn adapter() -> DirectoryAdapter {
        DirectoryAdapter::new(&SourceConfig::default(), "test-agent").unwrap()
    }

    #[test]
    fn test_parse_cards() {
        let records = adapter().parse_cards(PAGE, 10);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.name, "Bright Smiles Dental");
        assert_eq!(first.address.as_deref(), Some("100 Main St, Miami, FL 33101"));
        assert_eq!(first.phone.as_deref(), Some("(305) 555-0100"));
        assert_eq!(first.website.as_deref(), Some("https://brightsmiles.test/"));
        assert_eq!(first.rating, Some(4.5));
        assert_eq!(first.review_count, Some(37));
        assert_eq!(first.categories, vec!["Dentists", "Orthodontists"]);

        let second = &records[1];
        assert_eq!(second.phone, None);
        assert_eq!(second.address, None);
        assert_eq!(second.completeness(), 0);
    }

    #[test]
    fn test_rating_from_classes() {
        assert_eq!(rating_from_classes(["result-rating", "three"].into_iter()), Some(3.0));
        assert_eq!(rating_from_classes(["result-rating"].into_iter()), None);
    }
}
