//! LeadForge data sources
//!
//! Provides a unified interface over heterogeneous listing providers:
//! - OpenStreetMap (Nominatim + Overpass), free geographic database
//! - Maps search API (keyed JSON API)
//! - Web search results scraper
//! - Business directory scraper
//!
//! Adapters never retry and never sleep; spacing, budgets and backoff
//! belong to the pipeline's retry layer.

pub mod directory;
pub mod http;
pub mod mock;
pub mod openstreetmap;
pub mod serp_maps;
pub mod web_search;

pub use directory::DirectoryAdapter;
pub use mock::{MockAdapter, MockStep};
pub use openstreetmap::OpenStreetMapAdapter;
pub use serp_maps::SerpMapsAdapter;
pub use web_search::WebSearchAdapter;

use async_trait::async_trait;
use leadforge_common::{
    config::{SourceConfig, SourcesConfig},
    AppError, RawRecord, Result, SourceTag, SourceUnavailable,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a single fetch
pub type FetchResult = std::result::Result<Vec<RawRecord>, SourceUnavailable>;

/// Trait for listing sources
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Tag stamped on every record this adapter produces
    fn tag(&self) -> SourceTag;

    /// Fetch at most `limit` raw records.
    ///
    /// "No results" is `Ok(vec![])`; conditions the caller must react to
    /// are a typed `SourceUnavailable`.
    async fn fetch(&self, keyword: &str, location: Option<&str>, limit: usize) -> FetchResult;
}

/// Create one adapter by name
pub fn create_adapter(
    name: &str,
    config: &SourceConfig,
    user_agent: &str,
) -> Result<Arc<dyn SourceAdapter>> {
    let user_agent = config.user_agent.as_deref().unwrap_or(user_agent);

    let adapter: Arc<dyn SourceAdapter> = match name {
        openstreetmap::SOURCE_NAME => Arc::new(OpenStreetMapAdapter::new(config, user_agent)?),
        serp_maps::SOURCE_NAME => Arc::new(SerpMapsAdapter::new(config, user_agent)?),
        web_search::SOURCE_NAME => Arc::new(WebSearchAdapter::new(config, user_agent)?),
        directory::SOURCE_NAME => Arc::new(DirectoryAdapter::new(config, user_agent)?),
        _ => {
            return Err(AppError::UnknownSource {
                name: name.to_string(),
            })
        }
    };
    Ok(adapter)
}

/// Instantiate the enabled adapters in configured order
pub fn build_adapters(
    sources: &SourcesConfig,
    user_agent: &str,
) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut seen = HashSet::new();
    let mut adapters = Vec::with_capacity(sources.order.len());

    for name in &sources.order {
        let name = name.trim();
        let config = sources.get(name).ok_or_else(|| AppError::UnknownSource {
            name: name.to_string(),
        })?;

        if !seen.insert(name) {
            return Err(AppError::Configuration {
                message: format!("source '{}' listed twice in sources.order", name),
            });
        }
        if !config.enabled {
            info!(source = name, "Source disabled, skipping");
            continue;
        }

        adapters.push(create_adapter(name, config, user_agent)?);
    }

    if adapters.is_empty() {
        warn!("No sources enabled; every search will come back empty");
    }
    info!(
        sources = ?adapters.iter().map(|a| a.tag().to_string()).collect::<Vec<_>>(),
        "Adapters initialized"
    );

    Ok(adapters)
}
