//! Configuration management for LeadForge
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with LEADFORGE__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Acquisition limits and identity
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Retry defaults shared by every source
    #[serde(default)]
    pub retry: RetryConfig,

    /// Ordered source list and per-source settings
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// Listings requested when the caller gives no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Largest limit a caller may ask for
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// User agent sent by every adapter unless overridden per source
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Attempts per source call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base; retry n waits base * 2^n
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Backoff cap
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Upper bound of the jitter added to each backoff (0 disables)
    #[serde(default)]
    pub jitter_ms: u64,

    /// Seed for the jitter generator
    #[serde(default)]
    pub jitter_seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    /// Cascade order; earlier sources are tried first
    #[serde(default = "default_source_order")]
    pub order: Vec<String>,

    #[serde(default = "default_openstreetmap", deserialize_with = "openstreetmap_section")]
    pub openstreetmap: SourceConfig,

    #[serde(default = "default_serp_maps", deserialize_with = "serp_maps_section")]
    pub serp_maps: SourceConfig,

    #[serde(default = "default_web_search", deserialize_with = "web_search_section")]
    pub web_search: SourceConfig,

    #[serde(default = "default_directory", deserialize_with = "directory_section")]
    pub directory: SourceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Disabled sources are skipped even when listed in `order`
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Endpoint override (adapter default when absent)
    pub base_url: Option<String>,

    /// Secondary endpoint, e.g. the geocoder for map sources
    pub lookup_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,

    /// Minimum spacing between two requests to this source
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,

    /// Request budget per hour (unlimited when absent or 0)
    pub hourly_limit: Option<u32>,

    /// Per-source user agent override
    pub user_agent: Option<String>,

    /// Credential for keyed APIs
    pub api_key: Option<Secret>,

    /// Per-source override of `retry.max_attempts`
    pub max_attempts: Option<u32>,

    /// Per-source override of `retry.base_delay_ms`
    pub base_delay_ms: Option<u64>,

    /// Per-source override of `retry.max_delay_ms`
    pub max_delay_ms: Option<u64>,
}

/// A `[sources.<name>]` section as written; absent keys keep the
/// source's own defaults rather than the generic `SourceConfig` ones
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SourceOverrides {
    enabled: Option<bool>,
    base_url: Option<String>,
    lookup_url: Option<String>,
    timeout_secs: Option<u64>,
    min_interval_ms: Option<u64>,
    hourly_limit: Option<u32>,
    user_agent: Option<String>,
    api_key: Option<Secret>,
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

impl SourceOverrides {
    fn apply(self, base: SourceConfig) -> SourceConfig {
        SourceConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            base_url: self.base_url.or(base.base_url),
            lookup_url: self.lookup_url.or(base.lookup_url),
            timeout_secs: self.timeout_secs.unwrap_or(base.timeout_secs),
            min_interval_ms: self.min_interval_ms.unwrap_or(base.min_interval_ms),
            hourly_limit: self.hourly_limit.or(base.hourly_limit),
            user_agent: self.user_agent.or(base.user_agent),
            api_key: self.api_key.or(base.api_key),
            max_attempts: self.max_attempts.or(base.max_attempts),
            base_delay_ms: self.base_delay_ms.or(base.base_delay_ms),
            max_delay_ms: self.max_delay_ms.or(base.max_delay_ms),
        }
    }
}

fn openstreetmap_section<'de, D: Deserializer<'de>>(d: D) -> Result<SourceConfig, D::Error> {
    SourceOverrides::deserialize(d).map(|o| o.apply(default_openstreetmap()))
}

fn serp_maps_section<'de, D: Deserializer<'de>>(d: D) -> Result<SourceConfig, D::Error> {
    SourceOverrides::deserialize(d).map(|o| o.apply(default_serp_maps()))
}

fn web_search_section<'de, D: Deserializer<'de>>(d: D) -> Result<SourceConfig, D::Error> {
    SourceOverrides::deserialize(d).map(|o| o.apply(default_web_search()))
}

fn directory_section<'de, D: Deserializer<'de>>(d: D) -> Result<SourceConfig, D::Error> {
    SourceOverrides::deserialize(d).map(|o| o.apply(default_directory()))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// A credential that never shows up in logs or serialized config
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for building requests only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

// Default value functions
fn default_limit() -> usize { crate::DEFAULT_LIMIT }
fn default_max_limit() -> usize { crate::MAX_LIMIT }
fn default_user_agent() -> String { format!("LeadForge/{} (business directory)", crate::VERSION) }
fn default_max_attempts() -> u32 { 3 }
fn default_base_delay() -> u64 { 500 }
fn default_max_delay() -> u64 { 8_000 }
fn default_enabled() -> bool { true }
fn default_source_timeout() -> u64 { 30 }
fn default_min_interval() -> u64 { 1_000 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "leadforge".to_string() }

fn default_source_order() -> Vec<String> {
    vec![
        "openstreetmap".to_string(),
        "web_search".to_string(),
        "directory".to_string(),
    ]
}

fn default_openstreetmap() -> SourceConfig {
    SourceConfig {
        min_interval_ms: 1_000,
        ..SourceConfig::default()
    }
}

fn default_serp_maps() -> SourceConfig {
    SourceConfig {
        min_interval_ms: 0,
        timeout_secs: 20,
        ..SourceConfig::default()
    }
}

fn default_web_search() -> SourceConfig {
    SourceConfig {
        min_interval_ms: 2_000,
        timeout_secs: 10,
        hourly_limit: Some(500),
        ..SourceConfig::default()
    }
}

fn default_directory() -> SourceConfig {
    SourceConfig {
        min_interval_ms: 1_500,
        timeout_secs: 15,
        hourly_limit: Some(1_000),
        ..SourceConfig::default()
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter_ms: 0,
            jitter_seed: None,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            order: default_source_order(),
            openstreetmap: default_openstreetmap(),
            serp_maps: default_serp_maps(),
            web_search: default_web_search(),
            directory: default_directory(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: None,
            lookup_url: None,
            timeout_secs: default_source_timeout(),
            min_interval_ms: default_min_interval(),
            hourly_limit: None,
            user_agent: None,
            api_key: None,
            max_attempts: None,
            base_delay_ms: None,
            max_delay_ms: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl SourcesConfig {
    /// Settings for a named source
    pub fn get(&self, name: &str) -> Option<&SourceConfig> {
        match name {
            "openstreetmap" => Some(&self.openstreetmap),
            "serp_maps" => Some(&self.serp_maps),
            "web_search" => Some(&self.web_search),
            "directory" => Some(&self.directory),
            _ => None,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with LEADFORGE__ prefix
            // e.g., LEADFORGE__SOURCES__SERP_MAPS__API_KEY=...
            .add_source(
                Environment::with_prefix("LEADFORGE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sources.order")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("LEADFORGE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sources.order")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Retry settings for a source, per-source overrides applied
    pub fn retry_policy_for(&self, source: &str) -> RetryConfig {
        let mut retry = self.retry.clone();
        if let Some(source) = self.sources.get(source) {
            if let Some(max_attempts) = source.max_attempts {
                retry.max_attempts = max_attempts;
            }
            if let Some(base_delay_ms) = source.base_delay_ms {
                retry.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = source.max_delay_ms {
                retry.max_delay_ms = max_delay_ms;
            }
        }
        retry
    }
}
