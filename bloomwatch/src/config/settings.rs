//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// External service endpoints
    pub upstream: UpstreamSettings,
    /// View cache settings
    pub cache: CacheSettings,
    /// Satellite scene search settings
    pub scenes: SceneSettings,
    pub aggregation: AggregationSettings,
    pub validation: ValidationSettings,
    /// Retry behaviour for catalog requests
    pub retry: RetrySettings,
    pub logging: LoggingSettings,
}

/// Upstream service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSettings {
    /// WMS GetCapabilities (or JSON catalog) URL
    pub layer_catalog_url: String,
    /// STAC Item Search URL
    pub satellite_catalog_url: String,
    /// Classification endpoint; classification is disabled when unset
    pub inference_endpoint_url: Option<String>,
    /// Bearer token sent to the inference endpoint
    pub inference_token: Option<String>,
    /// Nominatim-compatible search URL used to resolve addresses
    pub geocoder_url: String,
    /// Per-request timeout for catalog requests (seconds)
    pub http_timeout: u64,
    /// Per-request timeout for inference requests (seconds)
    pub inference_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// View time-to-live (seconds)
    pub ttl: u64,
    /// Maximum cached views
    pub max_entries: usize,
    /// Layer catalog refresh interval (seconds)
    pub catalog_ttl: u64,
    /// Decimal places kept when rounding bbox edges for cache keys
    pub bbox_precision: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSettings {
    /// Scenes cloudier than this are dropped (percent)
    pub max_cloud_cover_pct: f64,
    /// Maximum scenes per view
    pub max_results: usize,
    /// Items requested per catalog page
    pub page_size: u32,
    /// Collections to search; empty searches all
    pub collections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSettings {
    /// Overall deadline for one view build (seconds)
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSettings {
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Zoom used when a query does not give one
    pub default_zoom: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Add up to 25% random delay to each backoff
    pub jitter: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
    /// Also log to stdout
    pub stdout: bool,
    /// Force debug level regardless of RUST_LOG
    pub debug: bool,
}
