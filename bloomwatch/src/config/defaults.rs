//! Default values for every configuration key.

use super::settings::*;
use crate::aggregate::{
    DEFAULT_AGGREGATION_TIMEOUT_SECS, DEFAULT_VIEW_CACHE_MAX_ENTRIES, DEFAULT_VIEW_CACHE_TTL_SECS,
};
use crate::cache::DEFAULT_BBOX_PRECISION;
use crate::geo::{DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, DEFAULT_ZOOM};
use crate::geocode::DEFAULT_GEOCODER_URL;
use crate::inference::DEFAULT_INFERENCE_TIMEOUT_SECS;
use crate::layers::{DEFAULT_CATALOG_TTL_SECS, DEFAULT_LAYER_CATALOG_URL};
use crate::scenes::{
    DEFAULT_COLLECTIONS, DEFAULT_MAX_CLOUD_COVER_PCT, DEFAULT_MAX_SCENES, DEFAULT_PAGE_SIZE,
    DEFAULT_SATELLITE_CATALOG_URL,
};
use crate::upstream::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES,
};

/// Highest zoom level accepted in `[validation]`.
pub const MAX_SUPPORTED_ZOOM: u8 = 24;

/// Longest timeout or TTL accepted anywhere in the configuration (one year).
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE: &str = "bloomwatch.log";

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            upstream: UpstreamSettings {
                layer_catalog_url: DEFAULT_LAYER_CATALOG_URL.to_string(),
                satellite_catalog_url: DEFAULT_SATELLITE_CATALOG_URL.to_string(),
                inference_endpoint_url: None,
                inference_token: None,
                geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
                http_timeout: DEFAULT_HTTP_TIMEOUT_SECS,
                inference_timeout: DEFAULT_INFERENCE_TIMEOUT_SECS,
            },
            cache: CacheSettings {
                ttl: DEFAULT_VIEW_CACHE_TTL_SECS,
                max_entries: DEFAULT_VIEW_CACHE_MAX_ENTRIES,
                catalog_ttl: DEFAULT_CATALOG_TTL_SECS,
                bbox_precision: DEFAULT_BBOX_PRECISION,
            },
            scenes: SceneSettings {
                max_cloud_cover_pct: DEFAULT_MAX_CLOUD_COVER_PCT,
                max_results: DEFAULT_MAX_SCENES,
                page_size: DEFAULT_PAGE_SIZE,
                collections: DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
            },
            aggregation: AggregationSettings {
                timeout: DEFAULT_AGGREGATION_TIMEOUT_SECS,
            },
            validation: ValidationSettings {
                min_zoom: DEFAULT_MIN_ZOOM,
                max_zoom: DEFAULT_MAX_ZOOM,
                default_zoom: DEFAULT_ZOOM,
            },
            retry: RetrySettings {
                max_retries: DEFAULT_MAX_RETRIES,
                base_delay_ms: DEFAULT_BASE_DELAY_MS,
                max_delay_ms: DEFAULT_MAX_DELAY_MS,
                jitter: true,
            },
            logging: LoggingSettings {
                file: config_dir.join("logs").join(DEFAULT_LOG_FILE),
                stdout: false,
                debug: false,
            },
        }
    }
}
