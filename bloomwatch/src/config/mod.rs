//! Configuration for the bloomwatch pipeline.
//!
//! [`ConfigFile`] is loaded from `~/.bloomwatch/config.ini` (one struct per
//! INI section) and then overridden from the environment:
//!
//! | Variable | Setting |
//! |---|---|
//! | `LAYER_CATALOG_URL` | `upstream.layer_catalog_url` |
//! | `SATELLITE_CATALOG_URL` | `upstream.satellite_catalog_url` |
//! | `INFERENCE_ENDPOINT_URL` | `upstream.inference_endpoint_url` |
//! | `CACHE_TTL_SECONDS` | `cache.ttl` |
//! | `CACHE_MAX_ENTRIES` | `cache.max_entries` |
//! | `MAX_CLOUD_COVER_PCT` | `scenes.max_cloud_cover_pct` |
//! | `AGGREGATION_TIMEOUT_SECONDS` | `aggregation.timeout` |

mod defaults;
mod env;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{DEFAULT_LOG_FILE, MAX_DURATION_SECS, MAX_SUPPORTED_ZOOM};
pub use env::{
    ENV_AGGREGATION_TIMEOUT_SECONDS, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_TTL_SECONDS,
    ENV_INFERENCE_ENDPOINT_URL, ENV_LAYER_CATALOG_URL, ENV_MAX_CLOUD_COVER_PCT, ENV_OVERRIDES,
    ENV_SATELLITE_CATALOG_URL,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    AggregationSettings, CacheSettings, ConfigFile, LoggingSettings, RetrySettings,
    SceneSettings, UpstreamSettings, ValidationSettings,
};

impl ConfigFile {
    /// The effective configuration rendered as INI text.
    pub fn to_ini_string(&self) -> String {
        writer::to_config_string(self)
    }
}
