//! Environment variable overrides, applied on top of the config file.

use super::file::ConfigFileError;
use super::parser::{parse_cloud_cover, parse_positive, parse_seconds, parse_url};
use super::settings::ConfigFile;
use tracing::debug;

pub const ENV_LAYER_CATALOG_URL: &str = "LAYER_CATALOG_URL";
pub const ENV_SATELLITE_CATALOG_URL: &str = "SATELLITE_CATALOG_URL";
pub const ENV_INFERENCE_ENDPOINT_URL: &str = "INFERENCE_ENDPOINT_URL";
pub const ENV_CACHE_TTL_SECONDS: &str = "CACHE_TTL_SECONDS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "CACHE_MAX_ENTRIES";
pub const ENV_MAX_CLOUD_COVER_PCT: &str = "MAX_CLOUD_COVER_PCT";
pub const ENV_AGGREGATION_TIMEOUT_SECONDS: &str = "AGGREGATION_TIMEOUT_SECONDS";

/// Every recognised variable, in the order they are applied.
pub const ENV_OVERRIDES: [&str; 7] = [
    ENV_LAYER_CATALOG_URL,
    ENV_SATELLITE_CATALOG_URL,
    ENV_INFERENCE_ENDPOINT_URL,
    ENV_CACHE_TTL_SECONDS,
    ENV_CACHE_MAX_ENTRIES,
    ENV_MAX_CLOUD_COVER_PCT,
    ENV_AGGREGATION_TIMEOUT_SECONDS,
];

/// Section name reported in errors for environment values.
const ENV_SECTION: &str = "env";

impl ConfigFile {
    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigFileError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`. Unset and blank variables are skipped.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigFileError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for name in ENV_OVERRIDES {
            let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            debug!(variable = name, "Applying environment override");

            match name {
                ENV_LAYER_CATALOG_URL => {
                    self.upstream.layer_catalog_url = parse_url(ENV_SECTION, name, &value)?;
                }
                ENV_SATELLITE_CATALOG_URL => {
                    self.upstream.satellite_catalog_url = parse_url(ENV_SECTION, name, &value)?;
                }
                ENV_INFERENCE_ENDPOINT_URL => {
                    self.upstream.inference_endpoint_url =
                        Some(parse_url(ENV_SECTION, name, &value)?);
                }
                ENV_CACHE_TTL_SECONDS => {
                    self.cache.ttl = parse_seconds(ENV_SECTION, name, &value)?;
                }
                ENV_CACHE_MAX_ENTRIES => {
                    self.cache.max_entries =
                        parse_positive(ENV_SECTION, name, &value, "must be a positive integer")?;
                }
                ENV_MAX_CLOUD_COVER_PCT => {
                    self.scenes.max_cloud_cover_pct = parse_cloud_cover(ENV_SECTION, name, &value)?;
                }
                ENV_AGGREGATION_TIMEOUT_SECONDS => {
                    self.aggregation.timeout = parse_seconds(ENV_SECTION, name, &value)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
