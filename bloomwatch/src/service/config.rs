//! Translation from the INI configuration to component settings.

use crate::aggregate::AggregatorConfig;
use crate::config::{ConfigFile, RetrySettings, ValidationSettings};
use crate::geo::ValidationConfig;
use crate::upstream::RetryPolicy;
use std::time::Duration;

/// Retry policy shared by both catalog clients.
pub fn retry_policy(settings: &RetrySettings) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(settings.max_retries)
        .with_base_delay(Duration::from_millis(settings.base_delay_ms))
        .with_max_delay(Duration::from_millis(settings.max_delay_ms))
        .with_jitter(settings.jitter)
}

pub fn validation_config(settings: &ValidationSettings) -> ValidationConfig {
    ValidationConfig::new(settings.min_zoom, settings.max_zoom)
        .with_default_zoom(settings.default_zoom)
}

/// Aggregator settings drawn from `[cache]`, `[scenes]`, `[aggregation]`
/// and `[validation]`.
pub fn aggregator_config(config: &ConfigFile) -> AggregatorConfig {
    AggregatorConfig::default()
        .with_cache_ttl(Duration::from_secs(config.cache.ttl))
        .with_cache_max_entries(config.cache.max_entries)
        .with_timeout(Duration::from_secs(config.aggregation.timeout))
        .with_max_cloud_cover_pct(config.scenes.max_cloud_cover_pct)
        .with_max_scenes(config.scenes.max_results)
        .with_bbox_precision(config.cache.bbox_precision)
        .with_validation(validation_config(&config.validation))
}

/// `None` searches every collection the catalog holds.
pub fn collections(config: &ConfigFile) -> Option<Vec<String>> {
    let collections = &config.scenes.collections;
    (!collections.is_empty()).then(|| collections.clone())
}
