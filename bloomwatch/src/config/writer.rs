//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let inference_endpoint_url = config.upstream.inference_endpoint_url.as_deref().unwrap_or("");
    let inference_token = config.upstream.inference_token.as_deref().unwrap_or("");
    let collections = config.scenes.collections.join(", ");

    format!(
        r#"[upstream]
; WMS GetCapabilities URL of the tile service (overridden by LAYER_CATALOG_URL)
layer_catalog_url = {layer_catalog_url}
; STAC Item Search URL (overridden by SATELLITE_CATALOG_URL)
satellite_catalog_url = {satellite_catalog_url}
; Image classification endpoint; leave empty to disable (overridden by INFERENCE_ENDPOINT_URL)
inference_endpoint_url = {inference_endpoint_url}
; Bearer token for the inference endpoint (optional)
inference_token = {inference_token}
; Address search service used by `view --near`
geocoder_url = {geocoder_url}
; Per-request timeouts in seconds
http_timeout = {http_timeout}
inference_timeout = {inference_timeout}

[cache]
; Seconds a complete view stays cached (overridden by CACHE_TTL_SECONDS)
ttl = {ttl}
; Maximum cached views (overridden by CACHE_MAX_ENTRIES)
max_entries = {max_entries}
; Seconds between layer catalog refreshes
catalog_ttl = {catalog_ttl}
; Decimal places of bbox edges that distinguish cached views
bbox_precision = {bbox_precision}

[scenes]
; Drop scenes cloudier than this percentage (overridden by MAX_CLOUD_COVER_PCT)
max_cloud_cover_pct = {max_cloud_cover_pct}
max_results = {max_results}
page_size = {page_size}
; Comma-separated STAC collections; empty searches all
collections = {collections}

[aggregation]
; Seconds to wait for all sources (overridden by AGGREGATION_TIMEOUT_SECONDS)
timeout = {aggregation_timeout}

[validation]
min_zoom = {min_zoom}
max_zoom = {max_zoom}
default_zoom = {default_zoom}

[retry]
max_retries = {max_retries}
base_delay_ms = {base_delay_ms}
max_delay_ms = {max_delay_ms}
jitter = {jitter}

[logging]
file = {log_file}
stdout = {stdout}
debug = {debug}
"#,
        layer_catalog_url = config.upstream.layer_catalog_url,
        satellite_catalog_url = config.upstream.satellite_catalog_url,
        geocoder_url = config.upstream.geocoder_url,
        http_timeout = config.upstream.http_timeout,
        inference_timeout = config.upstream.inference_timeout,
        ttl = config.cache.ttl,
        max_entries = config.cache.max_entries,
        catalog_ttl = config.cache.catalog_ttl,
        bbox_precision = config.cache.bbox_precision,
        max_cloud_cover_pct = config.scenes.max_cloud_cover_pct,
        max_results = config.scenes.max_results,
        page_size = config.scenes.page_size,
        aggregation_timeout = config.aggregation.timeout,
        min_zoom = config.validation.min_zoom,
        max_zoom = config.validation.max_zoom,
        default_zoom = config.validation.default_zoom,
        max_retries = config.retry.max_retries,
        base_delay_ms = config.retry.base_delay_ms,
        max_delay_ms = config.retry.max_delay_ms,
        jitter = config.retry.jitter,
        log_file = path_to_string(&config.logging.file),
        stdout = config.logging.stdout,
        debug = config.logging.debug,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_section_written() {
        let text = to_config_string(&ConfigFile::default());
        for section in [
            "[upstream]",
            "[cache]",
            "[scenes]",
            "[aggregation]",
            "[validation]",
            "[retry]",
            "[logging]",
        ] {
            assert!(text.contains(section), "missing {}", section);
        }
        assert!(text.contains("inference_endpoint_url = \n"));
    }
}
