//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::{MAX_DURATION_SECS, MAX_SUPPORTED_ZOOM};
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [upstream] section
    if let Some(section) = ini.section(Some("upstream")) {
        if let Some(v) = section.get("layer_catalog_url") {
            config.upstream.layer_catalog_url = parse_url("upstream", "layer_catalog_url", v)?;
        }
        if let Some(v) = section.get("satellite_catalog_url") {
            config.upstream.satellite_catalog_url =
                parse_url("upstream", "satellite_catalog_url", v)?;
        }
        if let Some(v) = section.get("inference_endpoint_url") {
            config.upstream.inference_endpoint_url = if v.trim().is_empty() {
                None
            } else {
                Some(parse_url("upstream", "inference_endpoint_url", v)?)
            };
        }
        if let Some(v) = section.get("inference_token") {
            let v = v.trim();
            config.upstream.inference_token = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = section.get("geocoder_url") {
            config.upstream.geocoder_url = parse_url("upstream", "geocoder_url", v)?;
        }
        if let Some(v) = section.get("http_timeout") {
            config.upstream.http_timeout =
                parse_seconds("upstream", "http_timeout", v)?;
        }
        if let Some(v) = section.get("inference_timeout") {
            config.upstream.inference_timeout = parse_seconds("upstream", "inference_timeout", v)?;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("ttl") {
            config.cache.ttl = parse_seconds("cache", "ttl", v)?;
        }
        if let Some(v) = section.get("max_entries") {
            config.cache.max_entries =
                parse_positive("cache", "max_entries", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("catalog_ttl") {
            config.cache.catalog_ttl = parse_seconds("cache", "catalog_ttl", v)?;
        }
        if let Some(v) = section.get("bbox_precision") {
            let precision: u32 =
                parse_number("cache", "bbox_precision", v, "must be an integer from 0 to 8")?;
            if precision > 8 {
                return Err(invalid("cache", "bbox_precision", v, "must be an integer from 0 to 8"));
            }
            config.cache.bbox_precision = precision;
        }
    }

    // [scenes] section
    if let Some(section) = ini.section(Some("scenes")) {
        if let Some(v) = section.get("max_cloud_cover_pct") {
            config.scenes.max_cloud_cover_pct = parse_cloud_cover("scenes", "max_cloud_cover_pct", v)?;
        }
        if let Some(v) = section.get("max_results") {
            config.scenes.max_results =
                parse_positive("scenes", "max_results", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("page_size") {
            config.scenes.page_size =
                parse_positive("scenes", "page_size", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("collections") {
            config.scenes.collections = parse_list(v);
        }
    }

    // [aggregation] section
    if let Some(section) = ini.section(Some("aggregation")) {
        if let Some(v) = section.get("timeout") {
            config.aggregation.timeout = parse_seconds("aggregation", "timeout", v)?;
        }
    }

    // [validation] section
    if let Some(section) = ini.section(Some("validation")) {
        for (key, slot) in [
            ("min_zoom", &mut config.validation.min_zoom),
            ("max_zoom", &mut config.validation.max_zoom),
            ("default_zoom", &mut config.validation.default_zoom),
        ] {
            if let Some(v) = section.get(key) {
                *slot = parse_zoom("validation", key, v)?;
            }
        }
        if config.validation.min_zoom > config.validation.max_zoom {
            return Err(invalid(
                "validation",
                "min_zoom",
                &config.validation.min_zoom.to_string(),
                "must not exceed max_zoom",
            ));
        }
    }

    // [retry] section
    if let Some(section) = ini.section(Some("retry")) {
        if let Some(v) = section.get("max_retries") {
            config.retry.max_retries =
                parse_number("retry", "max_retries", v, "must be a non-negative integer")?;
        }
        if let Some(v) = section.get("base_delay_ms") {
            config.retry.base_delay_ms =
                parse_number("retry", "base_delay_ms", v, "must be a non-negative integer (ms)")?;
        }
        if let Some(v) = section.get("max_delay_ms") {
            config.retry.max_delay_ms =
                parse_number("retry", "max_delay_ms", v, "must be a non-negative integer (ms)")?;
        }
        if let Some(v) = section.get("jitter") {
            config.retry.jitter = parse_bool(v);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("stdout") {
            config.logging.stdout = parse_bool(v);
        }
        if let Some(v) = section.get("debug") {
            config.logging.debug = parse_bool(v);
        }
    }

    Ok(config)
}

pub(super) fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub(super) fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

/// Parses an integer that must be greater than zero.
pub(super) fn parse_positive<T>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    let n: T = parse_number(section, key, value, reason)?;
    if n <= T::default() {
        return Err(invalid(section, key, value, reason));
    }
    Ok(n)
}

/// Parses a timeout or TTL: whole seconds, from 1 up to [`MAX_DURATION_SECS`].
pub(super) fn parse_seconds(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    const REASON: &str = "must be a positive integer (seconds), at most one year";
    let secs: u64 = parse_positive(section, key, value, REASON)?;
    if secs > MAX_DURATION_SECS {
        return Err(invalid(section, key, value, REASON));
    }
    Ok(secs)
}

pub(super) fn parse_cloud_cover(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    const REASON: &str = "must be a percentage from 0 to 100";
    let pct: f64 = parse_number(section, key, value, REASON)?;
    if !(0.0..=100.0).contains(&pct) {
        return Err(invalid(section, key, value, REASON));
    }
    Ok(pct)
}

fn parse_zoom(section: &str, key: &str, value: &str) -> Result<u8, ConfigFileError> {
    let reason = format!("must be an integer from 0 to {}", MAX_SUPPORTED_ZOOM);
    let zoom: u8 = parse_number(section, key, value, &reason)?;
    if zoom > MAX_SUPPORTED_ZOOM {
        return Err(invalid(section, key, value, &reason));
    }
    Ok(zoom)
}

pub(super) fn parse_url(section: &str, key: &str, value: &str) -> Result<String, ConfigFileError> {
    let v = value.trim();
    if v.starts_with("http://") || v.starts_with("https://") {
        Ok(v.to_string())
    } else {
        Err(invalid(section, key, value, "must be an http:// or https:// URL"))
    }
}

/// Comma-separated list, blanks dropped.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a boolean value from config.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    fn parse(text: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(text).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_overlays_values() {
        let config = parse(
            "[upstream]\n\
             inference_endpoint_url = https://infer.test/classify\n\
             inference_token = abc\n\
             geocoder_url = https://geo.test/search\n\
             [cache]\n\
             ttl = 60\n\
             max_entries = 10\n\
             [scenes]\n\
             max_cloud_cover_pct = 20.5\n\
             collections = HLSS30.v2.0, \n\
             [aggregation]\n\
             timeout = 5\n\
             [retry]\n\
             max_retries = 0\n\
             jitter = off\n\
             [logging]\n\
             stdout = yes\n",
        )
        .unwrap();

        assert_eq!(
            config.upstream.inference_endpoint_url.as_deref(),
            Some("https://infer.test/classify")
        );
        assert_eq!(config.upstream.inference_token.as_deref(), Some("abc"));
        assert_eq!(config.upstream.geocoder_url, "https://geo.test/search");
        assert_eq!(config.cache.ttl, 60);
        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.scenes.max_cloud_cover_pct, 20.5);
        assert_eq!(config.scenes.collections, vec!["HLSS30.v2.0"]);
        assert_eq!(config.aggregation.timeout, 5);
        assert_eq!(config.retry.max_retries, 0);
        assert!(!config.retry.jitter);
        assert!(config.logging.stdout);
        assert_eq!(config.scenes.page_size, crate::scenes::DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_non_numeric_rejected() {
        let err = parse("[cache]\nttl = soon\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, value, .. } => {
                assert_eq!(section, "cache");
                assert_eq!(key, "ttl");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_zero_rejected_where_positive_required() {
        assert!(parse("[cache]\nmax_entries = 0\n").is_err());
        assert!(parse("[aggregation]\ntimeout = 0\n").is_err());
    }

    #[test]
    fn test_durations_capped_at_one_year() {
        let config = parse("[cache]\nttl = 31536000\n").unwrap();
        assert_eq!(config.cache.ttl, MAX_DURATION_SECS);

        assert!(parse("[cache]\nttl = 31536001\n").is_err());
        assert!(parse("[cache]\ncatalog_ttl = 18446744073709551615\n").is_err());
        assert!(parse("[aggregation]\ntimeout = 18446744073709551615\n").is_err());
        assert!(parse("[upstream]\nhttp_timeout = 99999999999\n").is_err());
    }

    #[test]
    fn test_cloud_cover_range() {
        assert!(parse("[scenes]\nmax_cloud_cover_pct = 101\n").is_err());
        assert!(parse("[scenes]\nmax_cloud_cover_pct = -1\n").is_err());
        assert_eq!(
            parse("[scenes]\nmax_cloud_cover_pct = 0\n")
                .unwrap()
                .scenes
                .max_cloud_cover_pct,
            0.0
        );
    }

    #[test]
    fn test_zoom_bounds() {
        assert!(parse("[validation]\nmax_zoom = 30\n").is_err());
        assert!(parse("[validation]\nmin_zoom = 10\nmax_zoom = 5\n").is_err());
        let config = parse("[validation]\nmax_zoom = 12\n").unwrap();
        assert_eq!(config.validation.max_zoom, 12);
        assert_eq!(config.validation.min_zoom, 0);
    }

    #[test]
    fn test_url_must_be_http() {
        assert!(parse("[upstream]\nlayer_catalog_url = ftp://x\n").is_err());
        let config = parse("[upstream]\ninference_endpoint_url =\n").unwrap();
        assert!(config.upstream.inference_endpoint_url.is_none());
    }

    #[test]
    fn test_bbox_precision_bound() {
        assert!(parse("[cache]\nbbox_precision = 12\n").is_err());
        assert_eq!(parse("[cache]\nbbox_precision = 2\n").unwrap().cache.bbox_precision, 2);
    }

    #[test]
    fn test_logging_file_tilde_expanded() {
        let config = parse("[logging]\nfile = ~/logs/bw.log\n").unwrap();
        if dirs::home_dir().is_some() {
            assert!(!config.logging.file.starts_with("~"));
        }
        assert!(config.logging.file.ends_with("logs/bw.log"));
        assert!(!parse("").unwrap().logging.file.as_os_str().is_empty());
        assert!(DEFAULT_LOG_FILE.ends_with(".log"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" on "));
        assert!(!parse_bool("nope"));
    }
}
