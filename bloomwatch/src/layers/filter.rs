//! Layer identifier filtering for catalog listings.

use regex::{Regex, RegexBuilder};
use std::str::FromStr;
use thiserror::Error;

/// How a filter pattern is matched against layer ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    /// Case-insensitive substring
    #[default]
    Contains,
    /// Case-insensitive prefix
    Prefix,
    /// Case-insensitive regular expression
    Regex,
}

impl FromStr for FilterMode {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "prefix" => Ok(Self::Prefix),
            "regex" => Ok(Self::Regex),
            other => Err(FilterError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown filter mode '{0}' (expected contains, prefix or regex)")]
    UnknownMode(String),

    #[error("invalid filter pattern: {0}")]
    InvalidPattern(String),
}

/// A compiled layer filter.
#[derive(Debug, Clone)]
pub struct LayerFilter {
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    All,
    Contains(String),
    Prefix(String),
    Regex(Regex),
}

impl LayerFilter {
    /// A filter that keeps every layer.
    pub fn all() -> Self {
        Self {
            matcher: Matcher::All,
        }
    }

    /// Compiles `pattern` for `mode`. An empty pattern matches everything.
    pub fn new(pattern: &str, mode: FilterMode) -> Result<Self, FilterError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Ok(Self::all());
        }
        let matcher = match mode {
            FilterMode::Contains => Matcher::Contains(pattern.to_lowercase()),
            FilterMode::Prefix => Matcher::Prefix(pattern.to_lowercase()),
            FilterMode::Regex => Matcher::Regex(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| FilterError::InvalidPattern(e.to_string()))?,
            ),
        };
        Ok(Self { matcher })
    }

    pub fn matches(&self, layer_id: &str) -> bool {
        match &self.matcher {
            Matcher::All => true,
            Matcher::Contains(p) => layer_id.to_lowercase().contains(p.as_str()),
            Matcher::Prefix(p) => layer_id.to_lowercase().starts_with(p.as_str()),
            Matcher::Regex(re) => re.is_match(layer_id),
        }
    }

    /// Sorted, de-duplicated ids that pass the filter.
    pub fn apply<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut out: Vec<String> = ids
            .into_iter()
            .filter(|id| self.matches(id))
            .map(String::from)
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

impl Default for LayerFilter {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDS: [&str; 4] = [
        "MODIS_Terra_NDVI_8Day",
        "MODIS_Aqua_CorrectedReflectance_TrueColor",
        "VIIRS_SNPP_NDVI",
        "BlueMarble_ShadedRelief",
    ];

    #[test]
    fn test_contains_is_case_insensitive() {
        let filter = LayerFilter::new("ndvi", FilterMode::Contains).unwrap();
        assert_eq!(
            filter.apply(IDS),
            vec!["MODIS_Terra_NDVI_8Day", "VIIRS_SNPP_NDVI"]
        );
    }

    #[test]
    fn test_prefix() {
        let filter = LayerFilter::new("modis_", FilterMode::Prefix).unwrap();
        assert_eq!(filter.apply(IDS).len(), 2);
    }

    #[test]
    fn test_regex() {
        let filter = LayerFilter::new(r"^(modis|viirs)_.*ndvi", FilterMode::Regex).unwrap();
        assert_eq!(filter.apply(IDS).len(), 2);
    }

    #[test]
    fn test_invalid_regex_is_error_not_panic() {
        let err = LayerFilter::new("([", FilterMode::Regex).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern(_)));
    }

    #[test]
    fn test_empty_pattern_keeps_all_sorted_unique() {
        let filter = LayerFilter::new("  ", FilterMode::Regex).unwrap();
        let mut ids = IDS.to_vec();
        ids.push("VIIRS_SNPP_NDVI");
        let out = filter.apply(ids);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], "BlueMarble_ShadedRelief");
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Prefix".parse::<FilterMode>().unwrap(), FilterMode::Prefix);
        assert!("fuzzy".parse::<FilterMode>().is_err());
    }
}
