//! Query validation and normalization.
//!
//! Turns loosely typed user input into a [`GeoQuery`]. Everything here is a
//! pure transformation: no I/O, no clock, same input gives the same output.

use super::types::{BBox, DateRange, GeoQuery, ValidationError, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Default zoom range for tile requests.
pub const DEFAULT_MIN_ZOOM: u8 = 0;
pub const DEFAULT_MAX_ZOOM: u8 = 18;
/// Zoom used when the caller does not pass one.
pub const DEFAULT_ZOOM: u8 = 3;

/// Metres per degree of latitude (equirectangular approximation).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Bounds applied while normalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    min_zoom: u8,
    max_zoom: u8,
    default_zoom: u8,
}

impl ValidationConfig {
    /// Creates a config with the given zoom range.
    ///
    /// The bounds are swapped if given in the wrong order.
    pub fn new(min_zoom: u8, max_zoom: u8) -> Self {
        let (min_zoom, max_zoom) = if min_zoom <= max_zoom {
            (min_zoom, max_zoom)
        } else {
            (max_zoom, min_zoom)
        };
        Self {
            min_zoom,
            max_zoom,
            default_zoom: DEFAULT_ZOOM.clamp(min_zoom, max_zoom),
        }
    }

    /// Zoom used when the raw query has none.
    pub fn with_default_zoom(mut self, zoom: u8) -> Self {
        self.default_zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        self
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn default_zoom(&self) -> u8 {
        self.default_zoom
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ZOOM, DEFAULT_MAX_ZOOM)
    }
}

/// Unvalidated query as supplied by the UI collaborator.
///
/// `bbox` is four numbers `min_lon,min_lat,max_lon,max_lat` separated by
/// commas or whitespace. A single `date` stands in for both ends of the range
/// when `start_date` is absent.
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    pub bbox: String,
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub layer_id: String,
    pub zoom: Option<String>,
    /// Uploaded image to classify, if any.
    pub image: Option<Arc<Vec<u8>>>,
}

impl RawQuery {
    pub fn new(bbox: impl Into<String>, layer_id: impl Into<String>) -> Self {
        Self {
            bbox: bbox.into(),
            layer_id: layer_id.into(),
            ..Default::default()
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }

    pub fn with_zoom(mut self, zoom: impl Into<String>) -> Self {
        self.zoom = Some(zoom.into());
        self
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(Arc::new(image));
        self
    }
}

/// Normalizes a raw query into a validated [`GeoQuery`].
///
/// Zoom outside the configured range is clamped, not rejected; the requested
/// value is kept in `zoom_clamped_from`. Every other problem fails with a
/// [`ValidationError`] naming the field.
pub fn normalize(raw: &RawQuery, config: &ValidationConfig) -> Result<GeoQuery, ValidationError> {
    let bbox = parse_bbox(&raw.bbox)?;
    let date_range = parse_date_range(raw)?;
    let layer_id = validate_layer_id(&raw.layer_id)?;
    let (zoom, zoom_clamped_from) = match raw.zoom.as_deref().map(str::trim) {
        None | Some("") => (config.default_zoom(), None),
        Some(z) => clamp_zoom(z, config)?,
    };

    Ok(GeoQuery {
        bbox,
        date_range,
        layer_id,
        zoom,
        zoom_clamped_from,
    })
}

/// Parses `min_lon,min_lat,max_lon,max_lat`.
pub fn parse_bbox(input: &str) -> Result<BBox, ValidationError> {
    let parts: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 4 {
        return Err(ValidationError::new(
            "bbox",
            format!("expected 4 numbers, got {}", parts.len()),
        ));
    }

    let mut edges = [0.0f64; 4];
    for (edge, part) in edges.iter_mut().zip(&parts) {
        *edge = part.parse::<f64>().map_err(|_| {
            ValidationError::new("bbox", format!("'{}' is not a number", part))
        })?;
    }

    BBox::new(edges[0], edges[1], edges[2], edges[3])
}

fn parse_date_range(raw: &RawQuery) -> Result<DateRange, ValidationError> {
    let start_text = non_empty(raw.start_date.as_deref()).or(non_empty(raw.date.as_deref()));
    let Some(start_text) = start_text else {
        return Err(ValidationError::new("start_date", "a date is required"));
    };
    let start = parse_date(start_text).map_err(|reason| ValidationError::new("start_date", reason))?;

    let end = match non_empty(raw.end_date.as_deref()) {
        Some(text) => parse_date(text).map_err(|reason| ValidationError::new("end_date", reason))?,
        None => start,
    };

    DateRange::new(start, end)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parses `YYYY-MM-DD`, or an RFC 3339 timestamp whose date part is taken.
pub fn parse_date(input: &str) -> Result<NaiveDate, String> {
    let input = input.trim();
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(input)
        .map(|ts| ts.date_naive())
        .map_err(|_| format!("'{}' is not a YYYY-MM-DD date", input))
}

fn layer_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid layer id pattern"))
}

/// Checks the layer id against the allow-listed slug alphabet.
pub fn validate_layer_id(input: &str) -> Result<String, ValidationError> {
    let id = input.trim();
    if id.is_empty() {
        return Err(ValidationError::new("layer_id", "must not be empty"));
    }
    if !layer_id_pattern().is_match(id) {
        return Err(ValidationError::new(
            "layer_id",
            "only letters, digits, '-' and '_' are allowed",
        ));
    }
    Ok(id.to_string())
}

fn clamp_zoom(input: &str, config: &ValidationConfig) -> Result<(u8, Option<i64>), ValidationError> {
    let requested: i64 = match input.parse() {
        Ok(z) => z,
        // "7.0" style input from numeric widgets
        Err(_) => match input.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => {
                return Err(ValidationError::new(
                    "zoom",
                    format!("'{}' is not an integer", input),
                ))
            }
        },
    };

    let min = config.min_zoom() as i64;
    let max = config.max_zoom() as i64;
    let clamped = requested.clamp(min, max);
    if clamped != requested {
        tracing::debug!(requested, clamped, "zoom outside configured range, clamping");
        Ok((clamped as u8, Some(requested)))
    } else {
        Ok((clamped as u8, None))
    }
}

/// Square box of half-size `radius_m` metres around a point.
///
/// Uses the equirectangular degrees-per-metre approximation and clamps the
/// result to the valid coordinate range.
pub fn point_bbox(lat: f64, lon: f64, radius_m: f64) -> Result<BBox, ValidationError> {
    if !lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(ValidationError::new("lat", format!("{} is out of range", lat)));
    }
    if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(ValidationError::new("lon", format!("{} is out of range", lon)));
    }
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(ValidationError::new("radius", "must be a positive number of metres"));
    }

    let lat_buf = radius_m / METERS_PER_DEGREE;
    // cos() reaches zero at the poles
    let cos_lat = lat.to_radians().cos().abs().max(1e-6);
    let lon_buf = radius_m / (METERS_PER_DEGREE * cos_lat);

    BBox::new(
        (lon - lon_buf).max(MIN_LON),
        (lat - lat_buf).max(MIN_LAT),
        (lon + lon_buf).min(MAX_LON),
        (lat + lat_buf).min(MAX_LAT),
    )
}

/// Reduces free text to the layer id alphabet.
///
/// Runs of other characters collapse to a single `_`; leading and trailing
/// separators are dropped.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out.trim_matches(|c| c == '_' || c == '-').to_string()
}
