//! Geographic query type definitions

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Valid latitude range
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// A caller-fixable problem with a raw query.
///
/// `field` names the offending input (`bbox`, `start_date`, `end_date`,
/// `date_range`, `layer_id`, `zoom`) so the UI can highlight it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Geographic bounding box in decimal degrees.
///
/// A validated box always satisfies `min_lon < max_lon` and `min_lat < max_lat`
/// with every edge inside the WGS84 range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BBox {
    /// Builds a box, checking ordering and coordinate ranges.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self, ValidationError> {
        let edges = [min_lon, min_lat, max_lon, max_lat];
        if edges.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::new("bbox", "coordinates must be finite numbers"));
        }
        if !(MIN_LON..=MAX_LON).contains(&min_lon) || !(MIN_LON..=MAX_LON).contains(&max_lon) {
            return Err(ValidationError::new(
                "bbox",
                format!("longitude must be within [{}, {}]", MIN_LON, MAX_LON),
            ));
        }
        if !(MIN_LAT..=MAX_LAT).contains(&min_lat) || !(MIN_LAT..=MAX_LAT).contains(&max_lat) {
            return Err(ValidationError::new(
                "bbox",
                format!("latitude must be within [{}, {}]", MIN_LAT, MAX_LAT),
            ));
        }
        if min_lon >= max_lon {
            return Err(ValidationError::new(
                "bbox",
                format!("min_lon {} must be less than max_lon {}", min_lon, max_lon),
            ));
        }
        if min_lat >= max_lat {
            return Err(ValidationError::new(
                "bbox",
                format!("min_lat {} must be less than max_lat {}", min_lat, max_lat),
            ));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Centre point as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Returns true when the two boxes share any area.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_lon < other.max_lon
            && other.min_lon < self.max_lon
            && self.min_lat < other.max_lat
            && other.min_lat < self.max_lat
    }

    /// Edges as `[min_lon, min_lat, max_lon, max_lat]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    /// Edges scaled to integers at the given number of decimal places.
    ///
    /// Two boxes that round to the same value address the same cache entry.
    pub fn rounded(&self, precision: u32) -> [i64; 4] {
        let scale = 10f64.powi(precision as i32);
        self.to_array().map(|v| (v * scale).round() as i64)
    }

    /// WMS 1.3.0 `BBOX` parameter for EPSG:4326 (lat/lon axis order).
    pub fn to_wms_4326(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }

    /// WMS `BBOX` parameter in Web Mercator metres (EPSG:3857).
    pub fn to_wms_3857(&self) -> String {
        let (min_x, min_y) = lon_lat_to_mercator(self.min_lon, self.min_lat);
        let (max_x, max_y) = lon_lat_to_mercator(self.max_lon, self.max_lat);
        format!("{:.2},{:.2},{:.2},{:.2}", min_x, min_y, max_x, max_y)
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Web Mercator valid latitude limit.
const MERCATOR_MAX_LAT: f64 = 85.05112878;
const EARTH_RADIUS_M: f64 = 6_378_137.0;

fn lon_lat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range, failing when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::new(
                "date_range",
                format!("start date {} is after end date {}", start, end),
            ));
        }
        Ok(Self { start, end })
    }

    /// A range covering one day.
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// RFC 3339 interval covering whole days, as STAC `datetime` expects.
    pub fn to_rfc3339_interval(&self) -> String {
        format!(
            "{}T00:00:00Z/{}T23:59:59Z",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}/{}", self.start, self.end)
        }
    }
}

/// A validated, immutable map query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoQuery {
    pub bbox: BBox,
    pub date_range: DateRange,
    pub layer_id: String,
    pub zoom: u8,
    /// The zoom the caller asked for when it had to be clamped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_clamped_from: Option<i64>,
}

impl GeoQuery {
    /// Returns true when normalization corrected the requested zoom.
    pub fn zoom_was_clamped(&self) -> bool {
        self.zoom_clamped_from.is_some()
    }
}
