//! Geographic query model and input validation.
//!
//! Provides the validated [`GeoQuery`] the rest of the pipeline works with,
//! plus the conversions between slippy-map tiles and lat/lon boxes that the
//! layer templates need.

mod types;
mod validate;

pub use types::{BBox, DateRange, GeoQuery, ValidationError, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
pub use validate::{
    normalize, parse_bbox, parse_date, point_bbox, slug, validate_layer_id, RawQuery,
    ValidationConfig, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, DEFAULT_ZOOM,
};

use std::f64::consts::PI;

/// Converts tile coordinates to the latitude/longitude of their northwest corner.
#[inline]
pub fn tile_to_lat_lon(zoom: u8, x: u32, y: u32) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);

    let lon = x as f64 / n * 360.0 - 180.0;

    let y = y as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}

/// Deepest zoom whose tile indices fit in a `u32`.
pub const MAX_TILE_ZOOM: u8 = 30;

/// Bounding box covered by a Web Mercator tile.
pub fn tile_bbox(zoom: u8, x: u32, y: u32) -> Result<BBox, ValidationError> {
    if zoom > MAX_TILE_ZOOM {
        return Err(ValidationError::new(
            "tile",
            format!("zoom {} is above the tile grid limit of {}", zoom, MAX_TILE_ZOOM),
        ));
    }
    let n = 1u32 << zoom;
    if x >= n || y >= n {
        return Err(ValidationError::new(
            "tile",
            format!("tile {}/{}/{} does not exist", zoom, x, y),
        ));
    }
    let (max_lat, min_lon) = tile_to_lat_lon(zoom, x, y);
    let (min_lat, max_lon) = tile_to_lat_lon(zoom, x + 1, y + 1);
    BBox::new(min_lon, min_lat, max_lon, max_lat)
}
