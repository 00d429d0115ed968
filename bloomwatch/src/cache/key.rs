//! Cache key for aggregated map views.

use crate::geo::{DateRange, GeoQuery};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Default number of decimal places kept when rounding bbox edges.
pub const DEFAULT_BBOX_PRECISION: u32 = 4;

/// Identifies one cached map view.
///
/// Built from the layer id, the bbox rounded to a fixed precision, and the
/// date range. Zoom does not participate: the aggregated data is the same at
/// every zoom. A supplied image contributes a content fingerprint so a view
/// classified for one image is never served for another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewCacheKey {
    layer_id: String,
    bbox: [i64; 4],
    date_range: DateRange,
    image: Option<u64>,
}

impl ViewCacheKey {
    pub fn new(query: &GeoQuery, precision: u32, image: Option<&[u8]>) -> Self {
        Self {
            layer_id: query.layer_id.clone(),
            bbox: query.bbox.rounded(precision),
            date_range: query.date_range,
            image: image.map(fingerprint),
        }
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Stable 64-bit digest of the whole key, for log correlation.
    pub fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for ViewCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{:016x}", self.layer_id, self.date_range, self.digest())
    }
}

/// Content fingerprint of an image payload.
pub fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.len().hash(&mut hasher);
    bytes.hash(&mut hasher);
    hasher.finish()
}
