//! Scene records produced by the satellite catalog client.

use super::models::StacItem;
use crate::geo::BBox;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Landsat-derived HLS bands, per the L30 product band table. The
/// panchromatic B08 is not carried into L30.
const HLSL30_BANDS: &[&str] = &[
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B09", "B10", "B11",
];

/// Sentinel-2-derived HLS bands.
const HLSS30_BANDS: &[&str] = &[
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B08", "B8A", "B09", "B10", "B11", "B12",
];

/// Metadata for one satellite acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub scene_id: String,
    #[serde(default)]
    pub collection: Option<String>,
    pub acquisition_date: DateTime<Utc>,
    /// `None` when the catalog does not report cloud cover
    pub cloud_cover_pct: Option<f64>,
    #[serde(default)]
    pub bbox: Option<BBox>,
    /// Asset (band) name to download URL
    pub asset_urls: BTreeMap<String, String>,
}

impl SceneRecord {
    /// Converts a STAC item, returning `None` when it has no usable datetime.
    pub fn from_item(item: StacItem) -> Option<Self> {
        let raw = item
            .properties
            .datetime
            .as_deref()
            .or(item.properties.start_datetime.as_deref())?;
        let acquisition_date = DateTime::parse_from_rfc3339(raw)
            .ok()?
            .with_timezone(&Utc);

        let bbox = item.bbox.as_deref().and_then(item_bbox);
        let asset_urls = item
            .assets
            .iter()
            .map(|(name, asset)| (name.clone(), asset.preferred_href().to_string()))
            .collect();

        Some(Self {
            scene_id: item.id,
            collection: item.collection,
            acquisition_date,
            cloud_cover_pct: item.properties.cloud_cover,
            bbox,
            asset_urls,
        })
    }

    /// True unless the scene reports more cloud than `max_pct`.
    pub fn within_cloud_limit(&self, max_pct: f64) -> bool {
        self.cloud_cover_pct.map_or(true, |c| c <= max_pct)
    }

    pub fn acquisition_day(&self) -> NaiveDate {
        self.acquisition_date.date_naive()
    }

    /// Spectral bands offered by the scene's collection.
    pub fn bands(&self) -> &'static [&'static str] {
        match self.collection.as_deref() {
            Some(c) if c.starts_with("HLSL30") => HLSL30_BANDS,
            Some(c) if c.starts_with("HLSS30") => HLSS30_BANDS,
            _ => &[],
        }
    }

    /// The `n` scenes acquired closest to `day`, nearer first and newer first on ties.
    pub fn closest_to(scenes: &[SceneRecord], day: NaiveDate, n: usize) -> Vec<&SceneRecord> {
        let mut ranked: Vec<&SceneRecord> = scenes.iter().collect();
        ranked.sort_by(|a, b| {
            let da = (a.acquisition_day() - day).num_days().abs();
            let db = (b.acquisition_day() - day).num_days().abs();
            da.cmp(&db)
                .then_with(|| b.acquisition_date.cmp(&a.acquisition_date))
        });
        ranked.truncate(n);
        ranked
    }
}

/// Most recent acquisitions first.
pub fn sort_newest_first(scenes: &mut [SceneRecord]) {
    scenes.sort_by(|a, b| b.acquisition_date.cmp(&a.acquisition_date));
}

/// Reads a 2D or 3D STAC bbox.
fn item_bbox(values: &[f64]) -> Option<BBox> {
    let (min_lon, min_lat, max_lon, max_lat) = match values {
        [a, b, c, d] => (*a, *b, *c, *d),
        [a, b, _, d, e, _] => (*a, *b, *d, *e),
        _ => return None,
    };
    BBox::new(min_lon, min_lat, max_lon, max_lat).ok()
}
