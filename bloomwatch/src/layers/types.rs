//! Layer catalog types.

use crate::geo::{tile_bbox, BBox, DateRange};
use crate::upstream::UpstreamError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from [`super::LayerCatalogClient::get_layer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    /// The catalog was fetched but lists no such layer. Never retried.
    #[error("layer '{0}' not found in catalog")]
    NotFound(String),

    /// The catalog could not be fetched or parsed
    #[error("layer catalog unavailable: {0}")]
    Upstream(#[from] UpstreamError),
}

/// One entry of a layer's time dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeExtent {
    /// A single listed time value
    Instant { value: String },
    /// `start/end/period` in ISO 8601
    Interval {
        start: String,
        end: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        period: Option<String>,
    },
}

impl TimeExtent {
    /// Parses one comma-separated item of a WMS time dimension.
    pub fn parse(item: &str) -> Option<Self> {
        let item = item.trim();
        if item.is_empty() {
            return None;
        }
        let mut parts = item.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(start), Some(end), period) => Some(Self::Interval {
                start: start.trim().to_string(),
                end: end.trim().to_string(),
                period: period.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            }),
            (Some(value), None, _) => Some(Self::Instant {
                value: value.to_string(),
            }),
            _ => None,
        }
    }

    /// Calendar days spanned, when the values are dates.
    pub fn day_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            Self::Instant { value } => {
                let day = leading_date(value)?;
                Some((day, day))
            }
            Self::Interval { start, end, .. } => Some((leading_date(start)?, leading_date(end)?)),
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.day_span()
            .map(|(start, end)| start <= day && day <= end)
            .unwrap_or(false)
    }
}

/// Reads the `YYYY-MM-DD` prefix of an ISO 8601 value.
fn leading_date(value: &str) -> Option<NaiveDate> {
    let head = value.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Parses a full WMS time dimension value list.
pub fn parse_time_extents(raw: &str) -> Vec<TimeExtent> {
    raw.split(',').filter_map(TimeExtent::parse).collect()
}

/// Overall day range covered by a set of extents.
pub fn valid_time_range(extents: &[TimeExtent]) -> Option<DateRange> {
    let spans: Vec<_> = extents.iter().filter_map(TimeExtent::day_span).collect();
    let start = spans.iter().map(|(s, _)| *s).min()?;
    let end = spans.iter().map(|(_, e)| *e).max()?;
    DateRange::new(start, end).ok()
}

/// Metadata for one map layer offered by the tile service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub layer_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// First to last day the layer has imagery for, if it is time-enabled
    #[serde(default)]
    pub valid_time_range: Option<DateRange>,
    #[serde(default)]
    pub time_extents: Vec<TimeExtent>,
    #[serde(default)]
    pub default_time: Option<String>,
    /// URL with `{bbox}`/`{time}` or `{z}`/`{x}`/`{y}`/`{time}` placeholders
    pub tile_url_template: String,
    pub projection: String,
    #[serde(default)]
    pub crs: Vec<String>,
    #[serde(default)]
    pub geographic_bbox: Option<BBox>,
    #[serde(default)]
    pub style: Option<String>,
}

impl LayerDescriptor {
    pub fn is_time_enabled(&self) -> bool {
        !self.time_extents.is_empty()
    }

    /// Picks the time value to request for `desired`.
    ///
    /// Returns the desired day when the layer lists it, otherwise the layer's
    /// default time, otherwise the desired day unchanged.
    pub fn choose_time(&self, desired: NaiveDate) -> String {
        let desired_text = desired.format("%Y-%m-%d").to_string();
        if !self.is_time_enabled() {
            return desired_text;
        }
        if self.time_extents.iter().any(|e| e.contains(desired)) {
            return desired_text;
        }
        self.default_time
            .clone()
            .or_else(|| {
                self.time_extents.last().map(|e| match e {
                    TimeExtent::Instant { value } => value.clone(),
                    TimeExtent::Interval { end, .. } => end.clone(),
                })
            })
            .unwrap_or(desired_text)
    }

    /// Fills a bbox-style template for the given area and time.
    pub fn tile_url(&self, bbox: &BBox, time: &str) -> String {
        let bbox_param = match self.projection.as_str() {
            "EPSG:3857" => bbox.to_wms_3857(),
            "EPSG:4326" => bbox.to_wms_4326(),
            _ => bbox.to_string(),
        };
        self.tile_url_template
            .replace("{bbox}", &bbox_param)
            .replace("{time}", time)
    }

    /// Fills the template for a slippy-map tile.
    ///
    /// Bbox-style templates get the tile's bounds substituted; returns `None`
    /// when the tile address is out of range for its zoom.
    pub fn tile_url_xyz(&self, z: u8, x: u32, y: u32, time: &str) -> Option<String> {
        if self.tile_url_template.contains("{bbox}") {
            let bbox = tile_bbox(z, x, y).ok()?;
            return Some(self.tile_url(&bbox, time));
        }
        Some(
            self.tile_url_template
                .replace("{z}", &z.to_string())
                .replace("{x}", &x.to_string())
                .replace("{y}", &y.to_string())
                .replace("{time}", time),
        )
    }
}

/// Service-level metadata from the capabilities document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    /// Endpoint for GetMap requests
    pub get_map_url: String,
    /// Image formats GetMap can return
    #[serde(default)]
    pub formats: Vec<String>,
}

/// A parsed capabilities document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerCatalog {
    pub service: ServiceInfo,
    layers: BTreeMap<String, LayerDescriptor>,
}

impl LayerCatalog {
    pub fn new(service: ServiceInfo, layers: impl IntoIterator<Item = LayerDescriptor>) -> Self {
        Self {
            service,
            layers: layers
                .into_iter()
                .map(|l| (l.layer_id.clone(), l))
                .collect(),
        }
    }

    pub fn get(&self, layer_id: &str) -> Option<&LayerDescriptor> {
        self.layers.get(layer_id)
    }

    /// Layer identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.values()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
