//! Presentation-neutral layer stack handed to the rendering collaborator.

use super::view::{FailureKind, MapViewModel, ViewComponent};
use crate::geo::BBox;
use chrono::NaiveDate;
use serde::Serialize;

/// Base imagery layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileLayer {
    pub layer_id: String,
    pub name: String,
    /// Time value to request, as chosen by the layer's time dimension
    pub time: String,
    pub url_template: String,
    pub projection: String,
}

/// One scene footprint drawn over the tiles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneOverlay {
    pub scene_id: String,
    pub date: NaiveDate,
    pub bbox: Option<BBox>,
    pub cloud_cover_pct: Option<f64>,
    /// Draw order: 0 is the most recent scene, on top
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationBadge {
    pub label: String,
    /// Whole percent, 0..=100
    pub confidence_pct: u8,
    pub model_version: String,
    pub clamped: bool,
}

/// Inline notice for a component that could not be shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub component: ViewComponent,
    pub message: String,
}

/// What to draw for one view, bottom layer first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerStack {
    /// Map centre as `(lat, lon)`
    pub center: (f64, f64),
    pub zoom: u8,
    pub tiles: Option<TileLayer>,
    pub overlays: Vec<SceneOverlay>,
    pub badge: Option<ClassificationBadge>,
    pub notices: Vec<Notice>,
}

impl LayerStack {
    pub fn from_view(view: &MapViewModel) -> Self {
        let query = &view.query;

        let tiles = view.layer.as_ref().map(|layer| TileLayer {
            layer_id: layer.layer_id.clone(),
            name: layer.display_name.clone(),
            time: layer.choose_time(query.date_range.end),
            url_template: layer.tile_url_template.clone(),
            projection: layer.projection.clone(),
        });

        let overlays = view
            .scenes
            .iter()
            .enumerate()
            .map(|(rank, scene)| SceneOverlay {
                scene_id: scene.scene_id.clone(),
                date: scene.acquisition_day(),
                bbox: scene.bbox,
                cloud_cover_pct: scene.cloud_cover_pct,
                rank,
            })
            .collect();

        let badge = view.classification.as_ref().map(|c| ClassificationBadge {
            label: c.label.clone(),
            confidence_pct: (c.confidence * 100.0).round() as u8,
            model_version: c.model_version.clone(),
            clamped: c.confidence_clamped,
        });

        let notices = view
            .partial_failures
            .iter()
            .map(|component| Notice {
                component: *component,
                message: notice_text(
                    *component,
                    view.failure_notes.get(component).map(|n| n.kind),
                ),
            })
            .collect();

        Self {
            center: query.bbox.center(),
            zoom: query.zoom,
            tiles,
            overlays,
            badge,
            notices,
        }
    }
}

fn notice_text(component: ViewComponent, kind: Option<FailureKind>) -> String {
    let what = match component {
        ViewComponent::Layer => "Map layer",
        ViewComponent::Scenes => "Satellite scenes",
        ViewComponent::Classification => "Image classification",
    };
    let why = match kind {
        Some(FailureKind::DeadlineExceeded) => "took too long to respond",
        Some(FailureKind::NotFound) => "is not offered by the tile service",
        Some(FailureKind::Timeout) => "timed out",
        Some(FailureKind::Rejected) => "could not process this request",
        Some(FailureKind::Disabled) => "is not configured",
        Some(FailureKind::Upstream) | None => "is temporarily unavailable",
    };
    format!("{} {}.", what, why)
}
