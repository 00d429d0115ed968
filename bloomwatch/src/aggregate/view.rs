//! The aggregated map view and the per-source outcomes it is merged from.

use crate::geo::GeoQuery;
use crate::inference::{ClassificationResult, InferenceError};
use crate::layers::{LayerDescriptor, LayerError};
use crate::scenes::{CatalogError, SceneRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

/// The three parts of a view that can fail independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewComponent {
    Layer,
    Scenes,
    Classification,
}

impl ViewComponent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Layer => "layer",
            Self::Scenes => "scenes",
            Self::Classification => "classification",
        }
    }
}

impl fmt::Display for ViewComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a component is missing from a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Still pending when the aggregation deadline passed
    DeadlineExceeded,
    /// The layer catalog has no such layer
    NotFound,
    /// The upstream service failed after retries
    Upstream,
    /// The inference request timed out, twice
    Timeout,
    /// The request itself was unacceptable (bad image, bad threshold)
    Rejected,
    /// No endpoint is configured for this component
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNote {
    pub kind: FailureKind,
    pub reason: String,
}

impl FailureNote {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<LayerError> for FailureNote {
    fn from(e: LayerError) -> Self {
        let kind = match e {
            LayerError::NotFound(_) => FailureKind::NotFound,
            LayerError::Upstream(_) => FailureKind::Upstream,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<CatalogError> for FailureNote {
    fn from(e: CatalogError) -> Self {
        let kind = match e {
            CatalogError::InvalidCloudCover(_) => FailureKind::Rejected,
            CatalogError::Upstream(_) => FailureKind::Upstream,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<InferenceError> for FailureNote {
    fn from(e: InferenceError) -> Self {
        let kind = match e {
            InferenceError::Timeout { .. } => FailureKind::Timeout,
            InferenceError::UnsupportedFormat(_) => FailureKind::Rejected,
            InferenceError::Status { .. }
            | InferenceError::Malformed(_)
            | InferenceError::Request(_) => FailureKind::Upstream,
        };
        Self::new(kind, e.to_string())
    }
}

/// Result of one source call within a build.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome<T> {
    Ok(T),
    Failed(FailureNote),
}

impl<T> SourceOutcome<T> {
    pub fn from_result<E: Into<FailureNote>>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::Failed(e.into()),
        }
    }

    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failed(FailureNote::new(kind, reason))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Everything known about one map query.
///
/// A component that failed is absent (or empty, for scenes) and named in
/// `partial_failures`, with its reason in `failure_notes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapViewModel {
    pub query: GeoQuery,
    pub layer: Option<LayerDescriptor>,
    /// Most recent acquisition first
    pub scenes: Vec<SceneRecord>,
    pub classification: Option<ClassificationResult>,
    pub partial_failures: BTreeSet<ViewComponent>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failure_notes: BTreeMap<ViewComponent, FailureNote>,
    pub built_at: DateTime<Utc>,
}

impl MapViewModel {
    /// Merges source outcomes. `classification` is `None` when no image was supplied.
    pub fn merge(
        query: GeoQuery,
        layer: SourceOutcome<LayerDescriptor>,
        scenes: SourceOutcome<Vec<SceneRecord>>,
        classification: Option<SourceOutcome<ClassificationResult>>,
    ) -> Self {
        let mut view = Self {
            query,
            layer: None,
            scenes: Vec::new(),
            classification: None,
            partial_failures: BTreeSet::new(),
            failure_notes: BTreeMap::new(),
            built_at: Utc::now(),
        };

        match layer {
            SourceOutcome::Ok(layer) => view.layer = Some(layer),
            SourceOutcome::Failed(note) => view.record_failure(ViewComponent::Layer, note),
        }
        match scenes {
            SourceOutcome::Ok(scenes) => view.scenes = scenes,
            SourceOutcome::Failed(note) => view.record_failure(ViewComponent::Scenes, note),
        }
        match classification {
            Some(SourceOutcome::Ok(result)) => view.classification = Some(result),
            Some(SourceOutcome::Failed(note)) => {
                view.record_failure(ViewComponent::Classification, note)
            }
            None => {}
        }
        view
    }

    fn record_failure(&mut self, component: ViewComponent, note: FailureNote) {
        warn!(
            component = component.as_str(),
            kind = ?note.kind,
            reason = %note.reason,
            layer_id = %self.query.layer_id,
            "View component degraded"
        );
        self.partial_failures.insert(component);
        self.failure_notes.insert(component, note);
    }

    /// True when every requested component was produced.
    pub fn is_complete(&self) -> bool {
        self.partial_failures.is_empty()
    }

    pub fn failed(&self, component: ViewComponent) -> bool {
        self.partial_failures.contains(&component)
    }

    /// The same view answering a different, equivalent query.
    pub fn for_query(&self, query: GeoQuery) -> Self {
        Self {
            query,
            ..self.clone()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geo::{normalize, RawQuery, ValidationConfig};
    use crate::upstream::{HttpError, UpstreamError};

    pub(crate) fn query() -> GeoQuery {
        normalize(
            &RawQuery::new("10,20,11,21", "MODIS_Terra_NDVI_8Day").with_date("2024-05-01"),
            &ValidationConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_merge_records_failed_component() {
        let view = MapViewModel::merge(
            query(),
            SourceOutcome::failed(FailureKind::NotFound, "x"),
            SourceOutcome::Ok(vec![]),
            None,
        );
        assert!(!view.is_complete());
        assert!(view.failed(ViewComponent::Layer));
        assert!(!view.failed(ViewComponent::Scenes));
        assert!(!view.failed(ViewComponent::Classification));
    }

    #[test]
    fn test_error_kinds() {
        let note: FailureNote = LayerError::NotFound("L".into()).into();
        assert_eq!(note.kind, FailureKind::NotFound);

        let note: FailureNote =
            CatalogError::Upstream(UpstreamError::Http(HttpError::Timeout { url: "u".into() }))
                .into();
        assert_eq!(note.kind, FailureKind::Upstream);

        let note: FailureNote = InferenceError::Timeout {
            url: "u".into(),
            timeout_secs: 30,
        }
        .into();
        assert_eq!(note.kind, FailureKind::Timeout);
        assert!(note.reason.contains("timed out"));
    }

    #[test]
    fn test_failures_serialize_as_names() {
        let view = MapViewModel::merge(
            query(),
            SourceOutcome::failed(FailureKind::Upstream, "down"),
            SourceOutcome::failed(FailureKind::DeadlineExceeded, "slow"),
            Some(SourceOutcome::failed(FailureKind::Disabled, "off")),
        );
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json["partial_failures"],
            serde_json::json!(["layer", "scenes", "classification"])
        );
        assert_eq!(json["failure_notes"]["scenes"]["kind"], "deadline_exceeded");
    }

    #[test]
    fn test_for_query_keeps_results() {
        let view = MapViewModel::merge(
            query(),
            SourceOutcome::failed(FailureKind::Upstream, "down"),
            SourceOutcome::Ok(vec![]),
            None,
        );
        let mut other = query();
        other.zoom = 9;
        let moved = view.for_query(other.clone());
        assert_eq!(moved.query, other);
        assert_eq!(moved.partial_failures, view.partial_failures);
        assert_eq!(moved.built_at, view.built_at);
    }
}
