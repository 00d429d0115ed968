//! Aggregation of the three upstream sources into one map view.
//!
//! [`Aggregator::build_view`] validates a raw query, serves it from the view
//! cache when it can, and otherwise queries the layer catalog, the satellite
//! catalog and (with an image) the classifier concurrently under a shared
//! deadline. Concurrent requests for the same view share one build.

mod aggregator;
mod coalesce;
mod render;
mod traits;
mod view;

pub use aggregator::{
    Aggregator, AggregatorConfig, DEFAULT_AGGREGATION_TIMEOUT_SECS, DEFAULT_VIEW_CACHE_MAX_ENTRIES,
    DEFAULT_VIEW_CACHE_TTL_SECS,
};
pub use coalesce::{CoalescerStats, RequestCoalescer};
pub use render::{ClassificationBadge, LayerStack, Notice, SceneOverlay, TileLayer};
pub use traits::{Classifier, LayerSource, SceneSource};
pub use view::{FailureKind, FailureNote, MapViewModel, SourceOutcome, ViewComponent};
