//! View aggregation: validate, check the cache, fan out, merge.

use super::coalesce::{CoalescerStats, RequestCoalescer};
use super::traits::{Classifier, LayerSource, SceneSource};
use super::view::{FailureKind, FailureNote, MapViewModel, SourceOutcome};
use crate::cache::{CacheStats, TtlCache, ViewCacheKey, DEFAULT_BBOX_PRECISION};
use crate::geo::{normalize, GeoQuery, RawQuery, ValidationConfig, ValidationError};
use crate::scenes::{DEFAULT_MAX_CLOUD_COVER_PCT, DEFAULT_MAX_SCENES};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_VIEW_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_VIEW_CACHE_MAX_ENTRIES: usize = 256;

/// Deadline used when the configured timeout does not fit the clock.
const FAR_DEADLINE: Duration = Duration::from_secs(86400 * 365 * 30);
pub const DEFAULT_AGGREGATION_TIMEOUT_SECS: u64 = 15;

/// Tuning for [`Aggregator`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    /// Overall bound on one fan-out
    pub timeout: Duration,
    pub max_cloud_cover_pct: f64,
    pub max_scenes: usize,
    /// Decimal places kept when rounding bbox edges for the cache key
    pub bbox_precision: u32,
    pub validation: ValidationConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_VIEW_CACHE_TTL_SECS),
            cache_max_entries: DEFAULT_VIEW_CACHE_MAX_ENTRIES,
            timeout: Duration::from_secs(DEFAULT_AGGREGATION_TIMEOUT_SECS),
            max_cloud_cover_pct: DEFAULT_MAX_CLOUD_COVER_PCT,
            max_scenes: DEFAULT_MAX_SCENES,
            bbox_precision: DEFAULT_BBOX_PRECISION,
            validation: ValidationConfig::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_max_entries(mut self, entries: usize) -> Self {
        self.cache_max_entries = entries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_cloud_cover_pct(mut self, pct: f64) -> Self {
        self.max_cloud_cover_pct = pct;
        self
    }

    pub fn with_max_scenes(mut self, max_scenes: usize) -> Self {
        self.max_scenes = max_scenes;
        self
    }

    pub fn with_bbox_precision(mut self, precision: u32) -> Self {
        self.bbox_precision = precision;
        self
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }
}

/// Builds [`MapViewModel`]s from three independent sources.
///
/// Only a [`ValidationError`] escapes [`build_view`](Self::build_view); every
/// source failure, including running past the deadline, becomes a partial
/// failure on the returned view. Complete views are cached; degraded ones
/// are not, so the next identical request tries the sources again.
pub struct Aggregator<L, S, I> {
    layers: L,
    scenes: S,
    classifier: Option<I>,
    config: AggregatorConfig,
    cache: TtlCache<ViewCacheKey, Arc<MapViewModel>>,
    coalescer: RequestCoalescer<ViewCacheKey, Arc<MapViewModel>>,
    fan_outs: AtomicU64,
}

impl<L, S, I> Aggregator<L, S, I>
where
    L: LayerSource,
    S: SceneSource,
    I: Classifier,
{
    /// `classifier` is `None` when no inference endpoint is configured; a
    /// query carrying an image then reports a classification failure.
    pub fn new(layers: L, scenes: S, classifier: Option<I>, config: AggregatorConfig) -> Self {
        let cache = TtlCache::new(config.cache_ttl, config.cache_max_entries);
        Self {
            layers,
            scenes,
            classifier,
            config,
            cache,
            coalescer: RequestCoalescer::new(),
            fan_outs: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Validates `raw` and returns its view, from cache when possible.
    pub async fn build_view(&self, raw: &RawQuery) -> Result<Arc<MapViewModel>, ValidationError> {
        let query = normalize(raw, &self.config.validation)?;
        let image = raw.image.as_deref().map(Vec::as_slice);
        let key = self.key_for(&query, image);

        if let Some(view) = self.cache.get(&key) {
            debug!(key = %key, "View cache hit");
            return Ok(Self::answer(view, query));
        }
        debug!(key = %key, "View cache miss");

        let view = self
            .coalescer
            .run(key.clone(), || self.build_uncached(&key, &query, image))
            .await;

        Ok(Self::answer(view, query))
    }

    /// Leader side of a coalesced build.
    async fn build_uncached(
        &self,
        key: &ViewCacheKey,
        query: &GeoQuery,
        image: Option<&[u8]>,
    ) -> Arc<MapViewModel> {
        // A build for this key may have finished since the caller's lookup
        if let Some(view) = self.cache.peek(key) {
            return view;
        }

        let view = Arc::new(self.fan_out(query.clone(), image).await);
        if view.is_complete() {
            self.cache.insert(key.clone(), Arc::clone(&view));
        } else {
            debug!(key = %key, "Degraded view not cached");
        }
        view
    }

    /// Drops the cached view for `raw`. Returns true if one was cached.
    pub fn invalidate(&self, raw: &RawQuery) -> Result<bool, ValidationError> {
        let query = normalize(raw, &self.config.validation)?;
        let key = self.key_for(&query, raw.image.as_deref().map(Vec::as_slice));
        Ok(self.cache.invalidate(&key))
    }

    /// Empties the view cache. Returns how many views were dropped.
    pub fn flush(&self) -> usize {
        let dropped = self.cache.clear();
        info!(dropped = dropped, "View cache flushed");
        dropped
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn coalescer_stats(&self) -> CoalescerStats {
        self.coalescer.stats()
    }

    /// Number of times the sources were actually queried.
    pub fn fan_out_count(&self) -> u64 {
        self.fan_outs.load(Ordering::Relaxed)
    }

    pub fn log_stats(&self) {
        let stats = self.cache.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entries,
            fan_outs = self.fan_out_count(),
            hit_rate = format!("{:.1}%", stats.hit_rate() * 100.0),
            "View cache statistics"
        );
        self.coalescer.log_stats();
    }

    fn key_for(&self, query: &GeoQuery, image: Option<&[u8]>) -> ViewCacheKey {
        ViewCacheKey::new(query, self.config.bbox_precision, image)
    }

    /// Re-stamps a shared view when it was built for an equivalent query.
    fn answer(view: Arc<MapViewModel>, query: GeoQuery) -> Arc<MapViewModel> {
        if view.query == query {
            view
        } else {
            Arc::new(view.for_query(query))
        }
    }

    async fn fan_out(&self, query: GeoQuery, image: Option<&[u8]>) -> MapViewModel {
        self.fan_outs.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let deadline = started
            .checked_add(self.config.timeout)
            .unwrap_or_else(|| started + FAR_DEADLINE);

        let layer = within(deadline, self.layers.get_layer(&query.layer_id));
        let scenes = within(
            deadline,
            self.scenes.fetch_scenes(
                &query.bbox,
                &query.date_range,
                self.config.max_cloud_cover_pct,
                self.config.max_scenes,
            ),
        );
        let classification = async {
            match (image, &self.classifier) {
                (None, _) => None,
                (Some(_), None) => Some(SourceOutcome::failed(
                    FailureKind::Disabled,
                    "no inference endpoint configured",
                )),
                (Some(image), Some(classifier)) => {
                    Some(within(deadline, classifier.classify(image)).await)
                }
            }
        };

        let (layer, scenes, classification) = tokio::join!(layer, scenes, classification);
        let view = MapViewModel::merge(query, layer, scenes, classification);

        info!(
            layer_id = %view.query.layer_id,
            scenes = view.scenes.len(),
            classified = view.classification.is_some(),
            failures = view.partial_failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "View built"
        );
        view
    }
}

/// Awaits `source` until `deadline`, folding its error or lateness into an outcome.
async fn within<T, E, F>(deadline: Instant, source: F) -> SourceOutcome<T>
where
    E: Into<FailureNote>,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout_at(deadline, source).await {
        Ok(result) => SourceOutcome::from_result(result),
        Err(_) => SourceOutcome::failed(
            FailureKind::DeadlineExceeded,
            "no response before the aggregation deadline",
        ),
    }
}
