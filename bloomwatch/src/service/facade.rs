//! Bloomwatch service facade implementation.

use super::config::{aggregator_config, collections, retry_policy};
use super::error::ServiceError;
use crate::aggregate::{Aggregator, MapViewModel};
use crate::config::ConfigFile;
use crate::geo::{point_bbox, BBox, DateRange, RawQuery, ValidationError};
use crate::geocode::GeocodingClient;
use crate::inference::{ClassificationResult, InferenceClient};
use crate::layers::{LayerCatalogClient, LayerDescriptor, LayerFilter, ServiceInfo};
use crate::scenes::{CatalogError, SatelliteCatalogClient, SceneRecord};
use crate::upstream::{AsyncHttpClient, AsyncReqwestClient};
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

type SharedLayers<C> = Arc<LayerCatalogClient<C>>;
type SharedScenes<C> = Arc<SatelliteCatalogClient<C>>;
type SharedClassifier<C> = Arc<InferenceClient<C>>;

/// High-level facade for bloomwatch operations.
///
/// Wires the three upstream clients and the aggregator from a [`ConfigFile`].
/// The clients are shared, so catalog lookups made directly through the
/// facade warm the same layer cache the aggregator uses.
///
/// # Example
///
/// ```ignore
/// use bloomwatch::config::ConfigFile;
/// use bloomwatch::geo::RawQuery;
/// use bloomwatch::service::BloomwatchService;
///
/// let service = BloomwatchService::new(ConfigFile::load()?)?;
/// let view = service
///     .build_view(&RawQuery::new("-122.5,37.5,-122.0,38.0", "MODIS_Terra_NDVI_8Day")
///         .with_date("2024-05-01"))
///     .await?;
/// ```
pub struct BloomwatchService<C: AsyncHttpClient + Clone = AsyncReqwestClient> {
    config: ConfigFile,
    layers: SharedLayers<C>,
    scenes: SharedScenes<C>,
    classifier: Option<SharedClassifier<C>>,
    geocoder: GeocodingClient<C>,
    aggregator: Aggregator<SharedLayers<C>, SharedScenes<C>, SharedClassifier<C>>,
}

impl BloomwatchService<AsyncReqwestClient> {
    /// Create a service talking to the configured upstreams over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ConfigFile) -> Result<Self, ServiceError> {
        let http_client = AsyncReqwestClient::with_timeout(config.upstream.http_timeout)
            .map_err(|e| ServiceError::HttpClientError(e.to_string()))?;
        Ok(Self::with_http_client(config, http_client))
    }
}

impl<C: AsyncHttpClient + Clone> BloomwatchService<C> {
    /// Create a service over an arbitrary HTTP client.
    pub fn with_http_client(config: ConfigFile, http_client: C) -> Self {
        let retry = retry_policy(&config.retry);

        let layers = Arc::new(
            LayerCatalogClient::with_url(http_client.clone(), &config.upstream.layer_catalog_url)
                .with_ttl(Duration::from_secs(config.cache.catalog_ttl))
                .with_retry_policy(retry.clone()),
        );

        let scenes = Arc::new(
            SatelliteCatalogClient::with_url(
                http_client.clone(),
                &config.upstream.satellite_catalog_url,
            )
            .with_collections(collections(&config))
            .with_page_size(config.scenes.page_size)
            .with_retry_policy(retry.clone()),
        );

        let geocoder = GeocodingClient::with_url(http_client.clone(), &config.upstream.geocoder_url)
            .with_retry_policy(retry);

        let classifier = config.upstream.inference_endpoint_url.as_ref().map(|url| {
            Arc::new(
                InferenceClient::new(http_client, url)
                    .with_token(config.upstream.inference_token.clone())
                    .with_timeout(Duration::from_secs(config.upstream.inference_timeout)),
            )
        });

        let aggregator = Aggregator::new(
            Arc::clone(&layers),
            Arc::clone(&scenes),
            classifier.clone(),
            aggregator_config(&config),
        );

        info!(
            layer_catalog = %config.upstream.layer_catalog_url,
            satellite_catalog = %config.upstream.satellite_catalog_url,
            inference = classifier.is_some(),
            cache_ttl_secs = config.cache.ttl,
            timeout_secs = config.aggregation.timeout,
            "Bloomwatch service ready"
        );

        Self {
            config,
            layers,
            scenes,
            classifier,
            geocoder,
            aggregator,
        }
    }

    /// Get the configuration the service was built from.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Check if an inference endpoint is configured.
    pub fn inference_enabled(&self) -> bool {
        self.classifier.is_some()
    }

    /// Build (or fetch from cache) the combined view for a query.
    ///
    /// Only validation problems are errors; upstream failures show up as
    /// partial failures on the view.
    pub async fn build_view(&self, query: &RawQuery) -> Result<Arc<MapViewModel>, ServiceError> {
        Ok(self.aggregator.build_view(query).await?)
    }

    /// Drop the cached view for a query. Returns whether one was cached.
    pub fn invalidate(&self, query: &RawQuery) -> Result<bool, ServiceError> {
        Ok(self.aggregator.invalidate(query)?)
    }

    /// Layer identifiers matching `filter`, sorted.
    pub async fn list_layers(&self, filter: &LayerFilter) -> Result<Vec<String>, ServiceError> {
        Ok(self.layers.list_layers(filter).await?)
    }

    pub async fn describe_layer(&self, layer_id: &str) -> Result<LayerDescriptor, ServiceError> {
        Ok(self.layers.get_layer(layer_id).await?)
    }

    pub async fn service_info(&self) -> Result<ServiceInfo, ServiceError> {
        Ok(self.layers.service_info().await?)
    }

    /// Scenes over `bbox` within `date_range`, most recent first.
    ///
    /// Thresholds left as `None` fall back to the `[scenes]` settings.
    pub async fn search_scenes(
        &self,
        bbox: &BBox,
        date_range: &DateRange,
        max_cloud_cover_pct: Option<f64>,
        max_results: Option<usize>,
    ) -> Result<Vec<SceneRecord>, ServiceError> {
        let max_cloud = max_cloud_cover_pct.unwrap_or(self.config.scenes.max_cloud_cover_pct);
        let limit = max_results.unwrap_or(self.config.scenes.max_results);
        Ok(self
            .scenes
            .fetch_scenes(bbox, date_range, max_cloud, limit)
            .await?)
    }

    /// Scenes as they arrive, page by page; later pages are only requested
    /// while the stream is polled.
    pub fn scene_stream<'a>(
        &'a self,
        bbox: &BBox,
        date_range: &DateRange,
        max_cloud_cover_pct: Option<f64>,
        max_results: Option<usize>,
    ) -> impl Stream<Item = Result<SceneRecord, CatalogError>> + Send + 'a {
        let max_cloud = max_cloud_cover_pct.unwrap_or(self.config.scenes.max_cloud_cover_pct);
        let limit = max_results.unwrap_or(self.config.scenes.max_results);
        self.scenes.search_scenes(bbox, date_range, max_cloud, limit)
    }

    /// Resolve a free-text address to `(lat, lon)`.
    pub async fn geocode(&self, address: &str) -> Result<Option<(f64, f64)>, ServiceError> {
        Ok(self.geocoder.geocode(address).await?)
    }

    /// Search area of half-size `radius_m` metres around an address.
    pub async fn locate(&self, address: &str, radius_m: f64) -> Result<BBox, ServiceError> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(ValidationError::new("radius", "must be a positive number of metres").into());
        }
        let (lat, lon) = self
            .geocode(address)
            .await?
            .ok_or_else(|| ServiceError::AddressNotFound(address.trim().to_string()))?;
        Ok(point_bbox(lat, lon, radius_m)?)
    }

    /// Classify an image without building a view.
    pub async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, ServiceError> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(ServiceError::InferenceDisabled)?;
        Ok(classifier.classify(image).await?)
    }

    /// Log cache and coalescing statistics, then drop every cached view.
    pub fn shutdown(&self) {
        self.aggregator.log_stats();
        let layer_stats = self.layers.cache_stats();
        info!(
            catalog_fetches = self.layers.fetch_count(),
            catalog_hits = layer_stats.hits,
            catalog_misses = layer_stats.misses,
            "Layer catalog statistics"
        );
        let flushed = self.aggregator.flush();
        info!(flushed, "Bloomwatch service stopped");
    }
}
