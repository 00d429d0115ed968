//! Layer catalog client with a process-wide, TTL-bounded catalog cache.

use super::capabilities::parse_capabilities;
use super::filter::LayerFilter;
use super::types::{LayerCatalog, LayerDescriptor, LayerError, ServiceInfo};
use crate::cache::{CacheStats, TtlCache};
use crate::upstream::{AsyncHttpClient, RetryPolicy, UpstreamError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// NASA GIBS WMS capabilities (Web Mercator, best available imagery).
pub const DEFAULT_LAYER_CATALOG_URL: &str =
    "https://gibs.earthdata.nasa.gov/wms/epsg3857/best/wms.cgi?SERVICE=WMS&REQUEST=GetCapabilities&VERSION=1.3.0";
/// Default catalog refresh interval.
pub const DEFAULT_CATALOG_TTL_SECS: u64 = 3600;
/// Catalog documents kept at once (one per capabilities URL).
const CATALOG_CACHE_CAPACITY: usize = 4;

/// Client for the tile service's layer catalog.
///
/// The whole catalog is cached under its capabilities URL. A lookup that
/// finds no live catalog triggers exactly one full re-fetch, shared by all
/// callers waiting at that moment; a lookup against a live catalog never
/// touches the network, even when the layer is missing.
pub struct LayerCatalogClient<C: AsyncHttpClient> {
    http_client: C,
    capabilities_url: String,
    cache: TtlCache<String, Arc<LayerCatalog>>,
    refresh: Mutex<()>,
    retry: RetryPolicy,
    fetches: AtomicU64,
}

impl<C: AsyncHttpClient> LayerCatalogClient<C> {
    /// Creates a client for the default GIBS endpoint.
    pub fn new(http_client: C) -> Self {
        Self::with_url(http_client, DEFAULT_LAYER_CATALOG_URL)
    }

    /// Creates a client for a custom capabilities URL.
    pub fn with_url(http_client: C, capabilities_url: impl Into<String>) -> Self {
        Self {
            http_client,
            capabilities_url: capabilities_url.into(),
            cache: TtlCache::new(
                Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
                CATALOG_CACHE_CAPACITY,
            ),
            refresh: Mutex::new(()),
            retry: RetryPolicy::default(),
            fetches: AtomicU64::new(0),
        }
    }

    /// Sets how long a fetched catalog stays fresh.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache = TtlCache::new(ttl, CATALOG_CACHE_CAPACITY);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn capabilities_url(&self) -> &str {
        &self.capabilities_url
    }

    /// Number of catalog documents fetched from upstream so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Looks up one layer.
    pub async fn get_layer(&self, layer_id: &str) -> Result<LayerDescriptor, LayerError> {
        let catalog = self.catalog().await?;
        catalog
            .get(layer_id)
            .cloned()
            .ok_or_else(|| LayerError::NotFound(layer_id.to_string()))
    }

    /// Identifiers passing `filter`, sorted and de-duplicated.
    pub async fn list_layers(&self, filter: &LayerFilter) -> Result<Vec<String>, UpstreamError> {
        let catalog = self.catalog().await?;
        Ok(filter.apply(catalog.ids()))
    }

    /// Service metadata from the capabilities document.
    pub async fn service_info(&self) -> Result<ServiceInfo, UpstreamError> {
        Ok(self.catalog().await?.service.clone())
    }

    /// Drops the cached catalog so the next lookup re-fetches it.
    pub fn invalidate(&self) {
        self.cache.invalidate(&self.capabilities_url);
    }

    /// Returns the live catalog, fetching it if the cached copy is absent or stale.
    pub async fn catalog(&self) -> Result<Arc<LayerCatalog>, UpstreamError> {
        if let Some(catalog) = self.cache.get(&self.capabilities_url) {
            return Ok(catalog);
        }

        // Single-flight: whoever gets the lock fetches, the rest re-check
        let _guard = self.refresh.lock().await;
        if let Some(catalog) = self.cache.get(&self.capabilities_url) {
            debug!("Layer catalog refreshed by another caller");
            return Ok(catalog);
        }

        let catalog = Arc::new(self.fetch_catalog().await?);
        self.cache
            .insert(self.capabilities_url.clone(), Arc::clone(&catalog));
        Ok(catalog)
    }

    async fn fetch_catalog(&self) -> Result<LayerCatalog, UpstreamError> {
        let url = self.capabilities_url.as_str();
        let catalog = self
            .retry
            .run("layer_catalog", |attempt| async move {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                debug!(url = url, attempt = attempt, "Fetching layer catalog");
                let body = self.http_client.get(url).await?;
                parse_capabilities(&body, url).map_err(|reason| UpstreamError::malformed(url, reason))
            })
            .await?;

        info!(
            url = url,
            layers = catalog.len(),
            "Layer catalog loaded"
        );
        Ok(catalog)
    }
}
