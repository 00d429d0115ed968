//! STAC satellite catalog client.

use super::models::{ItemCollection, PageRequest, SearchBody};
use super::record::{sort_newest_first, SceneRecord};
use crate::geo::{BBox, DateRange};
use crate::upstream::{AsyncHttpClient, RetryPolicy, UpstreamError};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::{debug, warn};

/// NASA CMR STAC search endpoint for the LP DAAC cloud holdings (HLS).
pub const DEFAULT_SATELLITE_CATALOG_URL: &str = "https://cmr.earthdata.nasa.gov/stac/LPCLOUD/search";
/// Harmonized Landsat Sentinel-2 collections searched by default.
pub const DEFAULT_COLLECTIONS: &[&str] = &["HLSL30.v2.0", "HLSS30.v2.0"];
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_MAX_SCENES: usize = 20;
pub const DEFAULT_MAX_CLOUD_COVER_PCT: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("cloud cover threshold must be within 0..=100, got {0}")]
    InvalidCloudCover(f64),

    #[error("satellite catalog unavailable: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Pagination cursor threaded through the lazy scene stream.
enum Cursor {
    Pending(PageRequest),
    Invalid(CatalogError),
    Done,
}

/// Client for a STAC Item Search endpoint.
pub struct SatelliteCatalogClient<C: AsyncHttpClient> {
    http_client: C,
    search_url: String,
    collections: Option<Vec<String>>,
    page_size: u32,
    retry: RetryPolicy,
}

impl<C: AsyncHttpClient> SatelliteCatalogClient<C> {
    pub fn new(http_client: C) -> Self {
        Self::with_url(http_client, DEFAULT_SATELLITE_CATALOG_URL)
    }

    pub fn with_url(http_client: C, search_url: impl Into<String>) -> Self {
        Self {
            http_client,
            search_url: search_url.into(),
            collections: Some(DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect()),
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    /// Restricts searches to these collections; `None` searches all.
    pub fn with_collections(mut self, collections: Option<Vec<String>>) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    /// Lazily searches for scenes over `bbox` and `date_range`.
    ///
    /// Pages are requested only as the stream is polled, so taking a prefix
    /// never fetches later pages. Scenes above `max_cloud_cover_pct` are
    /// dropped here whether or not the server honoured the query filter.
    /// The stream ends after `max_results` scenes, on a page with no `next`
    /// link, or on an empty page; an upstream failure is yielded as the
    /// final item. Every call issues a fresh query.
    pub fn search_scenes<'a>(
        &'a self,
        bbox: &BBox,
        date_range: &DateRange,
        max_cloud_cover_pct: f64,
        max_results: usize,
    ) -> impl Stream<Item = Result<SceneRecord, CatalogError>> + Send + 'a {
        let start = if !(0.0..=100.0).contains(&max_cloud_cover_pct) {
            Cursor::Invalid(CatalogError::InvalidCloudCover(max_cloud_cover_pct))
        } else if max_results == 0 {
            Cursor::Done
        } else {
            let body = SearchBody::new(bbox, date_range, self.page_size, max_cloud_cover_pct)
                .with_collections(self.collections.clone());
            Cursor::Pending(PageRequest::Post {
                url: self.search_url.clone(),
                body: body.to_value(),
            })
        };

        stream::try_unfold(start, move |cursor| self.advance(cursor, max_cloud_cover_pct))
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten()
            .take(max_results)
    }

    /// Collects up to `max_results` scenes, most recent first.
    ///
    /// A failure part-way through discards the pages already read.
    pub async fn fetch_scenes(
        &self,
        bbox: &BBox,
        date_range: &DateRange,
        max_cloud_cover_pct: f64,
        max_results: usize,
    ) -> Result<Vec<SceneRecord>, CatalogError> {
        let mut scenes: Vec<SceneRecord> = self
            .search_scenes(bbox, date_range, max_cloud_cover_pct, max_results)
            .try_collect()
            .await?;
        sort_newest_first(&mut scenes);
        debug!(
            bbox = %bbox,
            dates = %date_range,
            scenes = scenes.len(),
            "Scene search complete"
        );
        Ok(scenes)
    }

    async fn advance(
        &self,
        cursor: Cursor,
        max_cloud_cover_pct: f64,
    ) -> Result<Option<(Vec<SceneRecord>, Cursor)>, CatalogError> {
        let request = match cursor {
            Cursor::Pending(request) => request,
            Cursor::Invalid(e) => return Err(e),
            Cursor::Done => return Ok(None),
        };

        let page = self.fetch_page(&request).await?;
        let next = match page.next_link() {
            Some(_) if page.features.is_empty() => Cursor::Done,
            Some(link) => Cursor::Pending(PageRequest::follow(link, &request)),
            None => Cursor::Done,
        };

        let received = page.features.len();
        let mut scenes: Vec<SceneRecord> = page
            .features
            .into_iter()
            .filter_map(|item| {
                let id = item.id.clone();
                let scene = SceneRecord::from_item(item);
                if scene.is_none() {
                    warn!(scene_id = %id, "Skipping scene without a valid acquisition datetime");
                }
                scene
            })
            .filter(|scene| scene.within_cloud_limit(max_cloud_cover_pct))
            .collect();
        sort_newest_first(&mut scenes);

        debug!(
            url = request.url(),
            received = received,
            kept = scenes.len(),
            has_next = matches!(next, Cursor::Pending(_)),
            "Scene page fetched"
        );
        Ok(Some((scenes, next)))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<ItemCollection, UpstreamError> {
        self.retry
            .run("scene_search", |attempt| async move {
                debug!(url = request.url(), attempt = attempt, "Requesting scene page");
                let body = match request {
                    PageRequest::Post { url, body } => {
                        self.http_client.post_json(url, &body.to_string()).await?
                    }
                    PageRequest::Get { url } => self.http_client.get(url).await?,
                };
                serde_json::from_slice(&body)
                    .map_err(|e| UpstreamError::malformed(request.url(), e.to_string()))
            })
            .await
    }
}
