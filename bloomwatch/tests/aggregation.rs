//! End-to-end tests for view aggregation.
//!
//! These drive [`BloomwatchService`] over a routed fake HTTP client so that
//! the real catalog, scene and inference clients parse realistic payloads:
//! - Healthy views combine all three sources
//! - A slow or failing source degrades only its own component
//! - Complete views are cached, degraded ones are not
//! - Invalid queries never reach an upstream
//! - Concurrent identical queries share one fan-out

use bloomwatch::aggregate::{FailureKind, LayerStack, ViewComponent};
use bloomwatch::config::ConfigFile;
use bloomwatch::geo::{parse_date, BBox, DateRange, RawQuery};
use bloomwatch::service::{BloomwatchService, ServiceError};
use bloomwatch::upstream::{AsyncHttpClient, HttpError};
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// =============================================================================
// Test Helpers
// =============================================================================

const LAYER_URL: &str = "https://wms.test/capabilities";
const SCENE_URL: &str = "https://stac.test/search";
const INFERENCE_URL: &str = "https://infer.test/classify";
const LAYER_ID: &str = "MODIS_Terra_NDVI_8Day";

const CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities xmlns="http://www.opengis.net/wms" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.3.0">
  <Service>
    <Name>WMS</Name>
    <Title>Test imagery</Title>
  </Service>
  <Capability>
    <Request>
      <GetMap>
        <Format>image/png</Format>
        <DCPType><HTTP><Get><OnlineResource xlink:type="simple" xlink:href="https://wms.test/wms?"/></Get></HTTP></DCPType>
      </GetMap>
    </Request>
    <Layer>
      <Title>Root</Title>
      <CRS>EPSG:3857</CRS>
      <Layer>
        <Name>MODIS_Terra_NDVI_8Day</Name>
        <Title>Vegetation Index (NDVI, 8-Day)</Title>
        <Dimension name="time" units="ISO8601" default="2024-05-16">2000-02-18/2024-05-16/P8D</Dimension>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>"#;

/// Shared state behind [`RoutedHttp`].
#[derive(Default)]
struct Routes {
    scene_items: Mutex<Vec<(&'static str, &'static str, f64)>>,
    scene_delay: Mutex<Duration>,
    scenes_fail: Mutex<bool>,
    layer_requests: AtomicUsize,
    scene_requests: AtomicUsize,
    inference_requests: AtomicUsize,
}

/// Fake HTTP client routing by host to canned upstream responses.
#[derive(Clone, Default)]
struct RoutedHttp {
    routes: Arc<Routes>,
}

impl RoutedHttp {
    fn with_scenes(items: &[(&'static str, &'static str, f64)]) -> Self {
        let http = Self::default();
        *http.routes.scene_items.lock().unwrap() = items.to_vec();
        http
    }

    fn delay_scenes(&self, delay: Duration) {
        *self.routes.scene_delay.lock().unwrap() = delay;
    }

    fn fail_scenes(&self, fail: bool) {
        *self.routes.scenes_fail.lock().unwrap() = fail;
    }

    fn upstream_requests(&self) -> usize {
        self.routes.layer_requests.load(Ordering::SeqCst)
            + self.routes.scene_requests.load(Ordering::SeqCst)
            + self.routes.inference_requests.load(Ordering::SeqCst)
    }

    fn scene_requests(&self) -> usize {
        self.routes.scene_requests.load(Ordering::SeqCst)
    }

    fn scene_page(&self) -> Vec<u8> {
        let features: Vec<_> = self
            .routes
            .scene_items
            .lock()
            .unwrap()
            .iter()
            .map(|(id, datetime, cloud)| {
                json!({
                    "type": "Feature",
                    "id": id,
                    "collection": "HLSL30_2.0",
                    "bbox": [10.0, 20.0, 11.0, 21.0],
                    "properties": { "datetime": datetime, "eo:cloud_cover": cloud },
                    "assets": { "B04": { "href": format!("https://data.test/{}.B04.tif", id) } },
                    "links": []
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features, "links": [] })
            .to_string()
            .into_bytes()
    }

    fn not_found(url: &str) -> HttpError {
        HttpError::Status {
            status: 404,
            url: url.to_string(),
        }
    }

    async fn search(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        if !url.starts_with(SCENE_URL) {
            return Err(Self::not_found(url));
        }
        self.routes.scene_requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.routes.scene_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.routes.scenes_fail.lock().unwrap() {
            return Err(HttpError::Status {
                status: 503,
                url: url.to_string(),
            });
        }
        Ok(self.scene_page())
    }
}

impl AsyncHttpClient for RoutedHttp {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.get_with_headers(url, &[]).await
    }

    async fn get_with_headers(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, HttpError> {
        if url.starts_with(LAYER_URL) {
            self.routes.layer_requests.fetch_add(1, Ordering::SeqCst);
            return Ok(CAPABILITIES.as_bytes().to_vec());
        }
        // Paginated scene searches may follow GET links
        self.search(url).await
    }

    async fn post_json(&self, url: &str, _json_body: &str) -> Result<Vec<u8>, HttpError> {
        self.search(url).await
    }

    async fn post_bytes(
        &self,
        url: &str,
        _content_type: &str,
        _body: &[u8],
        _headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, HttpError> {
        if !url.starts_with(INFERENCE_URL) {
            return Err(Self::not_found(url));
        }
        self.routes.inference_requests.fetch_add(1, Ordering::SeqCst);
        Ok(br#"{"label": "corn", "confidence": 0.91, "model_version": "crops-v2"}"#.to_vec())
    }
}

fn config() -> ConfigFile {
    let mut config = ConfigFile::default();
    config.upstream.layer_catalog_url = LAYER_URL.into();
    config.upstream.satellite_catalog_url = SCENE_URL.into();
    config.retry.max_retries = 0;
    config.retry.jitter = false;
    config.aggregation.timeout = 1;
    config
}

fn service(http: &RoutedHttp) -> BloomwatchService<RoutedHttp> {
    BloomwatchService::with_http_client(config(), http.clone())
}

fn query() -> RawQuery {
    RawQuery::new("10,20,11,21", LAYER_ID).with_range("2024-04-01", "2024-05-01")
}

const THREE_SCENES: [(&str, &str, f64); 3] = [
    ("older", "2024-04-03T10:00:00Z", 5.0),
    ("hazy", "2024-04-20T10:00:00Z", 40.0),
    ("cloudy", "2024-04-28T10:00:00Z", 90.0),
];

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

// =============================================================================
// Healthy views
// =============================================================================

#[tokio::test]
async fn test_healthy_view_combines_sources() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    let mut config = config();
    config.upstream.inference_endpoint_url = Some(INFERENCE_URL.into());
    let service = BloomwatchService::with_http_client(config, http.clone());

    let view = service
        .build_view(&query().with_image(PNG.to_vec()))
        .await
        .unwrap();

    assert!(view.is_complete(), "failures: {:?}", view.failure_notes);
    assert_eq!(view.layer.as_ref().unwrap().layer_id, LAYER_ID);
    let ids: Vec<_> = view.scenes.iter().map(|s| s.scene_id.as_str()).collect();
    assert_eq!(ids, vec!["hazy", "older"]);
    let classification = view.classification.as_ref().unwrap();
    assert_eq!(classification.label, "corn");
    assert_eq!(classification.model_version, "crops-v2");

    let stack = LayerStack::from_view(&view);
    assert!(stack.tiles.is_some());
    assert_eq!(stack.overlays.len(), 2);
    assert_eq!(stack.overlays[0].scene_id, "hazy");
    assert!(stack.notices.is_empty());
}

#[tokio::test]
async fn test_cloud_threshold_filters_scenes() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    let service = service(&http);

    let bbox = BBox::new(10.0, 20.0, 11.0, 21.0).unwrap();
    let range = DateRange::new(
        parse_date("2024-04-01").unwrap(),
        parse_date("2024-05-01").unwrap(),
    )
    .unwrap();

    let scenes = service
        .search_scenes(&bbox, &range, Some(50.0), None)
        .await
        .unwrap();

    assert_eq!(scenes.len(), 2);
    assert!(scenes.iter().all(|s| s.cloud_cover_pct.unwrap() <= 50.0));
    assert!(scenes[0].acquisition_date > scenes[1].acquisition_date);
}

// =============================================================================
// Partial failures
// =============================================================================

#[tokio::test]
async fn test_slow_scene_catalog_hits_deadline() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    http.delay_scenes(Duration::from_secs(10));
    let service = service(&http);

    let started = Instant::now();
    let view = service.build_view(&query()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(view.layer.is_some());
    assert!(view.scenes.is_empty());
    assert_eq!(
        view.failure_notes[&ViewComponent::Scenes].kind,
        FailureKind::DeadlineExceeded
    );
    assert_eq!(
        view.partial_failures.iter().copied().collect::<Vec<_>>(),
        vec![ViewComponent::Scenes]
    );
}

#[tokio::test]
async fn test_scene_failure_leaves_classification_intact() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    http.delay_scenes(Duration::from_secs(10));
    let mut config = config();
    config.upstream.inference_endpoint_url = Some(INFERENCE_URL.into());
    let service = BloomwatchService::with_http_client(config, http.clone());

    let started = Instant::now();
    let view = service
        .build_view(&query().with_image(PNG.to_vec()))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(view.layer.is_some());
    assert!(view.scenes.is_empty());
    let classification = view.classification.as_ref().unwrap();
    assert_eq!(classification.label, "corn");
    assert_eq!(
        view.partial_failures.iter().copied().collect::<Vec<_>>(),
        vec![ViewComponent::Scenes]
    );
}

#[tokio::test]
async fn test_rejected_scene_search_leaves_classification_intact() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    http.fail_scenes(true);
    let mut config = config();
    config.upstream.inference_endpoint_url = Some(INFERENCE_URL.into());
    let service = BloomwatchService::with_http_client(config, http.clone());

    let view = service
        .build_view(&query().with_image(PNG.to_vec()))
        .await
        .unwrap();

    assert!(view.layer.is_some());
    assert!(view.classification.is_some());
    assert_eq!(
        view.partial_failures.iter().copied().collect::<Vec<_>>(),
        vec![ViewComponent::Scenes]
    );
}

#[tokio::test]
async fn test_degraded_view_not_cached() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    http.fail_scenes(true);
    let service = service(&http);

    let first = service.build_view(&query()).await.unwrap();
    assert!(first.failed(ViewComponent::Scenes));
    assert_eq!(http.scene_requests(), 1);

    http.fail_scenes(false);
    let second = service.build_view(&query()).await.unwrap();

    assert_eq!(http.scene_requests(), 2);
    assert!(second.is_complete());
}

#[tokio::test]
async fn test_image_without_inference_endpoint() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    let service = service(&http);

    let view = service
        .build_view(&query().with_image(PNG.to_vec()))
        .await
        .unwrap();

    assert!(view.layer.is_some());
    assert_eq!(view.scenes.len(), 2);
    assert_eq!(
        view.failure_notes[&ViewComponent::Classification].kind,
        FailureKind::Disabled
    );
}

// =============================================================================
// Caching and coalescing
// =============================================================================

#[tokio::test]
async fn test_repeated_query_served_from_cache() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    let service = service(&http);

    let first = service.build_view(&query()).await.unwrap();
    let requests = http.upstream_requests();
    let second = service.build_view(&query()).await.unwrap();

    assert_eq!(http.upstream_requests(), requests);
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_invalidate_forces_rebuild() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    let service = service(&http);

    service.build_view(&query()).await.unwrap();
    assert!(service.invalidate(&query()).unwrap());
    service.build_view(&query()).await.unwrap();

    assert_eq!(http.scene_requests(), 2);
}

#[tokio::test]
async fn test_concurrent_queries_share_one_fan_out() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    http.delay_scenes(Duration::from_millis(200));
    let service = service(&http);
    let query = query();

    let views = join_all((0..8).map(|_| service.build_view(&query))).await;

    assert_eq!(http.scene_requests(), 1);
    let first = views[0].as_ref().unwrap();
    for view in &views {
        let view = view.as_ref().unwrap();
        assert_eq!(view.scenes.len(), first.scenes.len());
        assert_eq!(view.built_at, first.built_at);
    }
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_inverted_bbox_rejected_before_upstream() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    let service = service(&http);

    let err = service
        .build_view(&RawQuery::new("10,10,5,5", LAYER_ID).with_date("2024-05-01"))
        .await
        .unwrap_err();

    match err {
        ServiceError::InvalidQuery(e) => assert_eq!(e.field, "bbox"),
        other => panic!("expected InvalidQuery, got {other:?}"),
    }
    assert_eq!(http.upstream_requests(), 0);
}

#[tokio::test]
async fn test_out_of_range_zoom_clamped() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    let service = service(&http);

    let view = service.build_view(&query().with_zoom("99")).await.unwrap();

    assert_eq!(view.query.zoom, 18);
}

#[tokio::test]
async fn test_unknown_layer_degrades_view() {
    let http = RoutedHttp::with_scenes(&THREE_SCENES);
    let service = service(&http);

    let view = service
        .build_view(&RawQuery::new("10,20,11,21", "Not_A_Layer").with_date("2024-05-01"))
        .await
        .unwrap();

    assert!(view.layer.is_none());
    assert_eq!(
        view.failure_notes[&ViewComponent::Layer].kind,
        FailureKind::NotFound
    );
}
