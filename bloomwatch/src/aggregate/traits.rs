//! Source traits the aggregator fans out to.
//!
//! Each upstream client implements one of these; tests substitute fakes.

use crate::geo::{BBox, DateRange};
use crate::inference::{ClassificationResult, InferenceClient, InferenceError};
use crate::layers::{LayerCatalogClient, LayerDescriptor, LayerError};
use crate::scenes::{CatalogError, SatelliteCatalogClient, SceneRecord};
use crate::upstream::AsyncHttpClient;
use std::future::Future;
use std::sync::Arc;

/// Resolves layer identifiers to descriptors.
pub trait LayerSource: Send + Sync {
    fn get_layer(
        &self,
        layer_id: &str,
    ) -> impl Future<Output = Result<LayerDescriptor, LayerError>> + Send;
}

/// Finds scenes over an area and period, most recent first.
pub trait SceneSource: Send + Sync {
    fn fetch_scenes(
        &self,
        bbox: &BBox,
        date_range: &DateRange,
        max_cloud_cover_pct: f64,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<SceneRecord>, CatalogError>> + Send;
}

/// Classifies an image payload.
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<ClassificationResult, InferenceError>> + Send;
}

impl<C: AsyncHttpClient> LayerSource for LayerCatalogClient<C> {
    async fn get_layer(&self, layer_id: &str) -> Result<LayerDescriptor, LayerError> {
        LayerCatalogClient::get_layer(self, layer_id).await
    }
}

impl<C: AsyncHttpClient> SceneSource for SatelliteCatalogClient<C> {
    async fn fetch_scenes(
        &self,
        bbox: &BBox,
        date_range: &DateRange,
        max_cloud_cover_pct: f64,
        max_results: usize,
    ) -> Result<Vec<SceneRecord>, CatalogError> {
        SatelliteCatalogClient::fetch_scenes(self, bbox, date_range, max_cloud_cover_pct, max_results)
            .await
    }
}

impl<C: AsyncHttpClient> Classifier for InferenceClient<C> {
    async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, InferenceError> {
        InferenceClient::classify(self, image).await
    }
}

impl<T: LayerSource> LayerSource for Arc<T> {
    fn get_layer(
        &self,
        layer_id: &str,
    ) -> impl Future<Output = Result<LayerDescriptor, LayerError>> + Send {
        (**self).get_layer(layer_id)
    }
}

impl<T: SceneSource> SceneSource for Arc<T> {
    fn fetch_scenes(
        &self,
        bbox: &BBox,
        date_range: &DateRange,
        max_cloud_cover_pct: f64,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<SceneRecord>, CatalogError>> + Send {
        (**self).fetch_scenes(bbox, date_range, max_cloud_cover_pct, max_results)
    }
}

impl<T: Classifier> Classifier for Arc<T> {
    fn classify(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<ClassificationResult, InferenceError>> + Send {
        (**self).classify(image)
    }
}
