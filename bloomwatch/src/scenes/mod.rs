//! Satellite scene discovery over a STAC Item Search API.
//!
//! [`SatelliteCatalogClient::search_scenes`] returns a lazy stream that pages
//! through the catalog on demand; [`SatelliteCatalogClient::fetch_scenes`]
//! collects it into a newest-first list.

mod client;
pub mod models;
mod record;

pub use client::{
    CatalogError, SatelliteCatalogClient, DEFAULT_COLLECTIONS, DEFAULT_MAX_CLOUD_COVER_PCT,
    DEFAULT_MAX_SCENES, DEFAULT_PAGE_SIZE, DEFAULT_SATELLITE_CATALOG_URL,
};
pub use record::{sort_newest_first, SceneRecord};
