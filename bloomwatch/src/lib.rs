//! Bloomwatch - multi-source geospatial aggregation
//!
//! Combines a WMS tile layer catalog, a STAC satellite scene catalog and an
//! optional image classifier into one map view per query.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use bloomwatch::config::ConfigFile;
//! use bloomwatch::geo::RawQuery;
//! use bloomwatch::service::BloomwatchService;
//!
//! let service = BloomwatchService::new(ConfigFile::load()?)?;
//! let query = RawQuery::new("-122.5,37.5,-122.0,38.0", "MODIS_Terra_NDVI_8Day")
//!     .with_date("2024-05-01");
//! let view = service.build_view(&query).await?;
//! ```
//!
//! The building blocks are usable on their own: [`geo`] validates queries,
//! [`layers`], [`scenes`] and [`inference`] talk to the upstreams,
//! [`geocode`] turns addresses into coordinates, and [`aggregate`] fans out
//! to the upstreams behind a TTL cache.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod geo;
pub mod geocode;
pub mod inference;
pub mod layers;
pub mod logging;
pub mod scenes;
pub mod service;
pub mod upstream;

/// Version of the bloomwatch library and CLI.
///
/// Synchronized across the workspace from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
