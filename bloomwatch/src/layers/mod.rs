//! Layer catalog: discovers the map layers a tile service offers.
//!
//! [`LayerCatalogClient`] fetches and caches the service's capabilities
//! document; [`LayerDescriptor`] describes one layer, including its valid
//! time range and the URL template used to request imagery.

mod capabilities;
mod client;
mod filter;
mod types;

pub use capabilities::parse_capabilities;
pub use client::{LayerCatalogClient, DEFAULT_CATALOG_TTL_SECS, DEFAULT_LAYER_CATALOG_URL};
pub use filter::{FilterError, FilterMode, LayerFilter};
pub use types::{
    parse_time_extents, valid_time_range, LayerCatalog, LayerDescriptor, LayerError, ServiceInfo,
    TimeExtent,
};
