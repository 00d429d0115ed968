//! Address lookup for queries that start from a place name.
//!
//! [`GeocodingClient`] resolves free text to a point; pair it with
//! [`point_bbox`](crate::geo::point_bbox) to get a search area.

mod client;

pub use client::{parse_search_response, GeocodingClient, DEFAULT_GEOCODER_URL};
