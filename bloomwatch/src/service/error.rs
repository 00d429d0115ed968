//! Service error types.

use crate::geo::ValidationError;
use crate::inference::InferenceError;
use crate::layers::{FilterError, LayerError};
use crate::scenes::CatalogError;
use crate::upstream::UpstreamError;
use std::fmt;

/// Errors that can occur during service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Failed to create HTTP client
    HttpClientError(String),
    /// Invalid configuration
    ConfigError(String),
    /// The query was rejected before any upstream call
    InvalidQuery(ValidationError),
    /// Layer lookup failed
    Layer(LayerError),
    /// Layer catalog could not be read
    Upstream(UpstreamError),
    /// Scene search failed
    Catalog(CatalogError),
    /// Classification failed
    Inference(InferenceError),
    /// Layer filter could not be compiled
    Filter(FilterError),
    /// Classification was requested without an inference endpoint
    InferenceDisabled,
    /// The geocoder found no match for an address
    AddressNotFound(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpClientError(msg) => write!(f, "HTTP client error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::InvalidQuery(e) => write!(f, "Invalid query: {}", e),
            Self::Layer(e) => write!(f, "Layer error: {}", e),
            Self::Upstream(e) => write!(f, "Upstream error: {}", e),
            Self::Catalog(e) => write!(f, "Scene search error: {}", e),
            Self::Inference(e) => write!(f, "Classification error: {}", e),
            Self::Filter(e) => write!(f, "Filter error: {}", e),
            Self::InferenceDisabled => write!(
                f,
                "Classification unavailable: no inference endpoint configured"
            ),
            Self::AddressNotFound(address) => write!(f, "No location found for '{}'", address),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidQuery(e) => Some(e),
            Self::Layer(e) => Some(e),
            Self::Upstream(e) => Some(e),
            Self::Catalog(e) => Some(e),
            Self::Inference(e) => Some(e),
            Self::Filter(e) => Some(e),
            _ => None,
        }
    }
}

impl ServiceError {
    /// True when the caller's input was at fault rather than an upstream.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuery(_)
                | Self::Filter(_)
                | Self::ConfigError(_)
                | Self::InferenceDisabled
                | Self::AddressNotFound(_)
                | Self::Catalog(CatalogError::InvalidCloudCover(_))
                | Self::Layer(LayerError::NotFound(_))
                | Self::Inference(InferenceError::UnsupportedFormat(_))
        )
    }
}

impl From<ValidationError> for ServiceError {
    fn from(e: ValidationError) -> Self {
        Self::InvalidQuery(e)
    }
}

impl From<LayerError> for ServiceError {
    fn from(e: LayerError) -> Self {
        Self::Layer(e)
    }
}

impl From<UpstreamError> for ServiceError {
    fn from(e: UpstreamError) -> Self {
        Self::Upstream(e)
    }
}

impl From<CatalogError> for ServiceError {
    fn from(e: CatalogError) -> Self {
        Self::Catalog(e)
    }
}

impl From<InferenceError> for ServiceError {
    fn from(e: InferenceError) -> Self {
        Self::Inference(e)
    }
}

impl From<FilterError> for ServiceError {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}
