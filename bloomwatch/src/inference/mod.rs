//! Image classification through a remote inference endpoint.

mod client;
mod format;

pub use client::{
    parse_response, ClassificationResult, InferenceClient, InferenceError,
    DEFAULT_INFERENCE_TIMEOUT_SECS, UNKNOWN_MODEL_VERSION,
};
pub use format::ImageFormat;
