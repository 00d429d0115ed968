//! High-level service facade for bloomwatch operations.
//!
//! [`BloomwatchService`] turns a [`ConfigFile`](crate::config::ConfigFile)
//! into wired upstream clients and an aggregator, so callers only deal with
//! queries and views.

mod config;
mod error;
mod facade;

pub use config::{aggregator_config, collections, retry_policy, validation_config};
pub use error::ServiceError;
pub use facade::BloomwatchService;
