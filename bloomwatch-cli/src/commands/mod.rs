//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`view`] - Build the combined map view for an area
//! - [`layers`] - List and describe catalog layers
//! - [`scenes`] - Search satellite scenes
//! - [`classify`] - Classify an image file
//! - [`config`] - Configuration management (path, show, init)

pub mod classify;
pub mod common;
pub mod config;
pub mod layers;
pub mod scenes;
pub mod view;
