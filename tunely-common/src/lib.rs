//! # Tunely Common Library
//!
//! Shared code for the Tunely services including:
//! - Canonical API types (Track, error bodies)
//! - Configuration file resolution and loading
//! - Human-readable timestamp parsing and formatting
//! - Common error type

pub mod api;
pub mod config;
pub mod error;
pub mod human_time;

pub use api::types::Track;
pub use error::{Error, Result};
