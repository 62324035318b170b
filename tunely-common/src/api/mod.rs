//! API module for shared HTTP API types
//!
//! Contains only plain serializable types; each service wraps them with its
//! own framework-specific handlers.

pub mod types;

pub use types::{ErrorResponse, Track};
