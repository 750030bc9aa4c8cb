//! Core types and configuration for imgstore.
//!
//! This crate defines the `imgstore.toml` schema ([`ImgstoreConfig`]),
//! build-context discovery ([`BuildContext`]), and shared error types.

pub mod config;
pub mod context;
pub mod error;

pub use config::{BuildConfig, ImgstoreConfig, ProjectConfig, ServeConfig};
pub use context::{BuildContext, SERVE_BINARY};
pub use error::{Error, Result};
