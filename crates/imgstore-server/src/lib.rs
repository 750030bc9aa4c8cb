//! Categorized image store served over HTTP, and the launcher that starts it.
//!
//! Images live on disk under `<images_dir>/<category>/<uuid>.<ext>`; one row
//! per image is kept in SQLite through [`ImageRepository`]. The launcher
//! resolves a `module:attr` entry point (`main:app` by default) from an
//! [`AppRegistry`], prepares the images directory and serves the resulting
//! router.
//!
//! ```rust,no_run
//! use imgstore_server::{AppConfig, AppRegistry, Launcher};
//! use imgstore_core::ServeConfig;
//!
//! # async fn run() -> Result<(), imgstore_server::LaunchError> {
//! Launcher::new(AppRegistry::default(), ServeConfig::default(), AppConfig::load())
//!     .run()
//!     .await
//! # }
//! ```

pub mod app;
pub mod error;
pub mod launch;
pub mod repository;
pub mod state;
pub mod storage;
pub mod validation;

pub use error::ApiError;
pub use launch::{AppContext, AppFactory, AppRegistry, EntryPoint, ImageApp, LaunchError, Launcher};
pub use repository::{Image, ImageRepository, RepositoryError};
pub use state::{AppConfig, AppState};
pub use storage::{ImageStore, StorageError};
