use std::fmt;

use secrecy::SecretString;

use crate::repository::ImageRepository;
use crate::storage::ImageStore;

/// Database used when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://imgstore.db?mode=rwc";

/// Runtime settings read from the environment.
///
/// Locally reads from `.env` via dotenvy, in a container from the
/// environment the image was started with.
///
/// `database_url` may carry credentials and is wrapped in [`SecretString`]
/// to keep it out of logs and debug output.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: SecretString,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[REDACTED]")
            .finish()
    }
}

impl AppConfig {
    /// Load settings from the environment, falling back to defaults.
    pub fn load() -> Self {
        // Attempt to load .env file (silently ignore if not found)
        let dotenv_loaded = dotenvy::dotenv().is_ok();
        tracing::debug!(dotenv = dotenv_loaded, "loading AppConfig");

        let database_url = std::env::var("DATABASE_URL")
            // arch-lint: allow(no-silent-result-drop) reason="an unset DATABASE_URL selects the local SQLite default"
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned());

        Self {
            database_url: SecretString::from(database_url),
        }
    }

    pub fn with_database_url(url: &str) -> Self {
        Self {
            database_url: SecretString::from(url.to_owned()),
        }
    }
}

/// Shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: ImageStore,
    pub repo: ImageRepository,
    pub max_upload_bytes: u64,
}
