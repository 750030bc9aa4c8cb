//! Resolve an entry point, prepare the images directory and serve the app.
//!
//! ```text
//! Launcher::run()
//!   1. Resolve  ── AppRegistry::resolve("main:app")  (unknown → EntryPointNotFound)
//!   2. Prepare  ── ImageStore::ensure()             (idempotent)
//!   3. Build    ── AppFactory::build(AppContext)
//!   4. Bind     ── TcpListener::bind(host:port)     (in use → Bind)
//!   5. Serve    ── axum::serve until ctrl-c
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use imgstore_core::ServeConfig;
use secrecy::ExposeSecret;

use crate::app;
use crate::repository::{ImageRepository, RepositoryError};
use crate::state::{AppConfig, AppState};
use crate::storage::{ImageStore, StorageError};

/// The entry point registered by [`AppRegistry::default`].
pub const DEFAULT_ENTRY_POINT: &str = "main:app";

/// A `module:attr` application name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryPoint {
    module: String,
    attr: String,
}

impl EntryPoint {
    pub fn parse(s: &str) -> Result<Self, LaunchError> {
        let invalid = || LaunchError::InvalidEntryPoint(s.to_owned());
        let (module, attr) = s.split_once(':').ok_or_else(invalid)?;
        if !is_identifier_path(module) || !is_identifier(attr) {
            return Err(invalid());
        }
        Ok(Self {
            module: module.to_owned(),
            attr: attr.to_owned(),
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn attr(&self) -> &str {
        &self.attr
    }
}

impl FromStr for EntryPoint {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.attr)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_identifier_path(s: &str) -> bool {
    s.split('.').all(is_identifier)
}

/// Everything an application needs from its environment.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub store: ImageStore,
    pub config: AppConfig,
    pub max_upload_bytes: u64,
}

pub type AppFuture = Pin<Box<dyn Future<Output = Result<Router, LaunchError>> + Send>>;

/// Builds a servable router from an [`AppContext`].
pub trait AppFactory: Send + Sync {
    fn build(&self, ctx: AppContext) -> AppFuture;
}

impl<F, Fut> AppFactory for F
where
    F: Fn(AppContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Router, LaunchError>> + Send + 'static,
{
    fn build(&self, ctx: AppContext) -> AppFuture {
        Box::pin(self(ctx))
    }
}

/// The image store application behind `main:app`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageApp;

impl AppFactory for ImageApp {
    fn build(&self, ctx: AppContext) -> AppFuture {
        Box::pin(async move {
            let repo = ImageRepository::connect(ctx.config.database_url.expose_secret()).await?;
            Ok(app::router(AppState {
                store: ctx.store,
                repo,
                max_upload_bytes: ctx.max_upload_bytes,
            }))
        })
    }
}

/// Entry points the launcher can start.
#[derive(Clone)]
pub struct AppRegistry {
    apps: BTreeMap<EntryPoint, Arc<dyn AppFactory>>,
}

impl AppRegistry {
    /// A registry with no applications.
    pub fn empty() -> Self {
        Self {
            apps: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, entry: EntryPoint, factory: impl AppFactory + 'static) {
        self.apps.insert(entry, Arc::new(factory));
    }

    pub fn entries(&self) -> impl Iterator<Item = &EntryPoint> {
        self.apps.keys()
    }

    pub fn resolve(&self, entry: &EntryPoint) -> Result<Arc<dyn AppFactory>, LaunchError> {
        self.apps
            .get(entry)
            .cloned()
            .ok_or_else(|| LaunchError::EntryPointNotFound {
                entry: entry.to_string(),
                available: self
                    .entries()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(
            EntryPoint {
                module: "main".to_owned(),
                attr: "app".to_owned(),
            },
            ImageApp,
        );
        registry
    }
}

impl fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.apps.keys()).finish()
    }
}

/// Starts one registered application with a serve configuration.
#[derive(Debug)]
pub struct Launcher {
    registry: AppRegistry,
    serve: ServeConfig,
    config: AppConfig,
}

impl Launcher {
    pub fn new(registry: AppRegistry, serve: ServeConfig, config: AppConfig) -> Self {
        Self {
            registry,
            serve,
            config,
        }
    }

    /// Steps 1 to 4: everything that can fail before the first request.
    pub async fn start(self) -> Result<Server, LaunchError> {
        let entry = EntryPoint::parse(&self.serve.app)?;
        let factory = self.registry.resolve(&entry)?;

        let store = ImageStore::new(&self.serve.images_dir);
        store.ensure().await.map_err(|e| LaunchError::ImagesDir {
            path: PathBuf::from(&self.serve.images_dir),
            source: e,
        })?;

        let router = factory
            .build(AppContext {
                store,
                config: self.config,
                max_upload_bytes: self.serve.max_upload_bytes,
            })
            .await?;

        let addr = format!("{}:{}", self.serve.host, self.serve.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| LaunchError::Bind {
                addr: addr.clone(),
                source: e,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| LaunchError::Bind { addr, source: e })?;

        tracing::info!(
            app = %entry,
            addr = %local_addr,
            images_dir = %self.serve.images_dir,
            "listening"
        );

        Ok(Server {
            listener,
            router,
            local_addr,
        })
    }

    /// Start and serve until ctrl-c.
    pub async fn run(self) -> Result<(), LaunchError> {
        self.start().await?.serve(shutdown_signal()).await
    }
}

/// A bound, ready-to-serve application.
#[derive(Debug)]
pub struct Server {
    listener: tokio::net::TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl Server {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), LaunchError> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| LaunchError::Serve { source: e })?;
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("invalid entry point '{0}' — expected 'module:attr'")]
    InvalidEntryPoint(String),

    #[error("entry point '{entry}' not found (registered: {available})")]
    EntryPointNotFound { entry: String, available: String },

    #[error("failed to prepare images directory {path}")]
    ImagesDir { path: PathBuf, source: StorageError },

    #[error("failed to open the image database")]
    Database(#[from] RepositoryError),

    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error")]
    Serve { source: std::io::Error },
}
