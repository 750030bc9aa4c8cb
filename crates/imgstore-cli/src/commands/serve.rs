use clap::Args;
use imgstore_server::{AppConfig, AppRegistry, Launcher};
use imgstore_core::ImgstoreConfig;
use std::path::Path;

/// Flags override `[serve]` in imgstore.toml.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Entry point to start (module:attr)
    #[arg(long)]
    app: Option<String>,
    /// Interface to bind
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,
    /// Directory uploaded images are stored in
    #[arg(long, env = "IMGSTORE_IMAGES_DIR")]
    images_dir: Option<String>,
}

pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut serve = ImgstoreConfig::load(Path::new("."))?.serve;
    if let Some(app) = args.app {
        serve.app = app;
    }
    if let Some(host) = args.host {
        serve.host = host;
    }
    if let Some(port) = args.port {
        serve.port = port;
    }
    if let Some(images_dir) = args.images_dir {
        serve.images_dir = images_dir;
    }

    let config = AppConfig::load();
    tracing::debug!(?serve, ?config, "serve settings");

    Launcher::new(AppRegistry::default(), serve, config)
        .run()
        .await?;
    Ok(())
}
