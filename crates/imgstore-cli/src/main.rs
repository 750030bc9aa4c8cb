mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "imgstore", about = "Build and serve a categorized image store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add imgstore.toml and .env.example to an existing Rust project
    Init,
    /// Print the Dockerfile `imgstore build` would use
    Dockerfile,
    /// Eject Dockerfile for manual customization
    Eject,
    /// Build the container image with docker
    Build {
        /// Image tag (default: [project].image_tag or <binary>:latest)
        #[arg(long, short = 't')]
        tag: Option<String>,
        /// Workspace member to build (default: [project].package, else the
        /// member providing the `imgstore` binary)
        #[arg(long, short = 'p')]
        package: Option<String>,
        /// Allow building with uncommitted changes
        #[arg(long)]
        allow_dirty: bool,
    },
    /// Check project and docker setup
    Doctor,
    /// Start the image store server
    Serve(commands::ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init_project().await?,
        Commands::Dockerfile => commands::dockerfile().await?,
        Commands::Eject => commands::eject().await?,
        Commands::Build {
            tag,
            package,
            allow_dirty,
        } => commands::build(tag, package, allow_dirty).await?,
        Commands::Doctor => commands::doctor().await?,
        Commands::Serve(args) => commands::serve(args).await?,
    }

    Ok(())
}
