use std::path::Path;

use imgstore_core::config::CONFIG_FILE;

const IMGSTORE_TOML: &str = r#"[project]
# image_tag = "my-images:latest"
# package = "my-server"

[build]
# base_image = "rust:1.84-bookworm"
# runtime_image = "debian:bookworm-slim"
# extra_packages = []

[serve]
# app = "main:app"
# port = 8000
# images_dir = "images"
"#;

const ENV_EXAMPLE: &str = r#"DATABASE_URL=sqlite://imgstore.db?mode=rwc
# IMGSTORE_IMAGES_DIR=images
# RUST_LOG=info
"#;

/// Initialize imgstore in an existing Rust project.
pub async fn init_project() -> anyhow::Result<()> {
    // Must be inside a Cargo project
    if !Path::new("Cargo.toml").exists() {
        anyhow::bail!("Cargo.toml not found. Run this command from a Rust project root.");
    }

    let mut created = Vec::new();

    for (name, content) in [(CONFIG_FILE, IMGSTORE_TOML), (".env.example", ENV_EXAMPLE)] {
        let path = Path::new(name);
        if path.exists() {
            eprintln!("{name} already exists, skipping");
        } else {
            std::fs::write(path, content)?;
            created.push(name);
        }
    }

    if created.is_empty() {
        println!("Nothing to create — already initialized.");
    } else {
        for f in &created {
            println!("Created {f}");
        }
    }

    println!();
    println!("Next steps:");
    println!();
    println!("  1. Configure the database:");
    println!("     cp .env.example .env");
    println!();
    println!("  2. Run locally:");
    println!("     imgstore serve --host 127.0.0.1");
    println!();
    println!("  3. Build the container image:");
    println!("     imgstore build");

    Ok(())
}
