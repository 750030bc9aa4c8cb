use imgstore_build::bundle;
use imgstore_build::{LayerKeys, LayerReport, validate_dockerfile};
use imgstore_core::ImgstoreConfig;
use imgstore_docker::DockerClient;
use std::path::PathBuf;

/// Run the build pipeline: context → dirty check → descriptor → contract →
/// bundle → layer keys → docker build.
pub async fn build(
    tag: Option<String>,
    package: Option<String>,
    allow_dirty: bool,
) -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = ImgstoreConfig::load(&project_dir)?;

    // Fail fast on a missing manifest, before anything is copied
    let context = super::open_context(&project_dir, &config, package.as_deref())?;
    println!(
        "Building package {} v{} (binary `{}`)",
        context.name, context.version, context.binary_name
    );

    // Dirty check: refuse to build uncommitted changes unless --allow-dirty
    if !allow_dirty && bundle::is_dirty(&context.dir)? {
        anyhow::bail!(
            "uncommitted changes detected.\n\
             Commit your changes, or use `imgstore build --allow-dirty` to build anyway."
        );
    }

    let image_tag = tag
        .or_else(|| config.project.image_tag.clone())
        .unwrap_or_else(|| {
            let name = config.project.name.as_deref().unwrap_or(&context.binary_name);
            format!("{name}:latest")
        });

    // Determine Dockerfile content
    let (dockerfile, ejected) = super::resolve_dockerfile(&context.dir, &config, &context)?;
    if ejected {
        println!("Using ejected Dockerfile from .imgstore/Dockerfile");
    }

    // Launch contract
    let violations = validate_dockerfile(&dockerfile)?;
    if !violations.is_empty() {
        let list = violations
            .iter()
            .map(|v| format!("  - {v}"))
            .collect::<Vec<_>>()
            .join("\n");
        anyhow::bail!("Dockerfile breaks the launch contract:\n{list}");
    }

    // Bundle source
    println!("Bundling source...");
    let bundle = bundle::create_bundle(&context.dir, &dockerfile)?;

    // Layer keys
    let keys = LayerKeys::compute(&context.dir, &bundle.files, &config.build)?;
    let previous = LayerKeys::load(&context.dir)?;
    let report = LayerReport::compare(previous.as_ref(), &keys);
    println!(
        "Dependency layer: {}",
        if report.dependencies_reused {
            "unchanged (cache reusable)"
        } else {
            "changed (dependencies rebuild)"
        }
    );
    println!(
        "Application layer: {}",
        if report.application_reused {
            "unchanged"
        } else {
            "changed"
        }
    );

    // docker build
    println!("Building {image_tag}...");
    let client = DockerClient::new();
    client.build(&bundle.dir, &image_tag).await?;
    keys.save(&context.dir)?;

    let image_id = client.image_id(&image_tag).await?;
    println!();
    println!("Built {image_tag} ({image_id})");
    println!(
        "Run it with: docker run -p {port}:{port} {image_tag}",
        port = config.serve.port
    );

    Ok(())
}
