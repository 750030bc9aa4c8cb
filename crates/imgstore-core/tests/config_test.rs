use imgstore_core::{Error, ImgstoreConfig};
use tempfile::TempDir;

#[test]
fn load_returns_defaults_when_no_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = ImgstoreConfig::load(tmp.path()).unwrap();

    assert!(config.project.name.is_none());
    assert!(config.project.image_tag.is_none());
    assert_eq!(config.build.base_image, "rust:1.84-bookworm");
    assert_eq!(config.build.runtime_image, "debian:bookworm-slim");
    assert_eq!(config.build.workdir, "/app");
    assert!(config.build.extra_packages.is_empty());
    assert_eq!(config.serve.app, "main:app");
    assert_eq!(config.serve.host, "0.0.0.0");
    assert_eq!(config.serve.port, 8000);
    assert_eq!(config.serve.images_dir, "images");
    assert_eq!(config.serve.max_upload_bytes, 10 * 1024 * 1024);
}

#[test]
fn load_parses_full_config() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[project]
name = "gallery"
image_tag = "registry.local/gallery:1"

[build]
base_image = "rust:1.82-slim"
runtime_image = "ubuntu:24.04"
extra_packages = ["libssl-dev", "pkg-config"]
cargo_chef_version = "0.1.70"
workdir = "/srv"

[serve]
app = "main:gallery"
host = "127.0.0.1"
port = 9000
images_dir = "uploads"
max_upload_bytes = 1048576
"#;
    std::fs::write(tmp.path().join("imgstore.toml"), toml).unwrap();

    let config = ImgstoreConfig::load(tmp.path()).unwrap();

    assert_eq!(config.project.name.as_deref(), Some("gallery"));
    assert_eq!(
        config.project.image_tag.as_deref(),
        Some("registry.local/gallery:1")
    );
    assert_eq!(config.build.base_image, "rust:1.82-slim");
    assert_eq!(config.build.runtime_image, "ubuntu:24.04");
    assert_eq!(
        config.build.extra_packages,
        vec!["libssl-dev", "pkg-config"]
    );
    assert_eq!(config.build.cargo_chef_version, "0.1.70");
    assert_eq!(config.build.workdir, "/srv");
    assert_eq!(config.serve.app, "main:gallery");
    assert_eq!(config.serve.host, "127.0.0.1");
    assert_eq!(config.serve.port, 9000);
    assert_eq!(config.serve.images_dir, "uploads");
    assert_eq!(config.serve.max_upload_bytes, 1_048_576);
}

#[test]
fn load_partial_config_fills_defaults() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[serve]
port = 8081
"#;
    std::fs::write(tmp.path().join("imgstore.toml"), toml).unwrap();

    let config = ImgstoreConfig::load(tmp.path()).unwrap();

    assert_eq!(config.serve.port, 8081);
    assert_eq!(config.serve.app, "main:app");
    assert_eq!(config.serve.images_dir, "images");
    assert_eq!(config.build.base_image, "rust:1.84-bookworm");
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("imgstore.toml"), "not valid {{{{ toml").unwrap();

    let result = ImgstoreConfig::load(tmp.path());
    assert!(result.is_err());

    let err = result.unwrap_err().to_string();
    assert!(err.contains("parse"));
}

#[test]
fn load_empty_config_returns_defaults() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("imgstore.toml"), "").unwrap();

    let config = ImgstoreConfig::load(tmp.path()).unwrap();
    assert_eq!(config.serve.port, 8000);
}

// ── include / env Tests ──

#[test]
fn load_defaults_include_is_none() {
    let tmp = TempDir::new().unwrap();
    let config = ImgstoreConfig::load(tmp.path()).unwrap();

    assert!(config.build.include.is_none());
    assert!(config.build.env.is_empty());
}

#[test]
fn load_include_paths() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[build]
include = ["migrations/", "static/"]
"#;
    std::fs::write(tmp.path().join("imgstore.toml"), toml).unwrap();

    let config = ImgstoreConfig::load(tmp.path()).unwrap();

    let include = config.build.include.unwrap();
    assert_eq!(include, vec!["migrations/", "static/"]);
}

#[test]
fn load_build_env() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[build.env]
RUST_LOG = "info"
IMGSTORE_IMAGES_DIR = "/app/images"
"#;
    std::fs::write(tmp.path().join("imgstore.toml"), toml).unwrap();

    let config = ImgstoreConfig::load(tmp.path()).unwrap();

    assert_eq!(config.build.env.len(), 2);
    assert_eq!(config.build.env["RUST_LOG"], "info");
    assert_eq!(config.build.env["IMGSTORE_IMAGES_DIR"], "/app/images");
}

// ── Validation ──

#[test]
fn include_outside_context_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[build]
include = ["static/", "../secrets"]
"#;
    std::fs::write(tmp.path().join("imgstore.toml"), toml).unwrap();

    let result = ImgstoreConfig::load(tmp.path());
    assert!(matches!(
        result,
        Err(Error::InvalidIncludePath { ref path, .. }) if path == "../secrets"
    ));
}

#[test]
fn absolute_images_dir_is_rejected() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("imgstore.toml"),
        "[serve]\nimages_dir = \"/var/images\"\n",
    )
    .unwrap();

    let result = ImgstoreConfig::load(tmp.path());
    assert!(matches!(result, Err(Error::InvalidImagesDir { .. })));
}

#[test]
fn zero_port_is_rejected() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("imgstore.toml"), "[serve]\nport = 0\n").unwrap();

    let result = ImgstoreConfig::load(tmp.path());
    assert!(matches!(result, Err(Error::InvalidPort)));
}
