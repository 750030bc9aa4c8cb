use std::path::{Path, PathBuf};
use std::process::Command;

use imgstore_build::LayerKeys;
use imgstore_build::bundle::{create_bundle, is_dirty, list_context_files};
use imgstore_build::eject::{eject, is_ejected, load_ejected_dockerfile};
use imgstore_core::BuildConfig;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
}

/// Initialize a git repo with a minimal Rust project and an initial commit.
fn init_git_project(dir: &Path) {
    std::fs::create_dir_all(dir.join("src")).unwrap();
    std::fs::write(dir.join("Cargo.toml"), "[package]\nname = \"test\"").unwrap();
    std::fs::write(dir.join("src/main.rs"), "fn main() {}").unwrap();
    commit_all(dir);
}

fn commit_all(dir: &Path) {
    git(dir, &["init"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "init"]);
}

// ── Bundle Tests ──

#[test]
fn bundle_creates_expected_structure() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);

    let bundle = create_bundle(project, "FROM rust\n").unwrap();

    assert!(bundle.dir.join("Dockerfile").exists());
    assert!(bundle.dir.join("Cargo.toml").exists());
    assert!(bundle.dir.join("src/main.rs").exists());
    assert_eq!(
        bundle.files,
        vec![PathBuf::from("Cargo.toml"), PathBuf::from("src/main.rs")]
    );

    let dockerfile = std::fs::read_to_string(bundle.dir.join("Dockerfile")).unwrap();
    assert_eq!(dockerfile, "FROM rust\n");
}

#[test]
fn bundle_includes_additional_dirs() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();

    std::fs::create_dir_all(project.join("src")).unwrap();
    std::fs::create_dir_all(project.join("migrations")).unwrap();
    std::fs::create_dir_all(project.join("static")).unwrap();
    std::fs::write(project.join("Cargo.toml"), "[package]\nname = \"test\"").unwrap();
    std::fs::write(project.join("src/main.rs"), "fn main() {}").unwrap();
    std::fs::write(project.join("migrations/001.sql"), "CREATE TABLE t;").unwrap();
    std::fs::write(project.join("static/placeholder.png"), "png").unwrap();
    commit_all(project);

    let bundle = create_bundle(project, "FROM rust\n").unwrap();

    assert!(bundle.dir.join("migrations/001.sql").exists());
    assert!(bundle.dir.join("static/placeholder.png").exists());
}

#[test]
fn bundle_respects_gitignore() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();

    std::fs::create_dir_all(project.join("src")).unwrap();
    std::fs::create_dir_all(project.join("images/cats")).unwrap();
    std::fs::write(project.join("Cargo.toml"), "[package]\nname = \"test\"").unwrap();
    std::fs::write(project.join("src/main.rs"), "fn main() {}").unwrap();
    std::fs::write(project.join("images/cats/a.png"), "uploaded").unwrap();
    std::fs::write(project.join(".gitignore"), "images/\n").unwrap();
    commit_all(project);

    let bundle = create_bundle(project, "FROM rust\n").unwrap();

    // Runtime uploads are ignored and never shipped
    assert!(!bundle.dir.join("images").exists());
    assert!(bundle.dir.join("src/main.rs").exists());
    assert!(bundle.dir.join(".gitignore").exists());
}

#[test]
fn bundle_excludes_imgstore_dirs() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();

    std::fs::create_dir_all(project.join("src")).unwrap();
    std::fs::create_dir_all(project.join(".imgstore")).unwrap();
    std::fs::write(project.join("Cargo.toml"), "[package]\nname = \"test\"").unwrap();
    std::fs::write(project.join("src/main.rs"), "fn main() {}").unwrap();
    std::fs::write(project.join(".imgstore/Dockerfile"), "custom").unwrap();
    commit_all(project);

    let bundle = create_bundle(project, "FROM rust\n").unwrap();

    assert!(!bundle.dir.join(".imgstore").exists());
    assert!(bundle.dir.join("src/main.rs").exists());
}

#[test]
fn bundle_cleans_previous_bundle() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);

    let first = create_bundle(project, "FROM rust:1\n").unwrap();
    assert!(first.dir.join("Dockerfile").exists());

    let second = create_bundle(project, "FROM rust:2\n").unwrap();
    let content = std::fs::read_to_string(second.dir.join("Dockerfile")).unwrap();
    assert_eq!(content, "FROM rust:2\n");
    // The previous bundle is not bundled into the next one
    assert!(!second.dir.join(".imgstore-bundle").exists());
}

#[cfg(unix)]
#[test]
fn bundle_never_contains_files_outside_context() {
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "top secret").unwrap();

    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);
    std::os::unix::fs::symlink(outside.path().join("secret.txt"), project.join("leak.txt"))
        .unwrap();
    std::fs::write(project.join("inside.txt"), "fine").unwrap();
    std::os::unix::fs::symlink(project.join("inside.txt"), project.join("alias.txt")).unwrap();

    let files = list_context_files(project).unwrap();
    assert!(!files.contains(&PathBuf::from("leak.txt")));
    assert!(files.contains(&PathBuf::from("alias.txt")));

    let bundle = create_bundle(project, "FROM rust\n").unwrap();
    assert!(!bundle.dir.join("leak.txt").exists());
    assert_eq!(
        std::fs::read_to_string(bundle.dir.join("alias.txt")).unwrap(),
        "fine"
    );
}

#[test]
fn bundle_fails_outside_git_repository() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Cargo.toml"), "[package]\nname = \"test\"").unwrap();

    assert!(create_bundle(tmp.path(), "FROM rust\n").is_err());
}

// ── Dirty Check Tests ──

#[test]
fn is_dirty_clean_repo() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);

    assert!(!is_dirty(project).unwrap());
}

#[test]
fn is_dirty_with_uncommitted_changes() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);

    std::fs::write(
        project.join("src/main.rs"),
        "fn main() { println!(\"dirty\"); }",
    )
    .unwrap();

    assert!(is_dirty(project).unwrap());
}

#[test]
fn is_dirty_with_untracked_file() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    init_git_project(project);

    std::fs::write(project.join("new_file.txt"), "hello").unwrap();

    assert!(is_dirty(project).unwrap());
}

// ── Layer Key Tests ──

fn layer_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    std::fs::create_dir_all(dir.join("src")).unwrap();
    std::fs::write(dir.join("Cargo.toml"), "[package]\nname = \"test\"").unwrap();
    std::fs::write(dir.join("Cargo.lock"), "version = 3\n").unwrap();
    std::fs::write(dir.join("src/main.rs"), "fn main() {}").unwrap();
    tmp
}

fn layer_files() -> Vec<PathBuf> {
    vec![
        PathBuf::from("src/main.rs"),
        PathBuf::from("Cargo.toml"),
        PathBuf::from("Cargo.lock"),
    ]
}

#[test]
fn source_change_keeps_dependency_layer() {
    let tmp = layer_project();
    let config = BuildConfig::default();

    let before = LayerKeys::compute(tmp.path(), &layer_files(), &config).unwrap();
    std::fs::write(tmp.path().join("src/main.rs"), "fn main() { todo!() }").unwrap();
    let after = LayerKeys::compute(tmp.path(), &layer_files(), &config).unwrap();

    assert_eq!(before.dependencies, after.dependencies);
    assert_ne!(before.application, after.application);
}

#[test]
fn manifest_change_invalidates_both_layers() {
    let tmp = layer_project();
    let config = BuildConfig::default();

    let before = LayerKeys::compute(tmp.path(), &layer_files(), &config).unwrap();
    std::fs::write(
        tmp.path().join("Cargo.toml"),
        "[package]\nname = \"test\"\n\n[dependencies]\nserde = \"1\"\n",
    )
    .unwrap();
    let after = LayerKeys::compute(tmp.path(), &layer_files(), &config).unwrap();

    assert_ne!(before.dependencies, after.dependencies);
    assert_ne!(before.application, after.application);
}

#[test]
fn builder_image_change_invalidates_dependency_layer() {
    let tmp = layer_project();
    let before = LayerKeys::compute(tmp.path(), &layer_files(), &BuildConfig::default()).unwrap();
    let config = BuildConfig {
        base_image: "rust:1.85-bookworm".to_owned(),
        ..Default::default()
    };
    let after = LayerKeys::compute(tmp.path(), &layer_files(), &config).unwrap();

    assert_ne!(before.dependencies, after.dependencies);
}

#[test]
fn layer_keys_ignore_file_order() {
    let tmp = layer_project();
    let config = BuildConfig::default();
    let mut reversed = layer_files();
    reversed.reverse();

    assert_eq!(
        LayerKeys::compute(tmp.path(), &layer_files(), &config).unwrap(),
        LayerKeys::compute(tmp.path(), &reversed, &config).unwrap()
    );
}

#[test]
fn layer_keys_missing_file_is_an_error() {
    let tmp = layer_project();
    let mut files = layer_files();
    files.push(PathBuf::from("src/gone.rs"));

    assert!(LayerKeys::compute(tmp.path(), &files, &BuildConfig::default()).is_err());
}

#[test]
fn layer_keys_save_and_load() {
    let tmp = layer_project();
    assert!(LayerKeys::load(tmp.path()).unwrap().is_none());

    let keys = LayerKeys::compute(tmp.path(), &layer_files(), &BuildConfig::default()).unwrap();
    keys.save(tmp.path()).unwrap();

    assert!(tmp.path().join(".imgstore/layers.json").exists());
    assert_eq!(LayerKeys::load(tmp.path()).unwrap(), Some(keys));
}

// ── Eject Tests ──

#[test]
fn eject_creates_imgstore_dir_with_dockerfile() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();

    assert!(!is_ejected(project));

    let path = eject(project, "FROM rust:1.85\nRUN cargo build\n").unwrap();

    assert!(is_ejected(project));
    assert_eq!(path, project.join(".imgstore/Dockerfile"));
}

#[test]
fn eject_preserves_dockerfile_content() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();
    let content = "FROM rust:1.85\nWORKDIR /app\nCOPY . .\nRUN cargo build --release\n";

    eject(project, content).unwrap();

    let loaded = load_ejected_dockerfile(project).unwrap();
    assert_eq!(loaded, content);
}

#[test]
fn eject_fails_if_already_ejected() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path();

    eject(project, "first").unwrap();
    let result = eject(project, "second");

    assert!(result.is_err());
    let err = result.unwrap_err().to_string();
    assert!(err.contains("already ejected"));
}

#[test]
fn is_ejected_false_without_imgstore_dir() {
    let tmp = TempDir::new().unwrap();
    assert!(!is_ejected(tmp.path()));
}
