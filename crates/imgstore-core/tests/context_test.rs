use imgstore_core::{BuildContext, Error, SERVE_BINARY};
use std::path::Path;
use tempfile::TempDir;

#[test]
fn extracts_name_and_version() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[package]
name = "my-api"
version = "1.2.3"
"#;
    std::fs::write(tmp.path().join("Cargo.toml"), toml).unwrap();

    let context = BuildContext::open(tmp.path()).unwrap();
    assert_eq!(context.name, "my-api");
    assert_eq!(context.version, "1.2.3");
    assert_eq!(context.binary_name, "my-api");
    assert!(!context.has_lockfile);
}

#[test]
fn uses_bin_name_when_present() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[package]
name = "my-lib"
version = "0.1.0"

[[bin]]
name = "imgstore"
path = "src/main.rs"
"#;
    std::fs::write(tmp.path().join("Cargo.toml"), toml).unwrap();

    let context = BuildContext::open(tmp.path()).unwrap();
    assert_eq!(context.name, "my-lib");
    assert_eq!(context.binary_name, "imgstore");
}

#[test]
fn defaults_version_when_missing_or_inherited() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("Cargo.toml"),
        "[package]\nname = \"no-version\"\n",
    )
    .unwrap();
    assert_eq!(BuildContext::open(tmp.path()).unwrap().version, "0.1.0");

    std::fs::write(
        tmp.path().join("Cargo.toml"),
        "[package]\nname = \"member\"\nversion.workspace = true\n",
    )
    .unwrap();
    assert_eq!(BuildContext::open(tmp.path()).unwrap().version, "0.1.0");
}

#[test]
fn detects_lockfile() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Cargo.toml"), "[package]\nname = \"locked\"").unwrap();
    std::fs::write(tmp.path().join("Cargo.lock"), "version = 3\n").unwrap();

    let context = BuildContext::open(tmp.path()).unwrap();
    assert!(context.has_lockfile);
    assert!(context.manifest_path().ends_with("Cargo.toml"));
}

#[test]
fn missing_manifest_fails_fast() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("src")).unwrap();
    std::fs::write(tmp.path().join("src/main.rs"), "fn main() {}").unwrap();

    let result = BuildContext::open(tmp.path());
    assert!(matches!(result, Err(Error::MissingManifest { .. })));

    let err = result.unwrap_err().to_string();
    assert!(err.contains("Cargo.toml"), "got: {err}");
}

#[test]
fn missing_directory_is_a_resolve_error() {
    let tmp = TempDir::new().unwrap();
    let result = BuildContext::open(&tmp.path().join("does-not-exist"));
    assert!(matches!(result, Err(Error::ContextResolve { .. })));
}

#[test]
fn error_when_workspace_has_no_members() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Cargo.toml"), "[workspace]\nmembers = []").unwrap();

    let result = BuildContext::open(tmp.path());
    assert!(matches!(result, Err(Error::MissingPackageSection(_))));
    assert!(result.unwrap_err().to_string().contains("[package]"));
}

// ── Workspaces ──

fn write_member(root: &Path, dir: &str, manifest: &str) {
    let member = root.join(dir);
    std::fs::create_dir_all(&member).unwrap();
    std::fs::write(member.join("Cargo.toml"), manifest).unwrap();
}

fn write_workspace(root: &Path) {
    std::fs::write(
        root.join("Cargo.toml"),
        "[workspace]\nmembers = [\"crates/*\", \"tools/gen\"]\n\n[workspace.package]\nversion = \"2.0.0\"\n",
    )
    .unwrap();
    write_member(root, "crates/core", "[package]\nname = \"app-core\"\nversion.workspace = true\n");
    write_member(
        root,
        "crates/cli",
        "[package]\nname = \"app-cli\"\nversion.workspace = true\n\n[[bin]]\nname = \"imgstore\"\npath = \"src/main.rs\"\n",
    );
    write_member(
        root,
        "tools/gen",
        "[package]\nname = \"gen\"\nversion = \"0.3.0\"\n\n[[bin]]\nname = \"gen-assets\"\n",
    );
}

#[test]
fn workspace_root_selects_member_providing_serve_binary() {
    let tmp = TempDir::new().unwrap();
    write_workspace(tmp.path());
    std::fs::write(tmp.path().join("Cargo.lock"), "version = 3\n").unwrap();

    let context = BuildContext::open(tmp.path()).unwrap();
    assert_eq!(context.name, "app-cli");
    assert_eq!(context.binary_name, SERVE_BINARY);
    assert_eq!(context.version, "2.0.0");
    assert!(context.has_lockfile);
    assert_eq!(context.dir, tmp.path().canonicalize().unwrap());
}

#[test]
fn workspace_package_can_be_chosen() {
    let tmp = TempDir::new().unwrap();
    write_workspace(tmp.path());

    let context = BuildContext::open_package(tmp.path(), Some("gen")).unwrap();
    assert_eq!(context.name, "gen");
    assert_eq!(context.binary_name, "gen-assets");
    assert_eq!(context.version, "0.3.0");
}

#[test]
fn unknown_package_lists_what_exists() {
    let tmp = TempDir::new().unwrap();
    write_workspace(tmp.path());

    let err = BuildContext::open_package(tmp.path(), Some("nope")).unwrap_err();
    assert!(matches!(err, Error::PackageNotFound { .. }));
    let msg = err.to_string();
    assert!(msg.contains("'nope'"), "got: {msg}");
    assert!(msg.contains("app-cli") && msg.contains("gen"), "got: {msg}");
}

#[test]
fn workspace_without_serve_binary_needs_a_choice() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("Cargo.toml"),
        "[workspace]\nmembers = [\"a\", \"b\"]\n",
    )
    .unwrap();
    write_member(tmp.path(), "a", "[package]\nname = \"a\"\n");
    write_member(tmp.path(), "b", "[package]\nname = \"b\"\n");

    let err = BuildContext::open(tmp.path()).unwrap_err();
    assert!(matches!(err, Error::NoServePackage { .. }));
    assert!(err.to_string().contains("--package"));
}

#[test]
fn single_member_workspace_needs_no_choice() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Cargo.toml"), "[workspace]\nmembers = [\"only\"]\n").unwrap();
    write_member(tmp.path(), "only", "[package]\nname = \"only\"\n");

    let context = BuildContext::open(tmp.path()).unwrap();
    assert_eq!(context.name, "only");
    assert_eq!(context.binary_name, "only");
}

#[test]
fn excluded_members_are_skipped() {
    let tmp = TempDir::new().unwrap();
    write_workspace(tmp.path());
    let manifest = std::fs::read_to_string(tmp.path().join("Cargo.toml")).unwrap();
    std::fs::write(
        tmp.path().join("Cargo.toml"),
        manifest.replace("[workspace]\n", "[workspace]\nexclude = [\"crates/cli\"]\n"),
    )
    .unwrap();

    let err = BuildContext::open_package(tmp.path(), Some("app-cli")).unwrap_err();
    assert!(matches!(err, Error::PackageNotFound { .. }));
}

#[test]
fn root_package_prefers_serve_binary() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("Cargo.toml"),
        "[package]\nname = \"multi\"\n\n[[bin]]\nname = \"migrate\"\n\n[[bin]]\nname = \"imgstore\"\n",
    )
    .unwrap();

    let context = BuildContext::open(tmp.path()).unwrap();
    assert_eq!(context.binary_name, SERVE_BINARY);
}

#[test]
fn error_when_missing_package_name() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("Cargo.toml"),
        "[package]\nversion = \"0.1.0\"",
    )
    .unwrap();

    let result = BuildContext::open(tmp.path());
    assert!(matches!(result, Err(Error::MissingPackageName(_))));
}

#[test]
fn unparsable_manifest_is_reported() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Cargo.toml"), "[package\nname = ").unwrap();

    let result = BuildContext::open(tmp.path());
    assert!(matches!(result, Err(Error::ManifestParse { .. })));
}
