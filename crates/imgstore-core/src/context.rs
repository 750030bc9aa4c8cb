//! Build-context discovery.
//!
//! A build context is the directory handed to `docker build`. Opening one
//! checks the dependency manifest before anything is copied, so a missing
//! `Cargo.toml` aborts the pipeline at its first step.
//!
//! The context may be a single package or a workspace root. In a workspace
//! the package is picked explicitly, or else it is the member that provides
//! the [`SERVE_BINARY`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The dependency manifest every build context must carry.
pub const MANIFEST: &str = "Cargo.toml";

/// Lockfile that pins the dependency layer when present.
pub const LOCKFILE: &str = "Cargo.lock";

/// Binary that serves registered entry points (`imgstore serve`).
pub const SERVE_BINARY: &str = "imgstore";

/// Version assumed when a manifest declares none.
const DEFAULT_VERSION: &str = "0.1.0";

/// A validated build context.
///
/// # Examples
///
/// ```no_run
/// use imgstore_core::BuildContext;
/// use std::path::Path;
///
/// let context = BuildContext::open(Path::new(".")).unwrap();
/// println!("building {} v{} ({})", context.name, context.version, context.binary_name);
/// ```
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Canonical path of the context directory
    pub dir: PathBuf,
    /// Package the binary is built from (`cargo build -p <name>`)
    pub name: String,
    /// Package version (`0.1.0` when omitted)
    pub version: String,
    /// Binary the start command runs: `imgstore` when the package has it,
    /// else its first `[[bin]]`, else the package name
    pub binary_name: String,
    /// Whether `Cargo.lock` sits at the context root
    pub has_lockfile: bool,
}

#[derive(Deserialize)]
struct CargoToml {
    package: Option<PackageSection>,
    bin: Option<Vec<BinSection>>,
    workspace: Option<WorkspaceSection>,
}

#[derive(Deserialize)]
struct PackageSection {
    name: Option<String>,
    version: Option<toml::Value>,
}

#[derive(Deserialize)]
struct BinSection {
    name: Option<String>,
}

#[derive(Deserialize)]
struct WorkspaceSection {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
    package: Option<WorkspacePackage>,
}

#[derive(Deserialize)]
struct WorkspacePackage {
    version: Option<String>,
}

/// A package found in the context.
struct Package {
    name: String,
    version: Option<toml::Value>,
    binaries: Vec<String>,
}

impl Package {
    fn from_manifest(path: &Path, manifest: &CargoToml) -> crate::Result<Option<Self>> {
        let Some(package) = &manifest.package else {
            return Ok(None);
        };
        let name = package
            .name
            .clone()
            .ok_or_else(|| crate::Error::MissingPackageName(path.to_path_buf()))?;
        let binaries = manifest
            .bin
            .iter()
            .flatten()
            .filter_map(|b| b.name.clone())
            .collect();
        Ok(Some(Self {
            name,
            version: package.version.clone(),
            binaries,
        }))
    }

    fn provides(&self, binary: &str) -> bool {
        self.binaries.iter().any(|b| b == binary)
    }

    fn start_binary(&self) -> String {
        if self.provides(SERVE_BINARY) {
            return SERVE_BINARY.to_owned();
        }
        self.binaries
            .first()
            .cloned()
            .unwrap_or_else(|| self.name.clone())
    }
}

impl BuildContext {
    /// Open the build context rooted at `dir`, choosing the package automatically.
    ///
    /// # Errors
    ///
    /// - [`Error::ContextResolve`](crate::Error::ContextResolve) if `dir` cannot be canonicalized
    /// - [`Error::MissingManifest`](crate::Error::MissingManifest) if `Cargo.toml` is absent
    /// - [`Error::NoServePackage`](crate::Error::NoServePackage) for a workspace where no
    ///   single member can be chosen
    pub fn open(dir: &Path) -> crate::Result<Self> {
        Self::open_package(dir, None)
    }

    /// Open the build context rooted at `dir`, building `package` when given.
    ///
    /// `package` may name the root package or any workspace member.
    pub fn open_package(dir: &Path, package: Option<&str>) -> crate::Result<Self> {
        let dir = dir
            .canonicalize()
            .map_err(|e| crate::Error::ContextResolve {
                path: dir.to_path_buf(),
                source: e,
            })?;

        let manifest_path = dir.join(MANIFEST);
        if !manifest_path.is_file() {
            return Err(crate::Error::MissingManifest {
                path: manifest_path,
            });
        }

        let root = read_manifest(&manifest_path)?;
        let root_is_package = root.package.is_some();
        let workspace_version = root
            .workspace
            .as_ref()
            .and_then(|w| w.package.as_ref())
            .and_then(|p| p.version.clone());

        let mut packages: Vec<Package> = Package::from_manifest(&manifest_path, &root)?
            .into_iter()
            .collect();
        if let Some(workspace) = &root.workspace {
            for member in member_dirs(&dir, workspace)? {
                let path = member.join(MANIFEST);
                if let Some(package) = Package::from_manifest(&path, &read_manifest(&path)?)? {
                    packages.push(package);
                }
            }
        }
        if packages.is_empty() {
            return Err(crate::Error::MissingPackageSection(manifest_path));
        }

        let available = || {
            packages
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let chosen = match package {
            Some(name) => packages
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| crate::Error::PackageNotFound {
                    name: name.to_owned(),
                    available: available(),
                })?,
            None if root_is_package => packages
                .first()
                .ok_or_else(|| crate::Error::MissingPackageSection(manifest_path.clone()))?,
            None => packages
                .iter()
                .find(|p| p.provides(SERVE_BINARY))
                .or_else(|| packages.first().filter(|_| packages.len() == 1))
                .ok_or_else(|| crate::Error::NoServePackage {
                    path: manifest_path.clone(),
                    available: available(),
                })?,
        };

        let version = match &chosen.version {
            Some(toml::Value::String(v)) => v.clone(),
            // `version.workspace = true`
            Some(toml::Value::Table(_)) => workspace_version
                .clone()
                .unwrap_or_else(|| DEFAULT_VERSION.to_owned()),
            _ => DEFAULT_VERSION.to_owned(),
        };
        let name = chosen.name.clone();
        let binary_name = chosen.start_binary();
        let has_lockfile = dir.join(LOCKFILE).is_file();

        tracing::debug!(
            dir = %dir.display(),
            package = %name,
            binary = %binary_name,
            packages = packages.len(),
            has_lockfile,
            "build context opened"
        );

        Ok(Self {
            dir,
            name,
            version,
            binary_name,
            has_lockfile,
        })
    }

    /// Path of the dependency manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST)
    }
}

fn read_manifest(path: &Path) -> crate::Result<CargoToml> {
    let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ManifestRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| crate::Error::ManifestParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Member directories of a workspace. Supports literal paths and `dir/*`.
fn member_dirs(root: &Path, workspace: &WorkspaceSection) -> crate::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for member in &workspace.members {
        let member = member.trim_end_matches('/');
        let Some(parent) = member.strip_suffix("/*") else {
            dirs.push(root.join(member));
            continue;
        };

        let parent = root.join(parent);
        let entries = std::fs::read_dir(&parent).map_err(|e| crate::Error::ManifestRead {
            path: parent.clone(),
            source: e,
        })?;
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| crate::Error::ManifestRead {
                path: parent.clone(),
                source: e,
            })?;
            if entry.path().join(MANIFEST).is_file() {
                found.push(entry.path());
            }
        }
        found.sort();
        dirs.extend(found);
    }

    let excluded: Vec<PathBuf> = workspace.exclude.iter().map(|e| root.join(e)).collect();
    dirs.retain(|d| !excluded.contains(d));
    Ok(dirs)
}

/// Whether a context-relative path names a dependency manifest or lockfile.
///
/// Nested workspace members count too: `crates/api/Cargo.toml` is a manifest.
pub fn is_manifest(relative: &Path) -> bool {
    relative
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == MANIFEST || n == LOCKFILE)
}
