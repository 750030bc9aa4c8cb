use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid include path {path:?}: {reason}")]
    InvalidIncludePath { path: String, reason: &'static str },

    #[error("invalid images directory {path:?}: {reason}")]
    InvalidImagesDir { path: String, reason: &'static str },

    #[error("invalid port 0 in [serve] — choose a port between 1 and 65535")]
    InvalidPort,

    // ── Build context ──
    #[error("failed to resolve build context {path}")]
    ContextResolve {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("dependency manifest not found at {path} — the build needs a Cargo.toml")]
    MissingManifest { path: PathBuf },

    #[error("failed to read manifest {path}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}")]
    ManifestParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("no [package] section or workspace members in {0}")]
    MissingPackageSection(PathBuf),

    #[error("package '{name}' is not in the build context (found: {available})")]
    PackageNotFound { name: String, available: String },

    #[error(
        "no package in {path} provides the `imgstore` binary (found: {available}); set [project] package or pass --package"
    )]
    NoServePackage { path: PathBuf, available: String },

    #[error("no package name in {0}")]
    MissingPackageName(PathBuf),
}
