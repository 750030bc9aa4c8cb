use std::collections::HashMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "imgstore.toml";

/// imgstore.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImgstoreConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub serve: ServeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (defaults to the start binary)
    pub name: Option<String>,
    /// Image tag used by `imgstore build` (defaults to `<name>:latest`)
    pub image_tag: Option<String>,
    /// Workspace member to build (defaults to the one providing `imgstore`)
    pub package: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Rust builder image
    #[serde(default = "default_builder_image")]
    pub base_image: String,
    /// Runtime base image
    #[serde(default = "default_runtime_image")]
    pub runtime_image: String,
    /// Additional system packages to install via apt-get
    #[serde(default)]
    pub extra_packages: Vec<String>,
    /// Cargo Chef version
    #[serde(default = "default_cargo_chef_version")]
    pub cargo_chef_version: String,
    /// Working directory inside every stage
    #[serde(default = "default_workdir")]
    pub workdir: String,
    /// Files/directories to include in the runtime image.
    /// When None, the entire bundle is copied (COPY . .).
    /// When Some, only the specified paths are copied.
    #[serde(default)]
    pub include: Option<Vec<String>>,
    /// Static environment variables baked into the container image.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Settings shared by the start command and `imgstore serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Entry point resolved by the launcher (`module:attr`)
    #[serde(default = "default_app")]
    pub app: String,
    /// Interface the server binds
    #[serde(default = "default_host")]
    pub host: String,
    /// Port the application listens on (and the descriptor declares)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Writable directory for uploaded images, relative to the workdir
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
    /// Largest accepted upload in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_image: default_builder_image(),
            runtime_image: default_runtime_image(),
            extra_packages: Vec::new(),
            cargo_chef_version: default_cargo_chef_version(),
            workdir: default_workdir(),
            include: None,
            env: HashMap::new(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            app: default_app(),
            host: default_host(),
            port: default_port(),
            images_dir: default_images_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ImgstoreConfig {
    /// Load from imgstore.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        let config: Self = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path.clone(),
                source: e,
            })?
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject paths that would escape the working directory and a zero port.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(include) = &self.build.include {
            for path in include {
                check_relative(path).map_err(|reason| crate::Error::InvalidIncludePath {
                    path: path.clone(),
                    reason,
                })?;
            }
        }

        check_relative(&self.serve.images_dir).map_err(|reason| {
            crate::Error::InvalidImagesDir {
                path: self.serve.images_dir.clone(),
                reason,
            }
        })?;

        if self.serve.port == 0 {
            return Err(crate::Error::InvalidPort);
        }

        Ok(())
    }
}

fn check_relative(path: &str) -> std::result::Result<(), &'static str> {
    if path.trim().is_empty() {
        return Err("path is empty");
    }
    let path = Path::new(path);
    if path.is_absolute() {
        return Err("must be relative to the working directory");
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err("must not contain '..'");
    }
    Ok(())
}

fn default_builder_image() -> String {
    "rust:1.84-bookworm".to_owned()
}

fn default_runtime_image() -> String {
    "debian:bookworm-slim".to_owned()
}

fn default_cargo_chef_version() -> String {
    "0.1.68".to_owned()
}

fn default_workdir() -> String {
    "/app".to_owned()
}

fn default_app() -> String {
    "main:app".to_owned()
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8000
}

fn default_images_dir() -> String {
    "images".to_owned()
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_pass() {
        assert!(check_relative("images").is_ok());
        assert!(check_relative("static/img/").is_ok());
        assert!(check_relative("./images").is_ok());
    }

    #[test]
    fn escaping_paths_fail() {
        assert_eq!(check_relative("/images"), Err("must be relative to the working directory"));
        assert_eq!(check_relative("../images"), Err("must not contain '..'"));
        assert_eq!(check_relative("a/../../b"), Err("must not contain '..'"));
        assert_eq!(check_relative("  "), Err("path is empty"));
    }
}
