//! Cache keys for the two cacheable layers of the descriptor.
//!
//! The dependency key covers only what the dependency stage can see: the
//! builder image, cargo-chef version, apt packages and every manifest. The
//! application key chains the dependency key with every file in the context.

use std::io::Read;
use std::path::{Path, PathBuf};

use imgstore_core::BuildConfig;
use imgstore_core::context::is_manifest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::eject::EJECT_DIR;

const LAYERS_FILE: &str = "layers.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerKeys {
    pub dependencies: String,
    pub application: String,
}

impl LayerKeys {
    /// Hash the layer inputs. `files` are context-relative; order does not matter.
    pub fn compute(
        context_dir: &Path,
        files: &[PathBuf],
        config: &BuildConfig,
    ) -> Result<Self, LayerError> {
        let mut sorted: Vec<&PathBuf> = files.iter().collect();
        sorted.sort();

        let mut deps = Sha256::new();
        update_field(&mut deps, config.base_image.as_bytes());
        update_field(&mut deps, config.cargo_chef_version.as_bytes());
        update_field(&mut deps, config.extra_packages.join(" ").as_bytes());
        for file in sorted.iter().filter(|f| is_manifest(f)) {
            hash_file(&mut deps, context_dir, file)?;
        }
        let dependencies = format!("{:x}", deps.finalize());

        let mut app = Sha256::new();
        update_field(&mut app, dependencies.as_bytes());
        for file in &sorted {
            hash_file(&mut app, context_dir, file)?;
        }
        let application = format!("{:x}", app.finalize());

        Ok(Self {
            dependencies,
            application,
        })
    }

    /// Keys recorded by the previous build, if any.
    pub fn load(project_dir: &Path) -> Result<Option<Self>, LayerError> {
        let path = layers_path(project_dir);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| LayerError::Read {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| LayerError::Decode { path, source: e })
    }

    pub fn save(&self, project_dir: &Path) -> Result<(), LayerError> {
        let path = layers_path(project_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LayerError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| LayerError::Decode {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, content).map_err(|e| LayerError::Write { path, source: e })
    }
}

/// Which layers of the previous build can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerReport {
    pub dependencies_reused: bool,
    pub application_reused: bool,
}

impl LayerReport {
    pub fn compare(previous: Option<&LayerKeys>, current: &LayerKeys) -> Self {
        match previous {
            Some(prev) => Self {
                dependencies_reused: prev.dependencies == current.dependencies,
                application_reused: prev.application == current.application,
            },
            None => Self {
                dependencies_reused: false,
                application_reused: false,
            },
        }
    }
}

fn layers_path(project_dir: &Path) -> PathBuf {
    project_dir.join(EJECT_DIR).join(LAYERS_FILE)
}

/// Length-prefixed so adjacent fields cannot run together.
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn hash_file(hasher: &mut Sha256, context_dir: &Path, relative: &Path) -> Result<(), LayerError> {
    let path = context_dir.join(relative);
    let mut file = std::fs::File::open(&path).map_err(|e| LayerError::Read {
        path: path.clone(),
        source: e,
    })?;

    update_field(hasher, relative.to_string_lossy().as_bytes());
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(|e| LayerError::Read { path, source: e })?;
    update_field(hasher, &contents);
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid layer record at {path}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}
