use std::path::{Path, PathBuf};

/// Directory holding ejected build files, relative to the project.
pub const EJECT_DIR: &str = ".imgstore";

/// Writes the descriptor into the project for manual editing.
///
/// After ejecting, `imgstore build` will use `.imgstore/Dockerfile`
/// instead of generating one.
pub fn eject(project_dir: &Path, dockerfile_content: &str) -> Result<PathBuf, EjectError> {
    let eject_dir = project_dir.join(EJECT_DIR);
    std::fs::create_dir_all(&eject_dir).map_err(|e| EjectError::CreateDir {
        path: eject_dir.clone(),
        source: e,
    })?;

    let dockerfile_path = ejected_path(project_dir);
    if dockerfile_path.exists() {
        return Err(EjectError::AlreadyEjected(dockerfile_path));
    }

    std::fs::write(&dockerfile_path, dockerfile_content).map_err(|e| EjectError::Write {
        path: dockerfile_path.clone(),
        source: e,
    })?;

    tracing::debug!(path = %dockerfile_path.display(), "descriptor ejected");
    Ok(dockerfile_path)
}

/// Path of the ejected Dockerfile (whether or not it exists).
pub fn ejected_path(project_dir: &Path) -> PathBuf {
    project_dir.join(EJECT_DIR).join("Dockerfile")
}

/// Check if the project has ejected build config.
pub fn is_ejected(project_dir: &Path) -> bool {
    ejected_path(project_dir).exists()
}

/// Load ejected Dockerfile content.
pub fn load_ejected_dockerfile(project_dir: &Path) -> Result<String, EjectError> {
    let path = ejected_path(project_dir);
    std::fs::read_to_string(&path).map_err(|e| EjectError::Read { path, source: e })
}

#[derive(Debug, thiserror::Error)]
pub enum EjectError {
    #[error("failed to create .imgstore directory at {path}")]
    CreateDir { path: PathBuf, source: std::io::Error },
    #[error("build config already ejected at {0} — edit directly or delete to re-eject")]
    AlreadyEjected(PathBuf),
    #[error("failed to write {path}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to read ejected Dockerfile at {path}")]
    Read { path: PathBuf, source: std::io::Error },
}
