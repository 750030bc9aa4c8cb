use std::path::{Component, Path, PathBuf};
use std::process::Command;

/// Directory the bundle is assembled in, relative to the build context.
pub const BUNDLE_DIR: &str = ".imgstore-bundle";

/// Files/directories that are always excluded from bundles,
/// regardless of .gitignore content.
const IMGSTORE_EXCLUDES: &[&str] = &[BUNDLE_DIR, ".imgstore", ".git"];

/// A bundled build context ready for `docker build`.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Absolute path of the bundle directory
    pub dir: PathBuf,
    /// Context-relative paths copied into the bundle, sorted
    pub files: Vec<PathBuf>,
}

/// Bundles the build context for `docker build`.
///
/// Uses `git ls-files` to respect `.gitignore`, then copies all tracked
/// and untracked-but-not-ignored files into `.imgstore-bundle/`.
/// The Dockerfile is written into the bundle last.
pub fn create_bundle(project_dir: &Path, dockerfile_content: &str) -> Result<Bundle, BundleError> {
    let files = list_context_files(project_dir)?;
    let bundle_dir = project_dir.join(BUNDLE_DIR);

    // Clean previous bundle
    if bundle_dir.exists() {
        std::fs::remove_dir_all(&bundle_dir).map_err(|e| BundleError::Cleanup {
            path: bundle_dir.clone(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(&bundle_dir).map_err(|e| BundleError::Create {
        path: bundle_dir.clone(),
        source: e,
    })?;

    for relative_path in &files {
        let src = project_dir.join(relative_path);
        let dst = bundle_dir.join(relative_path);

        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BundleError::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::copy(&src, &dst).map_err(|e| BundleError::CopyFile {
            path: src,
            source: e,
        })?;
    }

    let dockerfile_path = bundle_dir.join("Dockerfile");
    std::fs::write(&dockerfile_path, dockerfile_content).map_err(|e| {
        BundleError::WriteDockerfile {
            path: dockerfile_path.clone(),
            source: e,
        }
    })?;

    tracing::info!(
        dir = %bundle_dir.display(),
        files = files.len(),
        "build context bundled"
    );

    Ok(Bundle {
        dir: bundle_dir,
        files,
    })
}

/// Files that belong to the build context, relative to `project_dir`.
///
/// Paths that would resolve outside the context (absolute, `..`, or symlinks
/// pointing elsewhere) are never returned.
pub fn list_context_files(project_dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    let root = project_dir
        .canonicalize()
        .map_err(|e| BundleError::ContextResolve {
            path: project_dir.to_path_buf(),
            source: e,
        })?;

    let mut files = Vec::new();
    for relative_path in git_ls_files(project_dir)? {
        if IMGSTORE_EXCLUDES
            .iter()
            .any(|ex| relative_path.starts_with(ex))
        {
            continue;
        }

        if relative_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(BundleError::OutsideContext { path: relative_path });
        }

        let src = project_dir.join(&relative_path);
        let is_symlink = std::fs::symlink_metadata(&src)
            .map(|m| m.file_type().is_symlink())
            .map_err(|e| BundleError::CopyFile {
                path: src.clone(),
                source: e,
            })?;

        if is_symlink {
            let inside = src.canonicalize().is_ok_and(|target| target.starts_with(&root));
            if !inside {
                tracing::warn!(
                    path = %relative_path.display(),
                    "symlink leaves the build context; not bundled"
                );
                continue;
            }
        }

        files.push(relative_path);
    }

    files.sort();
    Ok(files)
}

/// Tracked files plus untracked files that are not ignored.
fn git_ls_files(project_dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    let stdout = git(
        project_dir,
        &["ls-files", "--cached", "--others", "--exclude-standard"],
    )?;
    Ok(stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Checks whether the git working tree has uncommitted changes.
pub fn is_dirty(project_dir: &Path) -> Result<bool, BundleError> {
    Ok(!git(project_dir, &["status", "--porcelain"])?.trim().is_empty())
}

fn git(project_dir: &Path, args: &[&str]) -> Result<String, BundleError> {
    let command = format!("git {}", args.first().copied().unwrap_or_default());
    let output = Command::new("git")
        .args(args)
        .current_dir(project_dir)
        .output()
        .map_err(|e| BundleError::GitSpawn {
            command: command.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(BundleError::GitFailed {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("failed to resolve build context {path}")]
    ContextResolve {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("{path} resolves outside the build context")]
    OutsideContext { path: std::path::PathBuf },
    #[error("failed to clean up bundle directory {path}")]
    Cleanup {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy file {path}")]
    CopyFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write Dockerfile at {path}")]
    WriteDockerfile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to run {command}; is git installed?")]
    GitSpawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} exited with {status}: {stderr}")]
    GitFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}
