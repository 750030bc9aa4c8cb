//! On-disk layout of stored images: `<root>/<category>/<filename>`.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncWriteExt, BufWriter};

/// Uploads are flushed to disk in chunks of this size.
pub const WRITE_CHUNK: usize = 64 * 1024;

const STAGING_PREFIX: &str = ".upload-";
const STAGING_SUFFIX: &str = ".part";

/// Handle to the images directory.
///
/// Cheap to clone; every handler receives it through the application state.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the images directory. Succeeds when it already exists.
    pub async fn ensure(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::CreateDir {
                path: self.root.clone(),
                source: e,
            })
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.root.join(category)
    }

    pub fn image_path(&self, category: &str, filename: &str) -> PathBuf {
        self.category_dir(category).join(filename)
    }

    /// Open a staging file for an upload of at most `limit` bytes.
    ///
    /// The staging file lives directly under the root and is moved into its
    /// category folder by [`StagedFile::commit`].
    pub async fn stage(&self, limit: u64) -> Result<StagedFile, StorageError> {
        self.ensure().await?;
        let path = self.root.join(format!(
            "{STAGING_PREFIX}{}{STAGING_SUFFIX}",
            uuid::Uuid::new_v4()
        ));
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StorageError::Write {
                path: path.clone(),
                source: e,
            })?;

        Ok(StagedFile {
            path,
            writer: BufWriter::with_capacity(WRITE_CHUNK, file),
            written: 0,
            limit,
        })
    }

    /// Remove one image file. Returns `false` when it was already gone.
    pub async fn remove(&self, category: &str, filename: &str) -> Result<bool, StorageError> {
        let path = self.image_path(category, filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Remove { path, source: e }),
        }
    }

    /// Remove a category folder and everything in it.
    pub async fn remove_category(&self, category: &str) -> Result<(), StorageError> {
        let path = self.category_dir(category);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Remove { path, source: e }),
        }
    }

    /// Remove everything under the root, keeping the root itself and the
    /// staging files of uploads still in flight.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StorageError::Remove {
                    path: self.root.clone(),
                    source: e,
                });
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::Remove {
                path: self.root.clone(),
                source: e,
            })?
        {
            let path = entry.path();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .map_err(|e| StorageError::Remove {
                    path: path.clone(),
                    source: e,
                })?;
            let removed = if is_dir {
                tokio::fs::remove_dir_all(&path).await
            } else if is_staging(&entry.file_name()) {
                continue;
            } else {
                tokio::fs::remove_file(&path).await
            };
            removed.map_err(|e| StorageError::Remove { path, source: e })?;
        }

        Ok(())
    }
}

fn is_staging(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| n.starts_with(STAGING_PREFIX) && n.ends_with(STAGING_SUFFIX))
}

/// An upload being written to disk.
///
/// Dropping a `StagedFile` without calling [`commit`](Self::commit) or
/// [`discard`](Self::discard) leaves the `.part` file behind.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    writer: BufWriter<tokio::fs::File>,
    written: u64,
    limit: u64,
}

impl StagedFile {
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk. Fails with [`StorageError::TooLarge`] once the limit is crossed.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.written += chunk.len() as u64;
        if self.written > self.limit {
            return Err(StorageError::TooLarge { limit: self.limit });
        }
        self.writer
            .write_all(chunk)
            .await
            .map_err(|e| StorageError::Write {
                path: self.path.clone(),
                source: e,
            })
    }

    /// Flush and move the upload to `<root>/<category>/<filename>`.
    pub async fn commit(
        mut self,
        store: &ImageStore,
        category: &str,
        filename: &str,
    ) -> Result<PathBuf, StorageError> {
        if let Err(e) = self.writer.flush().await {
            self.discard().await;
            return Err(StorageError::Write {
                path: store.image_path(category, filename),
                source: e,
            });
        }

        let dir = store.category_dir(category);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            self.discard().await;
            return Err(StorageError::CreateDir {
                path: dir,
                source: e,
            });
        }

        let target = dir.join(filename);
        if let Err(e) = tokio::fs::rename(&self.path, &target).await {
            self.discard().await;
            return Err(StorageError::Write {
                path: target,
                source: e,
            });
        }

        tracing::debug!(path = %target.display(), bytes = self.written, "upload stored");
        Ok(target)
    }

    /// Remove the partial file.
    pub async fn discard(self) {
        drop(self.writer);
        if let Err(e) = tokio::fs::remove_file(&self.path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove partial upload");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to remove {path}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("file too large, max {}MB", .limit / (1024 * 1024))]
    TooLarge { limit: u64 },
}
