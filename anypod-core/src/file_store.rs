//! Atomic file mutation. Every write lands in a sibling temp file and is
//! renamed into place so a concurrent reader observing any canonical path
//! sees a complete file or no file at all.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWrite;

use crate::error::{Error, Result};

fn fs_err(context: &str, err: std::io::Error) -> Error {
    Error::Filesystem(format!("{context}: {err}"))
}

#[derive(Debug, Clone, Default)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }

    async fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| fs_err(&format!("creating directory {}", parent.display()), e))?;
        }
        Ok(())
    }

    /// Writes `bytes` to a sibling temp file, then renames it into place.
    pub async fn save(&self, target_path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_parent(target_path).await?;
        let tmp_path = sibling_tmp_path(target_path);
        let write_result = fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| fs_err(&format!("writing {}", tmp_path.display()), e));
        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        self.move_into_place(&tmp_path, target_path).await
    }

    /// Stages `source_path` (already materialized on disk, e.g. under a
    /// per-feed tmp directory) into its canonical location via rename.
    pub async fn move_into_place(&self, source_path: &Path, target_path: &Path) -> Result<()> {
        self.ensure_parent(target_path).await?;
        match fs::rename(source_path, target_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(18) /* EXDEV */ => {
                // Fallback for a tmp dir on a different filesystem than the
                // data root: copy then remove, still atomic from a reader's
                // perspective because the copy lands at a tmp sibling first.
                let sibling = sibling_tmp_path(target_path);
                fs::copy(source_path, &sibling)
                    .await
                    .map_err(|e| fs_err(&format!("copying {} to {}", source_path.display(), sibling.display()), e))?;
                fs::rename(&sibling, target_path)
                    .await
                    .map_err(|e| fs_err(&format!("renaming {} to {}", sibling.display(), target_path.display()), e))?;
                let _ = fs::remove_file(source_path).await;
                Ok(())
            }
            Err(e) => Err(fs_err(
                &format!("renaming {} to {}", source_path.display(), target_path.display()),
                e,
            )),
        }
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    pub async fn open_read(&self, path: &Path) -> Result<fs::File> {
        fs::File::open(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
                _ => fs_err(&format!("opening {}", path.display()), e),
            })
    }

    pub async fn size(&self, path: &Path) -> Result<u64> {
        let meta = fs::metadata(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
                _ => fs_err(&format!("stat-ing {}", path.display()), e),
            })?;
        Ok(meta.len())
    }

    /// Returns whether a file was actually removed. Absence is not an error:
    /// a missing file on delete is a warning, never an error.
    pub async fn delete(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(fs_err(&format!("deleting {}", path.display()), e)),
        }
    }

    /// Opens a fresh temp file under `dir` for a writer that will produce the
    /// file's bytes incrementally (e.g. a streamed HTTP body) before it is
    /// staged with `move_into_place`.
    pub async fn create_tmp(&self, dir: &Path) -> Result<(PathBuf, impl AsyncWrite)> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| fs_err(&format!("creating directory {}", dir.display()), e))?;
        let path = dir.join(nanoid::nanoid!(16));
        let file = fs::File::create(&path)
            .await
            .map_err(|e| fs_err(&format!("creating {}", path.display()), e))?;
        Ok((path, file))
    }
}

fn sibling_tmp_path(target_path: &Path) -> PathBuf {
    let file_name = target_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    target_path.with_file_name(format!(".{file_name}.{}.tmp", nanoid::nanoid!(8)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/file.mp4");
        let store = FileStore::new();
        store.save(&target, b"hello").await.unwrap();
        assert!(store.exists(&target).await);
        assert_eq!(store.size(&target).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn delete_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing.mp4");
        let store = FileStore::new();
        let deleted = store.delete(&target).await.unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    async fn delete_existing_file_reports_true() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file.mp4");
        let store = FileStore::new();
        store.save(&target, b"x").await.unwrap();
        assert!(store.delete(&target).await.unwrap());
        assert!(!store.exists(&target).await);
    }

    #[tokio::test]
    async fn move_into_place_stages_from_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("staged.bin");
        tokio::fs::write(&tmp, b"payload").await.unwrap();
        let target = dir.path().join("media/demo/v1.mp4");
        let store = FileStore::new();
        store.move_into_place(&tmp, &target).await.unwrap();
        assert!(store.exists(&target).await);
        assert!(!store.exists(&tmp).await);
    }

    #[tokio::test]
    async fn save_cleans_up_temp_on_failure() {
        // Writing to a path whose parent cannot be created (a file, not a
        // directory, in the way) should surface an error and not leave a
        // dangling temp file behind.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, b"x").await.unwrap();
        let target = blocker.join("file.mp4");
        let store = FileStore::new();
        assert!(store.save(&target, b"y").await.is_err());
    }
}
