use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::types::DownloadedClip;

/// Scratch directory for clips between download and upload.
///
/// Files are namespaced by clip identifier; two concurrent runs with the same
/// identifier would share a path.
#[derive(Debug, Clone)]
pub struct TempStore {
    root: PathBuf,
}

impl TempStore {
    /// Open the store, creating the directory if it does not exist.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        debug!("Temporary clip directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, clip_id: &str) -> PathBuf {
        self.root.join(format!("{}.mp4", clip_id))
    }
}

/// Owner of downloaded clips once the pipeline is done with them.
#[async_trait]
pub trait ClipStore: Send + Sync {
    /// Delete a clip's file. Failures are logged and never returned so they
    /// cannot replace the error that ended the clip's run.
    async fn discard(&self, clip: DownloadedClip);
}

#[async_trait]
impl ClipStore for TempStore {
    async fn discard(&self, clip: DownloadedClip) {
        remove_quietly(&clip.path).await;
    }
}

/// Remove a file if present, logging instead of failing.
pub async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            info!("Cleaned up: {}", name);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Nothing to clean up at {}", path.display());
        }
        Err(e) => error!("Cleanup failed for {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn test_open_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("temp_clips");
        let store = TempStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert!(store.root().is_absolute());
    }

    #[test]
    fn test_path_is_derived_from_identifier() {
        let tmp = TempDir::new().unwrap();
        let store = TempStore::open(tmp.path()).unwrap();
        let path = store.path_for("clip1");
        assert_eq!(path.file_name().unwrap(), "clip1.mp4");
        assert_eq!(path.parent().unwrap(), store.root());
    }

    #[tokio::test]
    async fn test_discard_removes_file() {
        let tmp = TempDir::new().unwrap();
        let store = TempStore::open(tmp.path()).unwrap();
        let path = store.path_for("clip1");
        fs::write(&path, b"data").await.unwrap();

        store
            .discard(DownloadedClip { path: path.clone(), clip_id: "clip1".into() })
            .await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_discard_missing_file_is_quiet() {
        let tmp = TempDir::new().unwrap();
        let store = TempStore::open(tmp.path()).unwrap();
        let path = store.path_for("never-written");
        store.discard(DownloadedClip { path, clip_id: "never-written".into() }).await;
    }
}
