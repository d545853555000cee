use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use log::*;
use print_ledger_engine::traits::{ArtifactStore, ArtifactStoreError};

/// Uploaded documents stored as files below a root directory. Artifact references are paths relative to the root.
#[derive(Debug, Clone)]
pub struct DirectoryArtifactStore {
    root: PathBuf,
}

impl DirectoryArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// References must stay inside the root, so anything but plain path segments is refused.
    fn resolve(&self, artifact_ref: &str) -> Result<PathBuf, ArtifactStoreError> {
        let relative = Path::new(artifact_ref);
        let is_plain = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if artifact_ref.is_empty() || !is_plain {
            return Err(ArtifactStoreError {
                artifact_ref: artifact_ref.to_string(),
                reason: "not a relative path below the artifact root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl ArtifactStore for DirectoryArtifactStore {
    async fn release(&self, artifact_ref: &str) -> Result<(), ArtifactStoreError> {
        let path = self.resolve(artifact_ref)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("🧹️ Deleted {}", path.display());
                Ok(())
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("🧹️ {} was already gone", path.display());
                Ok(())
            },
            Err(e) => Err(ArtifactStoreError { artifact_ref: artifact_ref.to_string(), reason: e.to_string() }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn release_deletes_the_file() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("uploads")).unwrap();
        let file = root.path().join("uploads/doc.pdf");
        std::fs::write(&file, b"%PDF").unwrap();
        let store = DirectoryArtifactStore::new(root.path());
        store.release("uploads/doc.pdf").await.unwrap();
        assert!(!file.exists());
        // Releasing twice is fine
        store.release("uploads/doc.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn references_cannot_escape_the_root() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectoryArtifactStore::new(root.path().join("inner"));
        for bad in ["../secret.pdf", "/etc/passwd", "uploads/../../x", ""] {
            let err = store.release(bad).await.unwrap_err();
            assert_eq!(err.artifact_ref, bad);
        }
    }
}
