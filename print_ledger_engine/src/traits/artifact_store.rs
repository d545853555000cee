use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Could not release artifact {artifact_ref}: {reason}")]
pub struct ArtifactStoreError {
    pub artifact_ref: String,
    pub reason: String,
}

/// The file store that holds uploaded documents. The ledger only ever releases artifacts; uploads happen elsewhere.
///
/// Releases happen after the owning transaction has committed, so a failure here never rolls back ledger state. The
/// APIs log the failure and move on.
#[allow(async_fn_in_trait)]
pub trait ArtifactStore {
    async fn release(&self, artifact_ref: &str) -> Result<(), ArtifactStoreError>;
}

/// An artifact store that does nothing. Useful when the file store manages its own retention.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopArtifactStore;

impl ArtifactStore for NoopArtifactStore {
    async fn release(&self, _artifact_ref: &str) -> Result<(), ArtifactStoreError> {
        Ok(())
    }
}
