//! Filesystem-backed artifact storage.
//!
//! Artifacts are immutable once written and addressable only through the
//! opaque reference recorded on the owning job.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::{application::render::file_extension, domain::job::ArtifactRef};

#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("invalid artifact reference")]
    InvalidReference,
    #[error("artifact not found")]
    NotFound,
    #[error("artifact already stored")]
    AlreadyStored,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result of persisting an artifact.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub reference: ArtifactRef,
    pub checksum: String,
    pub size_bytes: u64,
}

/// Filesystem store rooted at a configured directory.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Persist the rendered bytes for a job and return the reference to
    /// record on the job. A reference can be written exactly once.
    pub async fn put(
        &self,
        job_id: Uuid,
        format: &str,
        bytes: Bytes,
    ) -> Result<StoredArtifact, ArtifactStoreError> {
        let reference = self.build_reference(job_id, format);
        let absolute = self.resolve(reference.as_str())?;

        if fs::metadata(&absolute).await.is_ok() {
            return Err(ArtifactStoreError::AlreadyStored);
        }

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let checksum = hex::encode(hasher.finalize());
        let size_bytes = bytes.len() as u64;

        fs::write(&absolute, &bytes).await?;

        debug!(
            target = "infra::artifacts",
            job_id = %job_id,
            reference = reference.as_str(),
            size_bytes,
            "artifact stored"
        );

        Ok(StoredArtifact {
            reference,
            checksum,
            size_bytes,
        })
    }

    /// Read the artifact bytes for a stored reference.
    pub async fn read(&self, reference: &ArtifactRef) -> Result<Bytes, ArtifactStoreError> {
        let absolute = self.resolve(reference.as_str())?;
        match fs::read(&absolute).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactStoreError::NotFound)
            }
            Err(err) => Err(ArtifactStoreError::Io(err)),
        }
    }

    /// Resolve the absolute filesystem path for a stored reference.
    fn resolve(&self, reference: &str) -> Result<PathBuf, ArtifactStoreError> {
        let relative = Path::new(reference);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(ArtifactStoreError::InvalidReference);
        }

        Ok(self.root.join(relative))
    }

    fn build_reference(&self, job_id: Uuid, format: &str) -> ArtifactRef {
        let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
        let extension = file_extension(format);
        ArtifactRef::new(format!(
            "{year}/{:02}/{:02}/{job_id}.{extension}",
            month as u8, day
        ))
    }
}
