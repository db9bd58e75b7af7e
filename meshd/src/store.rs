//! On-disk storage for uploads and reconstructed meshes.
//!
//! Incoming clouds are persisted under the uploads directory as
//! `{uuid}.{ext}` and deleted once processing finishes; reconstructed meshes
//! land in the outputs directory as `mesh_{uuid}.{ext}` and are kept.

use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::errors::Result;

/// Filesystem-backed store for per-job artifacts.
#[derive(Debug, Clone)]
pub struct JobStore {
    uploads_dir: PathBuf,
    outputs_dir: PathBuf,
}

impl JobStore {
    pub fn new(uploads_dir: PathBuf, outputs_dir: PathBuf) -> Self {
        Self { uploads_dir, outputs_dir }
    }

    /// Create both directories if they do not exist yet.
    pub async fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.uploads_dir).await?;
        fs::create_dir_all(&self.outputs_dir).await?;
        Ok(())
    }

    /// Path of the upload file for a job.
    pub fn upload_path(&self, job_id: Uuid, extension: &str) -> PathBuf {
        self.uploads_dir.join(format!("{job_id}.{extension}"))
    }

    /// Path of the output mesh for a job.
    pub fn output_path(&self, job_id: Uuid, extension: &str) -> PathBuf {
        self.outputs_dir.join(format!("mesh_{job_id}.{extension}"))
    }

    /// Persist the raw upload bytes for a job.
    pub async fn write_upload(&self, job_id: Uuid, extension: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.upload_path(job_id, extension);
        let mut file = fs::File::create(&path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        Ok(path)
    }

    /// Delete the upload for a finished job. Best-effort: a failure here
    /// leaves a stray file behind but must not fail the request.
    pub async fn remove_upload(&self, job_id: Uuid, extension: &str) {
        let path = self.upload_path(job_id, extension);
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!(job_id = %job_id, path = %path.display(), error = %e, "Failed to remove upload");
        }
    }

    /// Write the reconstructed mesh for a job.
    pub async fn write_output(&self, job_id: Uuid, extension: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.output_path(job_id, extension);
        let mut file = fs::File::create(&path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        Ok(path)
    }

    /// Read back the reconstructed mesh for a job.
    pub async fn read_output(&self, job_id: Uuid, extension: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.output_path(job_id, extension)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> JobStore {
        JobStore::new(dir.path().join("uploads"), dir.path().join("outputs"))
    }

    #[tokio::test]
    async fn upload_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_dirs().await.unwrap();

        let job_id = Uuid::new_v4();
        let path = store.write_upload(job_id, "ply", b"ply\n").await.unwrap();
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{job_id}.ply"));

        store.remove_upload(job_id, "ply").await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn remove_missing_upload_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_dirs().await.unwrap();

        // Must not panic or error.
        store.remove_upload(Uuid::new_v4(), "ply").await;
    }

    #[tokio::test]
    async fn output_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_dirs().await.unwrap();

        let job_id = Uuid::new_v4();
        let path = store.write_output(job_id, "obj", b"v 0 0 0\n").await.unwrap();
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("mesh_{job_id}.obj"));

        let content = store.read_output(job_id, "obj").await.unwrap();
        assert_eq!(content, b"v 0 0 0\n");
    }

    #[tokio::test]
    async fn ensure_dirs_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_dirs().await.unwrap();
        store.ensure_dirs().await.unwrap();
    }
}
