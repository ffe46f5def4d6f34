use super::{is_remote_uri, StorageBackend};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const PUBLIC_PREFIX: &str = "/media";

/// Stores files under `media_root`, serving them back as `/media/...` URIs.
#[derive(Debug, Clone)]
pub struct LocalStorageBackend {
    media_root: PathBuf,
    public_prefix: String,
}

impl LocalStorageBackend {
    pub fn new(media_root: PathBuf) -> Self {
        Self { media_root, public_prefix: PUBLIC_PREFIX.to_string() }
    }

    fn target_path(&self, rel_dir: &str, filename: &str) -> PathBuf {
        let rel_dir = rel_dir.trim_matches('/');
        if rel_dir.is_empty() {
            self.media_root.join(filename)
        } else {
            self.media_root.join(rel_dir).join(filename)
        }
    }

    fn uri_for(&self, rel_dir: &str, filename: &str) -> String {
        let prefix = self.public_prefix.trim_end_matches('/');
        let rel_dir = rel_dir.trim_matches('/');
        if rel_dir.is_empty() {
            format!("{prefix}/{filename}")
        } else {
            format!("{prefix}/{rel_dir}/{filename}")
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn write_bytes(&self, rel_dir: &str, filename: &str, data: &[u8], _content_type: Option<&str>) -> StorageResult<String> {
        let target = self.target_path(rel_dir, filename);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, data).await?;
        Ok(self.uri_for(rel_dir, filename))
    }

    async fn write_file(&self, rel_dir: &str, filename: &str, source_path: &Path, _content_type: Option<&str>) -> StorageResult<String> {
        let target = self.target_path(rel_dir, filename);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let source_canonical = tokio::fs::canonicalize(source_path).await.ok();
        let target_canonical = tokio::fs::canonicalize(&target).await.ok();
        if source_canonical != target_canonical || source_canonical.is_none() {
            tokio::fs::copy(source_path, &target).await?;
        }
        Ok(self.uri_for(rel_dir, filename))
    }

    fn resolve_local_path(&self, uri: &str) -> StorageResult<PathBuf> {
        if is_remote_uri(uri) {
            return Err(StorageError::NotLocal(uri.to_string()));
        }
        let trimmed = uri.trim_start_matches('/');
        let prefix = self.public_prefix.trim_matches('/');
        let remainder = trimmed.strip_prefix(prefix).map(|s| s.trim_start_matches('/')).unwrap_or(trimmed);
        Ok(self.media_root.join(remainder))
    }

    async fn get_download_url(&self, uri: &str) -> StorageResult<Option<String>> {
        if uri.is_empty() {
            return Ok(None);
        }
        Ok(Some(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_bytes_creates_file_and_returns_public_uri() {
        let dir = tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path().to_path_buf());
        let uri = backend.write_bytes("uploads", "clip.mp4", b"data", None).await.unwrap();
        assert_eq!(uri, "/media/uploads/clip.mp4");
        assert_eq!(tokio::fs::read(dir.path().join("uploads/clip.mp4")).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn write_file_skips_copy_when_source_equals_target() {
        let dir = tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path().to_path_buf());
        let existing = dir.path().join("in_place.mp4");
        tokio::fs::write(&existing, b"already-here").await.unwrap();
        let uri = backend.write_file("", "in_place.mp4", &existing, None).await.unwrap();
        assert_eq!(uri, "/media/in_place.mp4");
    }

    #[test]
    fn resolve_local_path_strips_public_prefix() {
        let backend = LocalStorageBackend::new(PathBuf::from("/srv/media"));
        let resolved = backend.resolve_local_path("/media/uploads/clip.mp4").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/media/uploads/clip.mp4"));
    }

    #[test]
    fn resolve_local_path_rejects_remote_uri() {
        let backend = LocalStorageBackend::new(PathBuf::from("/srv/media"));
        assert!(backend.resolve_local_path("s3://bucket/key").is_err());
    }
}
