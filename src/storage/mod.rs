mod local;
mod s3;

pub use local::LocalStorageBackend;
pub use s3::S3StorageBackend;

use crate::config::{Settings, StorageBackendKind};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// True for any URI a [`StorageBackend`] treats as remote rather than a
/// path under `media_root`.
pub fn is_remote_uri(uri: &str) -> bool {
    let lowered = uri.trim().to_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://") || lowered.starts_with("s3://") || lowered.starts_with("gs://")
}

/// Storage backend contract: write bytes/files under a relative directory
/// and resolve URIs back to either a local path or a download URL.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn write_bytes(&self, rel_dir: &str, filename: &str, data: &[u8], content_type: Option<&str>) -> StorageResult<String>;

    async fn write_file(&self, rel_dir: &str, filename: &str, source_path: &Path, content_type: Option<&str>) -> StorageResult<String>;

    /// Resolve a non-remote URI to a local filesystem path. Backends that
    /// can't serve local paths (S3) return [`StorageError::NotLocal`].
    fn resolve_local_path(&self, uri: &str) -> StorageResult<PathBuf>;

    /// A direct download URL for `uri`, if the backend can produce one.
    async fn get_download_url(&self, uri: &str) -> StorageResult<Option<String>>;
}

/// Construct the configured backend. Mirrors `get_storage()` in the
/// source: `OFFLINE_MODE` refuses anything but the local backend.
pub fn build_storage(settings: &Settings) -> StorageResult<Arc<dyn StorageBackend>> {
    if settings.offline_mode && !matches!(settings.storage_backend, StorageBackendKind::Local) {
        return Err(StorageError::OfflineForbidden("remote".to_string()));
    }

    match settings.storage_backend {
        StorageBackendKind::Local => Ok(Arc::new(LocalStorageBackend::new(settings.media_root.clone()))),
        StorageBackendKind::S3 | StorageBackendKind::R2 => {
            let s3_config = settings.s3.as_ref().ok_or_else(|| StorageError::MissingConfig("s3".to_string()))?;
            Ok(Arc::new(S3StorageBackend::new(s3_config.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_remote_uri_recognizes_schemes() {
        assert!(is_remote_uri("https://example.com/a.mp4"));
        assert!(is_remote_uri("s3://bucket/key"));
        assert!(is_remote_uri("  GS://bucket/key"));
        assert!(!is_remote_uri("/media/uploads/a.mp4"));
        assert!(!is_remote_uri("uploads/a.mp4"));
    }

    #[test]
    fn build_storage_rejects_remote_backend_in_offline_mode() {
        let mut settings = Settings::from_env().unwrap();
        settings.offline_mode = true;
        settings.storage_backend = StorageBackendKind::S3;
        let err = build_storage(&settings).unwrap_err();
        assert!(matches!(err, StorageError::OfflineForbidden(_)));
    }
}
