use super::StorageBackend;
use crate::config::S3Config;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Writes/reads objects in an S3-compatible bucket, returning either a
/// `public_base_url`-derived URI or a presigned GET URL.
pub struct S3StorageBackend {
    config: S3Config,
    client: OnceCell<Client>,
}

impl S3StorageBackend {
    pub fn new(config: S3Config) -> Self {
        Self { config, client: OnceCell::new() }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
                if let Some(region) = &self.config.region {
                    loader = loader.region(Region::new(region.clone()));
                }
                if let Some(endpoint) = &self.config.endpoint_url {
                    loader = loader.endpoint_url(endpoint.clone());
                }
                if let (Some(access_key), Some(secret_key)) = (&self.config.access_key_id, &self.config.secret_access_key) {
                    loader = loader.credentials_provider(Credentials::new(
                        access_key.clone(),
                        secret_key.clone(),
                        self.config.session_token.clone(),
                        None,
                        "reframe-s3-config",
                    ));
                }
                let sdk_config = loader.load().await;
                Client::new(&sdk_config)
            })
            .await
    }

    fn make_key(&self, rel_dir: &str, filename: &str) -> String {
        [self.config.prefix.as_str(), rel_dir, filename]
            .iter()
            .map(|part| part.trim_matches('/'))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    async fn presigned_get(&self, key: &str) -> StorageResult<String> {
        let expires = Duration::from_secs(self.config.presign_expires_seconds.max(60));
        let presigning_config = PresigningConfig::expires_in(expires).map_err(|e| StorageError::ObjectStore(e.to_string()))?;
        let request = self
            .client()
            .await
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::ObjectStore(e.to_string()))?;
        Ok(request.uri().to_string())
    }

    async fn uri_for(&self, key: &str) -> StorageResult<String> {
        if let Some(base) = &self.config.public_base_url {
            return Ok(format!("{base}/{key}"));
        }
        self.presigned_get(key).await
    }

    fn key_from_uri(&self, uri: &str) -> Option<String> {
        if let Some(rest) = uri.strip_prefix("s3://") {
            let (bucket, key) = rest.split_once('/')?;
            if bucket != self.config.bucket || key.is_empty() {
                return None;
            }
            return Some(key.to_string());
        }
        if let Some(base) = &self.config.public_base_url {
            if let Some(rest) = uri.strip_prefix(base.as_str()) {
                let key = rest.trim_start_matches('/');
                return (!key.is_empty()).then(|| key.to_string());
            }
        }
        None
    }
}

#[async_trait]
impl StorageBackend for S3StorageBackend {
    async fn write_bytes(&self, rel_dir: &str, filename: &str, data: &[u8], content_type: Option<&str>) -> StorageResult<String> {
        let key = self.make_key(rel_dir, filename);
        let mut request = self.client().await.put_object().bucket(&self.config.bucket).key(&key).body(ByteStream::from(data.to_vec()));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        request.send().await.map_err(|e| StorageError::ObjectStore(e.to_string()))?;
        self.uri_for(&key).await
    }

    async fn write_file(&self, rel_dir: &str, filename: &str, source_path: &Path, content_type: Option<&str>) -> StorageResult<String> {
        let key = self.make_key(rel_dir, filename);
        let body = ByteStream::from_path(source_path).await.map_err(|e| StorageError::ObjectStore(e.to_string()))?;
        let mut request = self.client().await.put_object().bucket(&self.config.bucket).key(&key).body(body);
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        request.send().await.map_err(|e| StorageError::ObjectStore(e.to_string()))?;
        self.uri_for(&key).await
    }

    fn resolve_local_path(&self, uri: &str) -> StorageResult<PathBuf> {
        Err(StorageError::NotLocal(uri.to_string()))
    }

    async fn get_download_url(&self, uri: &str) -> StorageResult<Option<String>> {
        match self.key_from_uri(uri) {
            Some(key) => Ok(Some(self.presigned_get(&key).await?)),
            None => Ok(None),
        }
    }
}
