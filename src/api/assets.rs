use super::requests::{validate_asset_kind, validate_content_type};
use super::AppState;
use crate::error::ApiError;
use crate::store::assets as asset_store;
use crate::store::models::MediaAsset;
use uuid::Uuid;

pub struct UploadAsset<'a> {
    pub kind: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: Vec<u8>,
}

/// `POST /assets/upload`. Validates `kind` and its content-type, then
/// streams the bytes to the configured storage backend, enforcing
/// `max_upload_bytes` before a single byte is written.
pub async fn upload_asset(state: &AppState, req: UploadAsset<'_>) -> Result<MediaAsset, ApiError> {
    validate_asset_kind(req.kind)?;
    validate_content_type(req.kind, req.content_type)?;

    if state.settings.max_upload_bytes > 0 && req.data.len() as u64 > state.settings.max_upload_bytes {
        return Err(ApiError::validation(format!(
            "upload of {} bytes exceeds max_upload_bytes ({})",
            req.data.len(),
            state.settings.max_upload_bytes
        )));
    }

    let id = Uuid::new_v4();
    let ext = std::path::Path::new(req.filename).extension().and_then(|e| e.to_str()).unwrap_or("bin");
    let filename = format!("{id}.{ext}");
    let rel_dir = format!("uploads/{kind}", kind = req.kind);

    let uri = state
        .storage
        .write_bytes(&rel_dir, &filename, &req.data, Some(req.content_type))
        .await
        .map_err(|e| ApiError::server_error(format!("failed to store asset: {e}")))?;

    asset_store::create_asset(
        &state.pool,
        asset_store::NewMediaAsset { kind: req.kind.to_string(), uri: Some(uri), mime_type: Some(req.content_type.to_string()), duration: None },
    )
    .await
}

pub async fn list_assets(state: &AppState, kind: Option<&str>, limit: i64, offset: i64) -> Result<Vec<MediaAsset>, ApiError> {
    asset_store::list_assets(&state.pool, kind, limit, offset).await
}

pub async fn get_asset(state: &AppState, id: Uuid) -> Result<MediaAsset, ApiError> {
    asset_store::get_asset(&state.pool, id).await
}

pub async fn delete_asset(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    asset_store::delete_asset(&state.pool, id).await
}

/// `GET /assets/{id}/download`: reads the asset's bytes back off local
/// storage. Remote-backed assets are not readable this way — callers
/// should use [`download_url`] instead.
pub async fn download_asset(state: &AppState, id: Uuid) -> Result<Vec<u8>, ApiError> {
    let asset = asset_store::get_asset(&state.pool, id).await?;
    let uri = asset.uri.ok_or_else(|| ApiError::not_found(format!("asset {id} has no stored content")))?;
    let path = state.storage.resolve_local_path(&uri).map_err(|e| ApiError::validation(format!("cannot download: {e}")))?;
    tokio::fs::read(&path).await.map_err(|e| ApiError::server_error(format!("failed to read asset file: {e}")))
}

/// `GET /assets/{id}/download-url?presign=bool`. When `presign` is false
/// and the asset is already a local URI, the URI itself is returned
/// unchanged (matching the source's `get_download_url` passthrough).
pub async fn download_url(state: &AppState, id: Uuid) -> Result<Option<String>, ApiError> {
    let asset = asset_store::get_asset(&state.pool, id).await?;
    let uri = asset.uri.ok_or_else(|| ApiError::not_found(format!("asset {id} has no stored content")))?;
    state.storage.get_download_url(&uri).await.map_err(|e| ApiError::server_error(format!("failed to build download url: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rate_limit::RateLimiter;
    use crate::broker::InMemoryBroker;
    use crate::config::Settings;
    use crate::storage::LocalStorageBackend;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn test_state(media_root: std::path::PathBuf) -> AppState {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let (broker, _rx) = InMemoryBroker::new();
        let mut settings = Settings::from_env().unwrap();
        settings.media_root = media_root.clone();
        let settings = Arc::new(settings);
        AppState {
            pool,
            storage: Arc::new(LocalStorageBackend::new(media_root)),
            broker: Arc::new(broker),
            rate_limiter: Arc::new(RateLimiter::new(settings.rate_limit_requests, settings.rate_limit_window_seconds)),
            settings,
        }
    }

    #[tokio::test]
    async fn upload_rejects_content_type_mismatch() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf()).await;
        let err = upload_asset(&state, UploadAsset { kind: "video", filename: "a.mp3", content_type: "audio/mp3", data: vec![1, 2, 3] })
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn upload_then_download_roundtrips_bytes() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf()).await;
        let asset = upload_asset(&state, UploadAsset { kind: "subtitle", filename: "a.srt", content_type: "text/plain", data: b"1\n00:00:00,000 --> 00:00:01,000\nhi\n".to_vec() })
            .await
            .unwrap();
        let bytes = download_asset(&state, asset.id).await.unwrap();
        assert!(bytes.starts_with(b"1\n"));
    }

    #[tokio::test]
    async fn upload_rejects_oversized_file() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::from_env().unwrap();
        settings.media_root = dir.path().to_path_buf();
        settings.max_upload_bytes = 4;
        let settings = Arc::new(settings);
        let (broker, _rx) = InMemoryBroker::new();
        let state = AppState {
            pool: {
                let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
                sqlx::migrate!("./migrations").run(&pool).await.unwrap();
                pool
            },
            storage: Arc::new(LocalStorageBackend::new(dir.path().to_path_buf())),
            broker: Arc::new(broker),
            rate_limiter: Arc::new(RateLimiter::new(settings.rate_limit_requests, settings.rate_limit_window_seconds)),
            settings,
        };

        let err = upload_asset(&state, UploadAsset { kind: "video", filename: "a.mp4", content_type: "video/mp4", data: vec![0; 10] }).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
    }
}
