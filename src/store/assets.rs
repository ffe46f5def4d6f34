use super::models::MediaAsset;
use crate::error::ApiError;
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct NewMediaAsset {
    pub kind: String,
    pub uri: Option<String>,
    pub mime_type: Option<String>,
    pub duration: Option<f64>,
}

pub async fn create_asset(pool: &SqlitePool, data: NewMediaAsset) -> Result<MediaAsset, ApiError> {
    let id = Uuid::new_v4();
    let asset = sqlx::query_as::<_, MediaAsset>(
        r#"
        INSERT INTO media_assets (id, kind, uri, mime_type, duration, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'), datetime('now'))
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&data.kind)
    .bind(&data.uri)
    .bind(&data.mime_type)
    .bind(data.duration)
    .fetch_one(pool)
    .await?;
    Ok(asset)
}

pub async fn get_asset(pool: &SqlitePool, id: Uuid) -> Result<MediaAsset, ApiError> {
    sqlx::query_as::<_, MediaAsset>("SELECT * FROM media_assets WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("asset {id} not found")))
}

pub async fn list_assets(pool: &SqlitePool, kind: Option<&str>, limit: i64, offset: i64) -> Result<Vec<MediaAsset>, ApiError> {
    let assets = match kind {
        Some(kind) => {
            sqlx::query_as::<_, MediaAsset>("SELECT * FROM media_assets WHERE kind = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3")
                .bind(kind)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as::<_, MediaAsset>("SELECT * FROM media_assets ORDER BY created_at DESC LIMIT ?1 OFFSET ?2")
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(assets)
}

/// True if any job references `asset_id` as its input or output — callers
/// use this to refuse deleting an asset still in use.
pub async fn is_referenced_by_job(pool: &SqlitePool, asset_id: Uuid) -> Result<bool, ApiError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM jobs WHERE input_asset_id = ?1 OR output_asset_id = ?1 LIMIT 1")
        .bind(asset_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn delete_asset(pool: &SqlitePool, id: Uuid) -> Result<(), ApiError> {
    if is_referenced_by_job(pool, id).await? {
        return Err(ApiError::conflict(format!("asset {id} is referenced by a job and cannot be deleted")));
    }
    let result = sqlx::query("DELETE FROM media_assets WHERE id = ?1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("asset {id} not found")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_and_get_roundtrips() {
        let pool = test_pool().await;
        let asset = create_asset(&pool, NewMediaAsset { kind: "video".into(), uri: Some("/media/a.mp4".into()), mime_type: Some("video/mp4".into()), duration: Some(12.5) })
            .await
            .unwrap();
        let fetched = get_asset(&pool, asset.id).await.unwrap();
        assert_eq!(fetched.uri.as_deref(), Some("/media/a.mp4"));
    }

    #[tokio::test]
    async fn delete_refuses_when_referenced_by_job() {
        let pool = test_pool().await;
        let asset = create_asset(&pool, NewMediaAsset { kind: "video".into(), uri: None, mime_type: None, duration: None }).await.unwrap();
        sqlx::query("INSERT INTO jobs (id, job_type, status, progress, payload, input_asset_id, created_at, updated_at) VALUES (?1, 'captions', 'queued', 0.0, '{}', ?2, datetime('now'), datetime('now'))")
            .bind(Uuid::new_v4())
            .bind(asset.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = delete_asset(&pool, asset.id).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn get_missing_asset_returns_not_found() {
        let pool = test_pool().await;
        let err = get_asset(&pool, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::NotFound);
    }
}
