use super::models::SubtitleStylePreset;
use crate::error::ApiError;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn create_preset(pool: &SqlitePool, name: &str, description: Option<&str>, style: Value) -> Result<SubtitleStylePreset, ApiError> {
    let id = Uuid::new_v4();
    let preset = sqlx::query_as::<_, SubtitleStylePreset>(
        r#"
        INSERT INTO subtitle_style_presets (id, name, description, style, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, datetime('now'), datetime('now'))
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(style)
    .fetch_one(pool)
    .await?;
    Ok(preset)
}

pub async fn get_preset(pool: &SqlitePool, id: Uuid) -> Result<SubtitleStylePreset, ApiError> {
    sqlx::query_as::<_, SubtitleStylePreset>("SELECT * FROM subtitle_style_presets WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("style preset {id} not found")))
}

pub async fn list_presets(pool: &SqlitePool) -> Result<Vec<SubtitleStylePreset>, ApiError> {
    Ok(sqlx::query_as::<_, SubtitleStylePreset>("SELECT * FROM subtitle_style_presets ORDER BY name").fetch_all(pool).await?)
}
