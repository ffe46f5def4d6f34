use super::AppState;
use crate::error::ApiError;
use crate::store::models::SubtitleStylePreset;
use crate::store::presets as preset_store;
use serde_json::Value;
use uuid::Uuid;

/// `GET /presets/styles`: enumerate the subtitle style presets clients can
/// reference by id when requesting `style_subtitles`.
pub async fn list_style_presets(state: &AppState) -> Result<Vec<SubtitleStylePreset>, ApiError> {
    preset_store::list_presets(&state.pool).await
}

pub async fn get_style_preset(state: &AppState, id: Uuid) -> Result<SubtitleStylePreset, ApiError> {
    preset_store::get_preset(&state.pool, id).await
}

pub async fn create_style_preset(state: &AppState, name: &str, description: Option<&str>, style: Value) -> Result<SubtitleStylePreset, ApiError> {
    preset_store::create_preset(&state.pool, name, description, style).await
}
