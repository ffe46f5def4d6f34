use super::requests::{CreateCaptionsJob, CutClipJob, MergeAvJob, ShortsJob, StyleSubtitlesJob, TranslateSubtitlesJob};
use super::AppState;
use crate::broker::task_names;
use crate::error::ApiError;
use crate::store::jobs as job_store;
use crate::store::models::{Job, JobStatus, JobType};
use serde_json::{json, Value};
use uuid::Uuid;

fn merge_options(mut base: Value, options: Value) -> Value {
    if let (Value::Object(base_map), Value::Object(options_map)) = (&mut base, options) {
        for (key, value) in options_map {
            base_map.insert(key, value);
        }
    }
    base
}

async fn dispatch(state: &AppState, job_type: JobType, payload: Value, input_asset_id: Uuid, task_name: &str, args: Value) -> Result<Job, ApiError> {
    let job = job_store::create_job(&state.pool, job_store::NewJob { job_type, payload, input_asset_id: Some(input_asset_id) }).await?;

    match state.broker.publish_job(task_name, job.id, args).await {
        Ok(task_id) => job_store::attach_task_id(&state.pool, job.id, &task_id).await,
        Err(err) => {
            job_store::transition_status(&state.pool, job.id, JobStatus::Failed, Some(format!("dispatch failed: {err}"))).await?;
            Err(ApiError::server_error(format!("failed to dispatch job: {err}")))
        }
    }
}

pub async fn create_captions_job(state: &AppState, req: CreateCaptionsJob) -> Result<Job, ApiError> {
    let payload = merge_options(json!({}), req.options.clone());
    let args = json!({"video_asset_id": req.video_asset_id, "options": req.options});
    dispatch(state, JobType::Captions, payload, req.video_asset_id, task_names::GENERATE_CAPTIONS, args).await
}

pub async fn create_translate_subtitles_job(state: &AppState, req: TranslateSubtitlesJob) -> Result<Job, ApiError> {
    let payload = merge_options(json!({"target_language": req.target_language, "bilingual": req.bilingual}), req.options.clone());
    let args = json!({"subtitle_asset_id": req.subtitle_asset_id, "options": req.options});
    dispatch(state, JobType::TranslateSubtitles, payload, req.subtitle_asset_id, task_names::TRANSLATE_SUBTITLES, args).await
}

pub async fn create_style_subtitles_job(state: &AppState, req: StyleSubtitlesJob) -> Result<Job, ApiError> {
    let payload = json!({"subtitle_asset_id": req.subtitle_asset_id, "style": req.style, "preview_seconds": req.preview_seconds});
    let args = json!({
        "video_asset_id": req.video_asset_id,
        "subtitle_asset_id": req.subtitle_asset_id,
        "style": req.style,
    });
    dispatch(state, JobType::StyleSubtitles, payload, req.video_asset_id, task_names::RENDER_STYLED_SUBTITLES, args).await
}

pub async fn create_shorts_job(state: &AppState, req: ShortsJob) -> Result<Job, ApiError> {
    req.validate()?;
    let payload = merge_options(
        json!({"max_clips": req.max_clips, "min_duration": req.min_duration, "max_duration": req.max_duration, "aspect_ratio": req.aspect_ratio}),
        req.options.clone(),
    );
    let args = json!({"video_asset_id": req.video_asset_id, "options": req.options});
    dispatch(state, JobType::Shorts, payload, req.video_asset_id, task_names::GENERATE_SHORTS, args).await
}

pub async fn create_merge_av_job(state: &AppState, req: MergeAvJob) -> Result<Job, ApiError> {
    let payload = merge_options(
        json!({"audio_asset_id": req.audio_asset_id, "offset": req.offset, "ducking": req.ducking, "normalize": req.normalize}),
        req.options.clone(),
    );
    let args = json!({"video_asset_id": req.video_asset_id, "audio_asset_id": req.audio_asset_id, "options": req.options});
    dispatch(state, JobType::MergeAv, payload, req.video_asset_id, task_names::MERGE_VIDEO_AUDIO, args).await
}

pub async fn create_cut_clip_job(state: &AppState, req: CutClipJob) -> Result<Job, ApiError> {
    req.validate()?;
    let payload = merge_options(json!({"start": req.start, "end": req.end}), req.options.clone());
    let args = json!({"video_asset_id": req.video_asset_id, "start": req.start, "end": req.end});
    dispatch(state, JobType::CutClip, payload, req.video_asset_id, task_names::CUT_CLIP, args).await
}

pub async fn get_job(state: &AppState, id: Uuid) -> Result<Job, ApiError> {
    job_store::get_job(&state.pool, id).await
}

pub async fn list_jobs(state: &AppState, status: Option<JobStatus>, limit: i64, offset: i64) -> Result<Vec<Job>, ApiError> {
    job_store::list_jobs(&state.pool, status, limit, offset).await
}

pub async fn cancel_job(state: &AppState, id: Uuid) -> Result<Job, ApiError> {
    job_store::cancel_job(&state.pool, id).await
}

/// `DELETE /jobs/{id}?delete_assets=bool`. Refuses a non-terminal job;
/// when `delete_assets` is set, cascades to the output asset (and, for
/// `shorts` jobs, every clip-manifest asset) that no surviving job still
/// references.
pub async fn delete_job(state: &AppState, id: Uuid, delete_assets: bool) -> Result<(), ApiError> {
    let job = job_store::get_job(&state.pool, id).await?;
    if !job.status.is_terminal() {
        return Err(ApiError::conflict(format!("job {id} is not in a terminal state")));
    }

    if delete_assets {
        let mut candidate_ids = Vec::new();
        if let Some(output_id) = job.output_asset_id {
            candidate_ids.push(output_id);
        }
        if job.job_type == JobType::Shorts {
            if let Some(clip_assets) = job.payload.get("clip_assets").and_then(Value::as_array) {
                for clip in clip_assets {
                    for field in ["asset_id", "thumbnail_asset_id", "subtitle_asset_id"] {
                        if let Some(id_str) = clip.get(field).and_then(Value::as_str) {
                            if let Ok(asset_id) = Uuid::parse_str(id_str) {
                                candidate_ids.push(asset_id);
                            }
                        }
                    }
                }
            }
        }

        job_store::delete_job(&state.pool, id).await?;

        for asset_id in candidate_ids {
            if !crate::store::assets::is_referenced_by_job(&state.pool, asset_id).await? {
                let _ = crate::store::assets::delete_asset(&state.pool, asset_id).await;
            }
        }
    } else {
        job_store::delete_job(&state.pool, id).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rate_limit::RateLimiter;
    use crate::broker::InMemoryBroker;
    use crate::config::Settings;
    use crate::storage::LocalStorageBackend;
    use std::sync::Arc;

    async fn test_state() -> AppState {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let (broker, _rx) = InMemoryBroker::new();
        let settings = Arc::new(Settings::from_env().unwrap());
        AppState {
            pool,
            storage: Arc::new(LocalStorageBackend::new(settings.media_root.clone())),
            broker: Arc::new(broker),
            rate_limiter: Arc::new(RateLimiter::new(settings.rate_limit_requests, settings.rate_limit_window_seconds)),
            settings,
        }
    }

    #[tokio::test]
    async fn create_cut_clip_job_dispatches_and_attaches_task_id() {
        let state = test_state().await;
        let job = create_cut_clip_job(&state, CutClipJob { video_asset_id: Uuid::new_v4(), start: 0.5, end: 1.5, options: Value::Null })
            .await
            .unwrap();
        assert!(job.task_id.is_some());
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn create_cut_clip_job_rejects_invalid_range() {
        let state = test_state().await;
        let err = create_cut_clip_job(&state, CutClipJob { video_asset_id: Uuid::new_v4(), start: 2.0, end: 1.0, options: Value::Null }).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn delete_job_refuses_when_not_terminal() {
        let state = test_state().await;
        let job = create_cut_clip_job(&state, CutClipJob { video_asset_id: Uuid::new_v4(), start: 0.0, end: 1.0, options: Value::Null }).await.unwrap();
        let err = delete_job(&state, job.id, true).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn delete_job_succeeds_once_terminal() {
        let state = test_state().await;
        let job = create_cut_clip_job(&state, CutClipJob { video_asset_id: Uuid::new_v4(), start: 0.0, end: 1.0, options: Value::Null }).await.unwrap();
        job_store::transition_status(&state.pool, job.id, JobStatus::Completed, None).await.unwrap();
        delete_job(&state, job.id, false).await.unwrap();
        assert!(job_store::get_job(&state.pool, job.id).await.is_err());
    }
}
