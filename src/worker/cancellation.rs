use super::{PipelineError, PipelineResult};
use crate::api::AppState;
use crate::store::jobs as job_store;
use crate::store::models::JobStatus;
use uuid::Uuid;

/// Poll the job's current status and stop here if a client has cancelled
/// it. Pipelines call this before each major step rather than only once,
/// since cancellation can arrive mid-run.
pub async fn ensure_not_cancelled(state: &AppState, job_id: Uuid) -> PipelineResult<()> {
    let job = job_store::get_job(&state.pool, job_id).await?;
    if job.status == JobStatus::Cancelled {
        return Err(PipelineError::Cancelled);
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
    use crate::store::jobs::{create_job, NewJob};
    use crate::store::models::JobType;
    use serde_json::json;
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
    async fn passes_through_for_running_job() {
        let state = test_state().await;
        let job = create_job(&state.pool, NewJob { job_type: JobType::CutClip, payload: json!({}), input_asset_id: None }).await.unwrap();
        assert!(ensure_not_cancelled(&state, job.id).await.is_ok());
    }

    #[tokio::test]
    async fn stops_once_job_is_cancelled() {
        let state = test_state().await;
        let job = create_job(&state.pool, NewJob { job_type: JobType::CutClip, payload: json!({}), input_asset_id: None }).await.unwrap();
        job_store::cancel_job(&state.pool, job.id).await.unwrap();
        assert!(matches!(ensure_not_cancelled(&state, job.id).await, Err(PipelineError::Cancelled)));
    }
}
