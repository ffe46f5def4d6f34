use crate::ffmpeg::RetryProgress;
use crate::store::jobs as job_store;
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Builds the `on_retry` callback [`crate::ffmpeg::run_with_retry`] expects,
/// writing `{retry_step, retry_attempt, retry_max_attempts}` into the job's
/// payload so a client polling status can see a step being retried. The
/// pool is cloned into a detached task since `on_retry` is a plain
/// synchronous closure, not async.
pub fn on_retry_patch(pool: SqlitePool, job_id: Uuid) -> impl FnMut(RetryProgress) {
    move |progress: RetryProgress| {
        let pool = pool.clone();
        tokio::spawn(async move {
            let patch = json!({
                "retry_step": progress.retry_step,
                "retry_attempt": progress.retry_attempt,
                "retry_max_attempts": progress.retry_max_attempts,
            });
            let _ = job_store::update_job_progress(&pool, job_id, None, Some(patch)).await;
        });
    }
}
