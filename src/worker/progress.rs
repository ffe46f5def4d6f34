use crate::api::AppState;
use crate::broker::ProgressUpdate;
use crate::store::jobs as job_store;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Reports progress twofold: authoritatively on the store (source of
/// truth for polling clients) and best-effort on the broker for
/// subscribers. A broker publish failure is logged, never propagated —
/// losing a progress event must not fail the pipeline.
pub async fn report(state: &AppState, job_id: Uuid, progress: f64, payload_patch: Option<Value>, message: Option<&str>) {
    if let Err(err) = job_store::update_job_progress(&state.pool, job_id, Some(progress), payload_patch).await {
        warn!(%job_id, %err, "failed to persist job progress");
    }
    let update = ProgressUpdate { job_id, progress, message: message.map(str::to_string) };
    if let Err(err) = state.broker.publish_progress(update).await {
        warn!(%job_id, %err, "failed to publish progress event");
    }
}
