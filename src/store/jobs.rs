use super::models::{Job, JobRow, JobStatus, JobType};
use crate::error::ApiError;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct NewJob {
    pub job_type: JobType,
    pub payload: Value,
    pub input_asset_id: Option<Uuid>,
}

fn row_to_job(row: JobRow) -> Result<Job, ApiError> {
    Job::try_from(row).map_err(ApiError::server_error)
}

/// Phase one of job creation: insert a `queued` row with no `task_id` yet.
/// Dispatch to the broker happens after this commits, then
/// [`attach_task_id`] records the broker's task id — never inside one
/// transaction spanning the broker call, so a broker outage can't leave a
/// half-written row.
pub async fn create_job(pool: &SqlitePool, data: NewJob) -> Result<Job, ApiError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs (id, job_type, status, progress, payload, input_asset_id, created_at, updated_at)
        VALUES (?1, ?2, 'queued', 0.0, ?3, ?4, datetime('now'), datetime('now'))
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(data.job_type.as_str())
    .bind(data.payload.to_string())
    .bind(data.input_asset_id)
    .fetch_one(pool)
    .await?;
    row_to_job(row)
}

pub async fn attach_task_id(pool: &SqlitePool, job_id: Uuid, task_id: &str) -> Result<Job, ApiError> {
    let row = sqlx::query_as::<_, JobRow>("UPDATE jobs SET task_id = ?1, updated_at = datetime('now') WHERE id = ?2 RETURNING *")
        .bind(task_id)
        .bind(job_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;
    row_to_job(row)
}

pub async fn get_job(pool: &SqlitePool, id: Uuid) -> Result<Job, ApiError> {
    let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))?;
    row_to_job(row)
}

pub async fn list_jobs(pool: &SqlitePool, status: Option<JobStatus>, limit: i64, offset: i64) -> Result<Vec<Job>, ApiError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3")
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as::<_, JobRow>("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?1 OFFSET ?2")
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        }
    };
    rows.into_iter().map(row_to_job).collect()
}

fn merge_payload(existing: &Value, patch: &Value) -> Value {
    let mut merged = existing.clone();
    if let (Value::Object(merged_map), Value::Object(patch_map)) = (&mut merged, patch) {
        for (key, value) in patch_map {
            merged_map.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Shallow-merges `patch` into the job's `payload` object and updates
/// `progress`/`status`/`error` in one statement. Refuses to move a job out
/// of a terminal status — completed/failed/cancelled jobs are immutable.
pub async fn update_job_progress(
    pool: &SqlitePool,
    id: Uuid,
    progress: Option<f64>,
    payload_patch: Option<Value>,
) -> Result<Job, ApiError> {
    let current = get_job(pool, id).await?;
    if current.status.is_terminal() {
        return Err(ApiError::conflict(format!("job {id} is already in a terminal state")));
    }

    let new_payload = match payload_patch {
        Some(patch) => merge_payload(&current.payload, &patch),
        None => current.payload,
    };
    let new_progress = progress.unwrap_or(current.progress).clamp(0.0, 1.0);

    let row = sqlx::query_as::<_, JobRow>(
        "UPDATE jobs SET progress = ?1, payload = ?2, updated_at = datetime('now') WHERE id = ?3 RETURNING *",
    )
    .bind(new_progress)
    .bind(new_payload.to_string())
    .bind(id)
    .fetch_one(pool)
    .await?;
    row_to_job(row)
}

pub async fn transition_status(pool: &SqlitePool, id: Uuid, status: JobStatus, error: Option<String>) -> Result<Job, ApiError> {
    let current = get_job(pool, id).await?;
    if current.status.is_terminal() {
        return Err(ApiError::conflict(format!("job {id} is already in a terminal state")));
    }

    let row = sqlx::query_as::<_, JobRow>(
        "UPDATE jobs SET status = ?1, error = ?2, updated_at = datetime('now') WHERE id = ?3 RETURNING *",
    )
    .bind(status.as_str())
    .bind(&error)
    .bind(id)
    .fetch_one(pool)
    .await?;
    row_to_job(row)
}

/// Atomically commits a pipeline's terminal outcome: status, progress, a
/// shallow payload patch, an optional error, and an optional output asset,
/// all in one statement. Used by the worker runtime instead of composing
/// [`transition_status`] + [`update_job_progress`] + [`set_output_asset`],
/// since those would each separately refuse once the first one lands.
#[allow(clippy::too_many_arguments)]
pub async fn finish_job(
    pool: &SqlitePool,
    id: Uuid,
    status: JobStatus,
    progress: f64,
    payload_patch: Option<Value>,
    error: Option<String>,
    output_asset_id: Option<Uuid>,
) -> Result<Job, ApiError> {
    let current = get_job(pool, id).await?;
    if current.status.is_terminal() {
        return Err(ApiError::conflict(format!("job {id} is already in a terminal state")));
    }

    let new_payload = match payload_patch {
        Some(patch) => merge_payload(&current.payload, &patch),
        None => current.payload,
    };

    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs
        SET status = ?1, progress = ?2, payload = ?3, error = ?4,
            output_asset_id = COALESCE(?5, output_asset_id), updated_at = datetime('now')
        WHERE id = ?6
        RETURNING *
        "#,
    )
    .bind(status.as_str())
    .bind(progress.clamp(0.0, 1.0))
    .bind(new_payload.to_string())
    .bind(&error)
    .bind(output_asset_id)
    .bind(id)
    .fetch_one(pool)
    .await?;
    row_to_job(row)
}

pub async fn set_output_asset(pool: &SqlitePool, id: Uuid, output_asset_id: Uuid) -> Result<Job, ApiError> {
    let row = sqlx::query_as::<_, JobRow>("UPDATE jobs SET output_asset_id = ?1, updated_at = datetime('now') WHERE id = ?2 RETURNING *")
        .bind(output_asset_id)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))?;
    row_to_job(row)
}

pub async fn cancel_job(pool: &SqlitePool, id: Uuid) -> Result<Job, ApiError> {
    transition_status(pool, id, JobStatus::Cancelled, None).await
}

pub async fn delete_job(pool: &SqlitePool, id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM jobs WHERE id = ?1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("job {id} not found")));
    }
    Ok(())
}
