use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// One sweep of `{media_root}/tmp`: delete any file older than `ttl` whose
/// relative path isn't referenced by a [`crate::store::models::MediaAsset`]
/// row. Best-effort — a single file's stat/delete failure is logged and
/// skipped rather than aborting the sweep.
pub async fn sweep_once(pool: &SqlitePool, media_root: &Path, ttl: Duration) -> anyhow::Result<usize> {
    let tmp_dir = media_root.join("tmp");
    if !tmp_dir.is_dir() {
        return Ok(0);
    }

    let referenced: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT uri FROM media_assets WHERE uri IS NOT NULL")
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

    let now = SystemTime::now();
    let mut deleted = 0usize;
    let mut entries = tokio::fs::read_dir(&tmp_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let rel_uri = format!("tmp/{}", entry.file_name().to_string_lossy());
        if referenced.contains(&rel_uri) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to stat temp file during cleanup sweep");
                continue;
            }
        };
        let age = match metadata.modified().and_then(|modified| now.duration_since(modified).map_err(std::io::Error::other)) {
            Ok(age) => age,
            Err(_) => continue,
        };
        if age < ttl {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                deleted += 1;
                debug!(path = %path.display(), "removed stale temp file");
            }
            Err(err) => warn!(path = %path.display(), %err, "failed to remove stale temp file"),
        }
    }

    Ok(deleted)
}

/// Run [`sweep_once`] forever on `interval`, logging and continuing past any
/// single sweep's failure rather than exiting the task.
pub async fn run_loop(pool: SqlitePool, media_root: std::path::PathBuf, ttl_hours: u64, interval_seconds: u64) {
    let ttl = Duration::from_secs(ttl_hours * 3600);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        ticker.tick().await;
        match sweep_once(&pool, &media_root, ttl).await {
            Ok(deleted) if deleted > 0 => debug!(deleted, "cleanup sweep removed stale temp files"),
            Ok(_) => {}
            Err(err) => warn!(%err, "cleanup sweep failed"),
        }
    }
}
