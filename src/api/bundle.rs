use super::AppState;
use crate::error::ApiError;
use crate::storage::is_remote_uri;
use crate::store::jobs as job_store;
use crate::store::models::{Job, JobType, MediaAsset};
use serde_json::{json, Value};
use std::io::Write;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn write_json(zip: &mut ZipWriter<std::io::Cursor<Vec<u8>>>, name: &str, value: &Value) -> Result<(), ApiError> {
    zip.start_file(name, SimpleFileOptions::default()).map_err(|e| ApiError::server_error(e.to_string()))?;
    let body = serde_json::to_vec_pretty(value).map_err(|e| ApiError::server_error(e.to_string()))?;
    zip.write_all(&body).map_err(|e| ApiError::server_error(e.to_string()))?;
    Ok(())
}

fn write_text(zip: &mut ZipWriter<std::io::Cursor<Vec<u8>>>, name: &str, body: &str) -> Result<(), ApiError> {
    zip.start_file(name, SimpleFileOptions::default()).map_err(|e| ApiError::server_error(e.to_string()))?;
    zip.write_all(body.as_bytes()).map_err(|e| ApiError::server_error(e.to_string()))?;
    Ok(())
}

/// Writes an asset's metadata, plus its file (or a `_uri.txt`/`_missing.txt`
/// placeholder), under `{base_name}*` inside the zip. Returns the path of
/// the file entry added, if any.
async fn add_asset_to_zip(state: &AppState, zip: &mut ZipWriter<std::io::Cursor<Vec<u8>>>, asset: &MediaAsset, base_name: &str) -> Result<Option<String>, ApiError> {
    write_json(zip, &format!("{base_name}_meta.json"), &serde_json::to_value(asset).unwrap_or(Value::Null))?;

    let uri = match &asset.uri {
        Some(uri) if !uri.is_empty() => uri,
        _ => return Ok(None),
    };

    if is_remote_uri(uri) {
        write_text(zip, &format!("{base_name}_uri.txt"), uri)?;
        return Ok(Some(format!("{base_name}_uri.txt")));
    }

    let path = match state.storage.resolve_local_path(uri) {
        Ok(path) => path,
        Err(_) => {
            write_text(zip, &format!("{base_name}_missing.txt"), &format!("Asset file missing (uri={uri})"))?;
            return Ok(None);
        }
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let suffix = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            let rel_path = if suffix.is_empty() { base_name.to_string() } else { format!("{base_name}.{suffix}") };
            zip.start_file(&rel_path, SimpleFileOptions::default()).map_err(|e| ApiError::server_error(e.to_string()))?;
            zip.write_all(&bytes).map_err(|e| ApiError::server_error(e.to_string()))?;
            Ok(Some(rel_path))
        }
        Err(_) => {
            write_text(zip, &format!("{base_name}_file_missing.txt"), &format!("Asset file missing at {} (uri={uri})", path.display()))?;
            Ok(None)
        }
    }
}

async fn add_asset_by_id(state: &AppState, zip: &mut ZipWriter<std::io::Cursor<Vec<u8>>>, asset_id: Uuid, base_name: &str) -> Result<Option<String>, ApiError> {
    match crate::store::assets::get_asset(&state.pool, asset_id).await {
        Ok(asset) => add_asset_to_zip(state, zip, &asset, base_name).await,
        Err(_) => {
            write_text(zip, &format!("{base_name}_missing.txt"), &format!("Asset {asset_id} missing from database"))?;
            Ok(None)
        }
    }
}

fn clip_title(job: &Job, index: usize) -> String {
    let prompt = job.payload.get("prompt").and_then(Value::as_str).map(str::trim).filter(|p| !p.is_empty());
    match prompt {
        Some(prompt) => {
            let truncated: String = prompt.chars().take(80).collect();
            format!("{truncated} (Clip {})", index + 1)
        }
        None => format!("Reframe Clip {}", index + 1),
    }
}

/// `GET /jobs/{id}/bundle`. Builds a zip with `job.json`, `error.txt` (if
/// present), input/output asset files, and — for `shorts` jobs — an
/// `upload_package.json` plus a `clips/clip_NN/` directory per clip.
pub async fn build_job_bundle(state: &AppState, job_id: Uuid) -> Result<Vec<u8>, ApiError> {
    let job = job_store::get_job(&state.pool, job_id).await?;
    let cursor = std::io::Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(cursor);

    write_json(&mut zip, "job.json", &serde_json::to_value(&job).unwrap_or(Value::Null))?;
    if let Some(error) = &job.error {
        write_text(&mut zip, "error.txt", error)?;
    }

    if let Some(input_id) = job.input_asset_id {
        add_asset_by_id(state, &mut zip, input_id, "input_asset").await?;
    }
    if let Some(output_id) = job.output_asset_id {
        add_asset_by_id(state, &mut zip, output_id, "output_asset").await?;
    }

    if job.job_type == JobType::Shorts {
        if let Some(clips) = job.payload.get("clip_assets").and_then(Value::as_array) {
            let mut upload_package = json!({
                "version": 1,
                "job_id": job.id,
                "job_type": job.job_type.as_str(),
                "note": "Edit the suggested titles/descriptions/tags before uploading.",
                "prompt": job.payload.get("prompt"),
                "clips": [],
            });

            let mut clip_entries = Vec::new();
            for (idx, clip) in clips.iter().enumerate() {
                let clip_dir = format!("clips/clip_{:02}", idx + 1);
                write_json(&mut zip, &format!("{clip_dir}/clip.json"), clip)?;

                let mut files = json!({"video": Value::Null, "thumbnail": Value::Null, "subtitles": Value::Null});
                for (field, key) in [("asset_id", "video"), ("thumbnail_asset_id", "thumbnail"), ("subtitle_asset_id", "subtitles")] {
                    if let Some(asset_id) = clip.get(field).and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok()) {
                        if let Some(path) = add_asset_by_id(state, &mut zip, asset_id, &format!("{clip_dir}/{key}")).await? {
                            files[key] = json!(path);
                        }
                    }
                }

                clip_entries.push(json!({
                    "index": idx + 1,
                    "id": clip.get("id"),
                    "start": clip.get("start"),
                    "end": clip.get("end"),
                    "duration": clip.get("duration"),
                    "score": clip.get("score"),
                    "files": files,
                    "suggested": {
                        "title": clip_title(&job, idx),
                        "description": format!("Generated by Reframe from job {}.", job.id),
                        "tags": ["reframe", "shorts"],
                    },
                    "source_uris": {
                        "video": clip.get("uri"),
                        "thumbnail": clip.get("thumbnail_uri"),
                        "subtitles": clip.get("subtitle_uri"),
                    },
                }));
            }
            upload_package["clips"] = json!(clip_entries);
            write_json(&mut zip, "upload_package.json", &upload_package)?;
        }
    }

    let cursor = zip.finish().map_err(|e| ApiError::server_error(e.to_string()))?;
    Ok(cursor.into_inner())
}
