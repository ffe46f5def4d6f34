use super::AppState;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct WorkerStatus {
    pub ping_ok: bool,
    pub workers: Vec<String>,
    pub system_info: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub api_version: String,
    pub offline_mode: bool,
    pub storage_backend: String,
    pub broker_url: String,
    pub result_backend: String,
    pub worker: WorkerStatus,
}

/// `GET /system/status`. The worker round-trip is a best-effort `ping` —
/// a broker outage is reported as `{ping_ok: false, error}` rather than
/// failing the whole endpoint.
pub async fn system_status(state: &AppState) -> SystemStatus {
    let worker = match state.broker.ping().await {
        Ok(ok) => WorkerStatus { ping_ok: ok, workers: Vec::new(), system_info: None, error: None },
        Err(err) => WorkerStatus { ping_ok: false, workers: Vec::new(), system_info: None, error: Some(err.to_string()) },
    };

    SystemStatus {
        api_version: state.settings.api_version.clone(),
        offline_mode: state.settings.offline_mode,
        storage_backend: format!("{:?}", state.settings.storage_backend),
        broker_url: state.settings.broker_url.clone(),
        result_backend: state.settings.result_backend.clone(),
        worker,
    }
}
