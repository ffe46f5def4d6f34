use std::path::PathBuf;
use std::str::FromStr;

/// Logging output shape. `Json` is used in production; `Plain` is easier to
/// read on a local terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Plain,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "plain" => Ok(LogFormat::Plain),
            other => Err(format!("unknown LOG_FORMAT '{other}', expected json|plain")),
        }
    }
}

/// Storage backend selection. See [`crate::storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackendKind {
    #[default]
    Local,
    S3,
    R2,
}

impl FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "filesystem" | "fs" => Ok(StorageBackendKind::Local),
            "s3" => Ok(StorageBackendKind::S3),
            "r2" => Ok(StorageBackendKind::R2),
            other => Err(format!("unknown STORAGE_BACKEND '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: String,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub public_base_url: Option<String>,
    pub presign_expires_seconds: u64,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

/// Process-wide configuration, read once from the environment at startup and
/// passed down by reference/`Arc` rather than re-read per request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub broker_url: String,
    pub result_backend: String,
    pub media_root: PathBuf,
    pub api_title: String,
    pub api_version: String,
    pub log_format: LogFormat,
    pub log_level: String,
    pub rate_limit_requests: u32,
    pub rate_limit_window_seconds: u64,
    /// 0 disables the upload size cap.
    pub max_upload_bytes: u64,
    pub cleanup_ttl_hours: u64,
    pub cleanup_interval_seconds: u64,
    pub storage_backend: StorageBackendKind,
    pub s3: Option<S3Config>,
    pub offline_mode: bool,
    pub job_retry_max_attempts: u32,
    pub job_retry_base_delay_seconds: f64,
}

fn env_str(name: &str, default: &str) -> String {
    std::env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_truthy(name: &str) -> bool {
    matches!(
        std::env::var(name).unwrap_or_default().trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Settings {
    /// Load from environment variables, applying the defaults documented in
    /// spec.md §6.2.
    pub fn from_env() -> Result<Self, String> {
        let log_format = env_opt("LOG_FORMAT")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();
        let storage_backend = env_opt("STORAGE_BACKEND")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();
        let offline_mode = env_truthy("OFFLINE_MODE");

        if offline_mode && !matches!(storage_backend, StorageBackendKind::Local) {
            return Err(
                "OFFLINE_MODE is enabled; refusing to configure a non-local STORAGE_BACKEND".to_string(),
            );
        }

        let s3 = match storage_backend {
            StorageBackendKind::Local => None,
            StorageBackendKind::S3 | StorageBackendKind::R2 => Some(S3Config {
                bucket: env_str("S3_BUCKET", ""),
                prefix: env_str("S3_PREFIX", ""),
                region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
                endpoint_url: env_opt("S3_ENDPOINT_URL"),
                public_base_url: env_opt("S3_PUBLIC_BASE_URL"),
                presign_expires_seconds: env_parsed("S3_PRESIGN_EXPIRES_SECONDS", 604_800).max(60),
                access_key_id: env_opt("S3_ACCESS_KEY_ID").or_else(|| env_opt("AWS_ACCESS_KEY_ID")),
                secret_access_key: env_opt("S3_SECRET_ACCESS_KEY").or_else(|| env_opt("AWS_SECRET_ACCESS_KEY")),
                session_token: env_opt("S3_SESSION_TOKEN").or_else(|| env_opt("AWS_SESSION_TOKEN")),
            }),
        };

        Ok(Self {
            database_url: env_str("DATABASE_URL", "sqlite://reframe.db"),
            broker_url: env_str("BROKER_URL", "nats://127.0.0.1:4222"),
            result_backend: env_opt("RESULT_BACKEND").unwrap_or_else(|| env_str("BROKER_URL", "nats://127.0.0.1:4222")),
            media_root: PathBuf::from(env_str("MEDIA_ROOT", "./media")),
            api_title: env_str("API_TITLE", "Reframe API"),
            api_version: env_str("API_VERSION", env!("CARGO_PKG_VERSION")),
            log_format,
            log_level: env_str("LOG_LEVEL", "info"),
            rate_limit_requests: env_parsed("RATE_LIMIT_REQUESTS", 60),
            rate_limit_window_seconds: env_parsed("RATE_LIMIT_WINDOW_SECONDS", 60),
            max_upload_bytes: env_parsed("MAX_UPLOAD_BYTES", 1_073_741_824),
            cleanup_ttl_hours: env_parsed("CLEANUP_TTL_HOURS", 24),
            cleanup_interval_seconds: env_parsed("CLEANUP_INTERVAL_SECONDS", 3600),
            storage_backend,
            s3,
            offline_mode,
            job_retry_max_attempts: env_parsed("JOB_RETRY_MAX_ATTEMPTS", 3),
            job_retry_base_delay_seconds: env_parsed("JOB_RETRY_BASE_DELAY_SECONDS", 1.0),
        })
    }
}
