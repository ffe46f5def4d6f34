use serde::Serialize;
use thiserror::Error;

/// Machine-readable error categories returned to API callers.
///
/// Mirrors the taxonomy every job-lifecycle and asset operation is expected
/// to surface: validation failures, missing entities, lifecycle/referential
/// conflicts, rate limiting, and unexpected server faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Conflict,
    RateLimited,
    ServerError,
}

/// Uniform error envelope returned by every API-level operation.
#[derive(Debug, Clone, Serialize, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError, message)
    }

    /// HTTP status code an embedding framework should map this to.
    pub fn status_code(&self) -> u16 {
        match self.code {
            ErrorCode::ValidationError => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::RateLimited => 429,
            ErrorCode::ServerError => 500,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::server_error(format!("storage error: {err}"))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors raised inside the media-core domain (subtitle/transcription
/// normalization, serialization, segment selection). These never cross the
/// API boundary directly — pipelines convert them into either a job
/// `warnings[]` entry (recoverable) or a terminal `failed` status.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid word timing: {0}")]
    InvalidWord(String),

    #[error("invalid subtitle timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("malformed subtitle document: {0}")]
    MalformedSubtitle(String),

    #[error("unsupported subtitle format: {0}")]
    UnsupportedFormat(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors raised while shelling out to ffmpeg/ffprobe.
#[derive(Error, Debug)]
pub enum FfmpegError {
    #[error("{binary} not found on PATH")]
    BinaryNotFound { binary: &'static str },

    #[error("input file not found: {0}")]
    InputNotFound(String),

    #[error("{binary} exited with status {status}: {stderr}")]
    NonZeroExit { binary: &'static str, status: i32, stderr: String },

    #[error("failed to spawn {binary}: {source}")]
    Spawn { binary: &'static str, #[source] source: std::io::Error },

    #[error("failed to parse output: {0}")]
    Parse(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type FfmpegResult<T> = std::result::Result<T, FfmpegError>;

/// Errors raised by storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("uri is not a local path: {0}")]
    NotLocal(String),

    #[error("offline mode forbids constructing a {0} storage backend")]
    OfflineForbidden(String),

    #[error("unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("object store error: {0}")]
    ObjectStore(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
