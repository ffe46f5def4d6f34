pub mod assets;
pub mod bundle;
pub mod jobs;
pub mod presets;
pub mod rate_limit;
pub mod requests;
pub mod system;

use crate::broker::Broker;
use crate::config::Settings;
use crate::storage::StorageBackend;
use rate_limit::RateLimiter;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Everything an API operation needs: the store pool, the configured
/// storage backend, the job broker, process-wide settings, and the shared
/// rate limiter. Constructed once at startup and handed to every operation
/// by reference.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub storage: Arc<dyn StorageBackend>,
    pub broker: Arc<dyn Broker>,
    pub settings: Arc<Settings>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(pool: SqlitePool, storage: Arc<dyn StorageBackend>, broker: Arc<dyn Broker>, settings: Arc<Settings>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(settings.rate_limit_requests, settings.rate_limit_window_seconds));
        Self { pool, storage, broker, settings, rate_limiter }
    }
}
