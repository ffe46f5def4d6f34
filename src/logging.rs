use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Safe to call once at process
/// startup; a second call is a no-op (tracing itself panics on double-init,
/// so callers should only invoke this from `main`).
pub fn init(log_format: LogFormat, log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match log_format {
        LogFormat::Json => {
            subscriber.json().init();
        }
        LogFormat::Plain => {
            subscriber.compact().init();
        }
    }
}
