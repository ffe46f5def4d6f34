use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use reframe::api::AppState;
use reframe::broker::{Broker, NatsBroker, TaskMessage};
use reframe::config::Settings;
use reframe::{cleanup, logging, storage, store, worker};
use std::process::Command as SystemCommand;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "reframe")]
#[command(version, about = "Media processing job platform: captions, translation, styled subtitles, shorts, merge, and clip pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations and exit.
    Migrate,
    /// Run the worker loop: consume dispatched jobs over the broker and execute pipelines.
    Worker,
    /// Report ffmpeg/ffprobe availability and platform info as JSON.
    SystemInfo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().map_err(|e| anyhow::anyhow!(e))?;
    logging::init(settings.log_format, &settings.log_level);

    let cli = Cli::parse();
    match cli.command {
        Command::Migrate => run_migrate(&settings).await,
        Command::SystemInfo => run_system_info(),
        Command::Worker => run_worker(settings).await,
    }
}

async fn run_migrate(settings: &Settings) -> anyhow::Result<()> {
    store::init_pool(&settings.database_url).await.context("failed to open database / run migrations")?;
    println!("migrations applied");
    Ok(())
}

/// Probe `ffmpeg -version` / `ffprobe -version` the way the worker's own
/// ffmpeg runner would invoke them, without actually running a pipeline.
fn binary_version(binary: &str) -> Option<String> {
    let output = SystemCommand::new(binary).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).lines().next().map(str::to_string)
}

fn run_system_info() -> anyhow::Result<()> {
    let info = serde_json::json!({
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "reframe_version": env!("CARGO_PKG_VERSION"),
        "ffmpeg": binary_version("ffmpeg"),
        "ffprobe": binary_version("ffprobe"),
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Consume dispatched tasks from the broker and hand each to
/// `worker::run_pipeline`, until a second Ctrl+C forces an exit or the
/// subscription closes.
async fn run_worker(settings: Settings) -> anyhow::Result<()> {
    let settings = Arc::new(settings);
    let pool = store::init_pool(&settings.database_url).await.context("failed to open database / run migrations")?;
    let backend = storage::build_storage(&settings).context("failed to configure storage backend")?;

    let nats = NatsBroker::connect(&settings.broker_url).await.context("failed to connect to broker")?;
    let mut subscription = nats.subscribe_jobs().await.context("failed to subscribe to job subject")?;
    let broker: Arc<dyn Broker> = Arc::new(nats);

    let state = AppState::new(pool.clone(), backend, broker, settings.clone());

    let cleanup_handle = tokio::spawn(cleanup::run_loop(pool, settings.media_root.clone(), settings.cleanup_ttl_hours, settings.cleanup_interval_seconds));

    let shutdown = Arc::new(Notify::new());
    let force_exit = Arc::new(AtomicBool::new(false));
    let shutdown_setter = shutdown.clone();
    let force_exit_setter = force_exit.clone();
    ctrlc::set_handler(move || {
        if force_exit_setter.swap(true, Ordering::Relaxed) {
            std::process::exit(1);
        }
        eprintln!("\nreceived Ctrl+C, finishing in-flight jobs... (press again to force quit)");
        shutdown_setter.notify_one();
    })
    .ok();

    info!(broker_url = %state.settings.broker_url, "worker loop started");
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("worker loop shutting down");
                break;
            }
            next = subscription.next() => {
                match next {
                    Some(message) => match serde_json::from_slice::<TaskMessage>(&message.payload) {
                        Ok(task_message) => {
                            let state = state.clone();
                            tokio::spawn(async move { worker::run_pipeline(&state, task_message).await; });
                        }
                        Err(err) => warn!(%err, "dropped a job message that failed to decode"),
                    },
                    None => {
                        error!("job subscription closed, stopping worker loop");
                        break;
                    }
                }
            }
        }
    }

    cleanup_handle.abort();
    Ok(())
}
