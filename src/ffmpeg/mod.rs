pub mod commands;
pub mod probe;
pub mod runner;

pub use commands::{
    burn_subtitles, burn_subtitles_args, cut_clip, cut_clip_args, detect_silence, extract_audio, extract_audio_16k_mono,
    extract_audio_16k_mono_args, extract_audio_args, merge_video_audio, merge_video_audio_args, parse_silence_stderr, reframe, reframe_args,
    Ducking, ReframeStrategy, SilenceInterval,
};
pub use probe::{probe_media, MediaProbe, VideoStreamInfo};
pub use runner::{default_runner, Invocation, ProcessRunner, SystemRunner};

pub use crate::error::FfmpegError;
use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for ffmpeg/ffprobe invocations. Non-zero exits and spawn
/// failures are retried; a missing binary never is, since retrying won't
/// make it appear.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_seconds: 2 }
    }
}

/// Progress written into a job's payload on each retry, so a client polling
/// job status can see an operation is being retried rather than stuck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryProgress {
    pub retry_step: String,
    pub retry_attempt: usize,
    pub retry_max_attempts: usize,
}

fn is_retryable(err: &FfmpegError) -> bool {
    !matches!(err, FfmpegError::BinaryNotFound { .. } | FfmpegError::InputNotFound(_) | FfmpegError::Cancelled)
}

/// Run a fallible ffmpeg step under [`RetryPolicy`], calling `on_retry` with
/// a [`RetryProgress`] snapshot before each retried attempt so the caller
/// can persist it onto the owning job.
pub async fn run_with_retry<F, Fut, T>(step: &str, policy: RetryPolicy, mut op: F, mut on_retry: impl FnMut(RetryProgress)) -> Result<T, FfmpegError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FfmpegError>>,
{
    let builder = ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(policy.base_delay_seconds))
        .with_factor(2.0)
        .with_max_times(policy.max_attempts.saturating_sub(1));

    let mut attempt = 0usize;
    op.retry(builder)
        .when(is_retryable)
        .notify(|_err: &FfmpegError, _dur: Duration| {
            attempt += 1;
            on_retry(RetryProgress { retry_step: step.to_string(), retry_attempt: attempt, retry_max_attempts: policy.max_attempts });
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn run_with_retry_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy { max_attempts: 2, base_delay_seconds: 0 };
        let result: Result<(), FfmpegError> = run_with_retry(
            "probe",
            policy,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FfmpegError::NonZeroExit { binary: "ffmpeg", status: 1, stderr: "boom".into() }) }
            },
            |_progress| {},
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_with_retry_does_not_retry_missing_binary() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::default();
        let result: Result<(), FfmpegError> = run_with_retry(
            "probe",
            policy,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FfmpegError::BinaryNotFound { binary: "ffmpeg" }) }
            },
            |_progress| {},
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
