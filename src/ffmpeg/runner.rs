use crate::error::{FfmpegError, FfmpegResult};
use async_trait::async_trait;
use std::process::Output;
use std::sync::Arc;

/// A single invocation: the binary name (`ffmpeg`/`ffprobe`) and its argv,
/// not including argv[0].
#[derive(Debug, Clone)]
pub struct Invocation {
    pub binary: &'static str,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(binary: &'static str, args: Vec<String>) -> Self {
        Self { binary, args }
    }
}

/// Executes an [`Invocation`] and returns its captured output. Swappable so
/// pipelines can be tested without a real ffmpeg binary on PATH.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> FfmpegResult<Output>;
}

/// Shells out via [`tokio::task::spawn_blocking`] wrapping
/// [`std::process::Command`] — ffmpeg/ffprobe invocations block for the
/// duration of the encode, so they run off the async reactor thread rather
/// than tying one up.
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> FfmpegResult<Output> {
        let binary = invocation.binary;
        let args = invocation.args.clone();
        let output = tokio::task::spawn_blocking(move || std::process::Command::new(binary).args(&args).output())
            .await
            .expect("ffmpeg runner task panicked");

        let output = match output {
            Ok(output) => output,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(FfmpegError::BinaryNotFound { binary })
            }
            Err(source) => return Err(FfmpegError::Spawn { binary, source }),
        };

        if !output.status.success() {
            return Err(FfmpegError::NonZeroExit {
                binary,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(output)
    }
}

pub fn default_runner() -> Arc<dyn ProcessRunner> {
    Arc::new(SystemRunner)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::sync::Mutex;

    /// Records every invocation and returns a canned stdout/stderr pair;
    /// never touches the filesystem or PATH.
    pub struct FakeRunner {
        pub calls: Mutex<Vec<Invocation>>,
        pub stdout: Vec<u8>,
    }

    impl FakeRunner {
        pub fn new(stdout: Vec<u8>) -> Self {
            Self { calls: Mutex::new(Vec::new()), stdout }
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(&self, invocation: &Invocation) -> FfmpegResult<Output> {
            self.calls.lock().unwrap().push(invocation.clone());
            Ok(Output { status: std::process::ExitStatus::from_raw(0), stdout: self.stdout.clone(), stderr: Vec::new() })
        }
    }
}
