//! Bounded process execution.
//!
//! A child runs under a hard deadline with both output streams captured up
//! to a byte ceiling. Exit conditions are folded into a [`CommandResponse`]
//! with normalized exit codes, so callers never see a raw spawn or wait error.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chatgate_commons::CommandResponse;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::process_group::kill_process_group;
#[cfg(unix)]
use crate::process_group::set_process_group;

pub const TRUNCATION_MARKER: &str = "\n[truncated]\n";
pub const TIMEOUT_EXIT_CODE: i32 = 124;
pub const SIGNAL_EXIT_CODE: i32 = 137;
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 1;

const READ_CHUNK: usize = 8192;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_OUTPUT_BYTES: usize = 8 * 1024;
/// How long to keep draining pipes after the child is gone. Bounds the wait
/// when a grandchild outside the process group still holds the write end open.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub timeout: Duration,
    /// Ceiling applied to stdout and stderr independently.
    pub max_output_bytes: usize,
}

impl ProcessOptions {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

type SharedCapture = Arc<Mutex<Captured>>;

impl Captured {
    fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// Read a stream to EOF into `sink`, keeping at most `limit` bytes.
async fn capture<R>(reader: Option<R>, limit: usize, sink: SharedCapture)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };

    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let read = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) => {
                debug!(%error, "stopped reading child output");
                break;
            }
        };
        let mut captured = sink.lock();
        let remaining = limit.saturating_sub(captured.bytes.len());
        if read > remaining {
            captured.truncated = true;
        }
        let kept = remaining.min(read);
        if let Some(chunk) = buffer.get(..kept) {
            captured.bytes.extend_from_slice(chunk);
        }
    }
}

fn spawn_capture<R>(reader: Option<R>, limit: usize) -> (JoinHandle<()>, SharedCapture)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let sink = SharedCapture::default();
    let handle = tokio::spawn(capture(reader, limit, Arc::clone(&sink)));
    (handle, sink)
}

/// Wait up to [`DRAIN_GRACE`] for the reader to finish, then keep whatever
/// it has read so far.
async fn collect((handle, sink): (JoinHandle<()>, SharedCapture)) -> Captured {
    let abort = handle.abort_handle();
    match tokio::time::timeout(DRAIN_GRACE, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => warn!(%error, "output capture task failed"),
        Err(_) => {
            warn!("output pipe still open after child exit; keeping partial capture");
            abort.abort();
        }
    }
    std::mem::take(&mut *sink.lock())
}

fn kill_group(pid: Option<u32>) {
    if let Some(pid) = pid
        && let Err(error) = kill_process_group(pid)
    {
        warn!(pid, %error, "failed to kill process group");
    }
}

fn classify(status: ExitStatus) -> (i32, Option<String>) {
    if status.success() {
        return (0, None);
    }
    if let Some(code) = status.code() {
        return (code, Some(format!("exit status {code}")));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (SIGNAL_EXIT_CODE, Some(format!("terminated by signal {signal}")));
        }
    }
    (SPAWN_FAILURE_EXIT_CODE, Some("process terminated abnormally".to_string()))
}

/// Spawn `options.program` and wait for it under `options.timeout`.
///
/// Exit codes: timeout 124, killed by a signal 137, a natural non-zero
/// exit keeps its own code, and a spawn or wait failure 1.
pub async fn run_process(options: &ProcessOptions) -> CommandResponse {
    let mut command = Command::new(&options.program);
    command
        .args(&options.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &options.current_dir {
        command.current_dir(dir);
    }
    #[cfg(unix)]
    // SAFETY: the hook only calls setpgid, which is async-signal-safe.
    unsafe {
        command.pre_exec(set_process_group);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => {
            warn!(program = %options.program.display(), %error, "failed to spawn command");
            return CommandResponse {
                ok: false,
                exit_code: SPAWN_FAILURE_EXIT_CODE,
                error: error.to_string(),
                ..CommandResponse::default()
            };
        }
    };

    let limit = options.max_output_bytes;
    let stdout_capture = spawn_capture(child.stdout.take(), limit);
    let stderr_capture = spawn_capture(child.stderr.take(), limit);
    let pid = child.id();

    let (exit_code, error) = match tokio::time::timeout(options.timeout, child.wait()).await {
        Ok(Ok(status)) => classify(status),
        Ok(Err(error)) => (SPAWN_FAILURE_EXIT_CODE, Some(error.to_string())),
        Err(_) => {
            warn!(
                program = %options.program.display(),
                timeout_secs = options.timeout.as_secs(),
                "command timed out; killing process group"
            );
            kill_group(pid);
            if let Err(error) = child.kill().await {
                debug!(%error, "child already gone after group kill");
            }
            (
                TIMEOUT_EXIT_CODE,
                Some(format!(
                    "command timed out after {}s",
                    options.timeout.as_secs()
                )),
            )
        }
    };

    // Background jobs left in the group must not keep the pipes open.
    kill_group(pid);
    let (stdout, stderr) = tokio::join!(collect(stdout_capture), collect(stderr_capture));
    let (stdout, stderr) = (stdout.into_text(), stderr.into_text());

    CommandResponse {
        ok: error.is_none(),
        exit_code,
        stdout,
        stderr,
        error: error.unwrap_or_default(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let response = run_process(&ProcessOptions::new("/bin/echo").args(["hello"])).await;
        assert_eq!(response, CommandResponse::success("hello\n"));
    }

    #[tokio::test]
    async fn natural_exit_code_is_preserved() {
        let options = ProcessOptions::new("/bin/sh").args(["-c", "echo oops >&2; exit 3"]);
        let response = run_process(&options).await;

        assert!(!response.ok);
        assert_eq!(response.exit_code, 3);
        assert_eq!(response.stderr, "oops\n");
        assert_eq!(response.error, "exit status 3");
    }

    #[tokio::test]
    async fn signal_maps_to_137() {
        let options = ProcessOptions::new("/bin/sh").args(["-c", "kill -9 $$"]);
        let response = run_process(&options).await;

        assert!(!response.ok);
        assert_eq!(response.exit_code, SIGNAL_EXIT_CODE);
    }

    #[tokio::test]
    async fn timeout_maps_to_124() {
        let options = ProcessOptions::new("/bin/sleep")
            .args(["5"])
            .timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let response = run_process(&options).await;

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(response.exit_code, TIMEOUT_EXIT_CODE);
        assert!(response.error.contains("timed out"));
    }

    #[tokio::test]
    async fn timeout_kills_grandchildren_holding_pipes() {
        let options = ProcessOptions::new("/bin/sh")
            .args(["-c", "sleep 30 & wait"])
            .timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let response = run_process(&options).await;

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(response.exit_code, TIMEOUT_EXIT_CODE);
    }

    #[tokio::test]
    async fn exit_keeps_output_when_background_job_holds_pipes() {
        let options = ProcessOptions::new("/bin/sh").args(["-c", "echo hello; sleep 6 &"]);
        let started = std::time::Instant::now();
        let response = run_process(&options).await;

        assert!(started.elapsed() < DRAIN_GRACE);
        assert_eq!(response, CommandResponse::success("hello\n"));
    }

    #[tokio::test]
    async fn drain_grace_keeps_partial_output() {
        use tokio::io::AsyncWriteExt;

        let (reader, mut writer) = tokio::io::duplex(64);
        writer.write_all(b"partial").await.unwrap();
        let pending = spawn_capture(Some(reader), 1024);

        let captured = collect(pending).await;
        assert_eq!(captured.into_text(), "partial");
        drop(writer);
    }

    #[tokio::test]
    async fn spawn_failure_maps_to_1() {
        let response = run_process(&ProcessOptions::new("/nonexistent/binary")).await;

        assert!(!response.ok);
        assert_eq!(response.exit_code, SPAWN_FAILURE_EXIT_CODE);
        assert!(!response.error.is_empty());
    }

    #[tokio::test]
    async fn output_is_truncated_with_marker() {
        let options = ProcessOptions::new("/bin/sh")
            .args(["-c", "yes x | head -c 3000"])
            .max_output_bytes(1024);
        let response = run_process(&options).await;

        assert!(response.ok);
        assert!(response.stdout.ends_with(TRUNCATION_MARKER));
        assert_eq!(response.stdout.len(), 1024 + TRUNCATION_MARKER.len());
    }
}
