/// Process Supervisor
///
/// Runs one compile or run step as a child process and reports how it ended.
/// The supervisor is language-agnostic: it only sees a command, input bytes,
/// a deadline and an optional memory ceiling.
///
/// **Guarantees:**
/// - stdin is written and closed, stdout/stderr are drained concurrently
/// - the deadline is enforced with `tokio::time::timeout`; on expiry the
///   child is killed and reaped, and the result is `TimedOut`
/// - the child leads its own session; the whole process group is killed once
///   the child is reaped, on deadline expiry, and when a cancelled run is
///   dropped, so nothing the submission forked outlives the run
/// - spawn errors come back as `LaunchFailed` results, never as panics

use crate::adapter::ProcessSpec;
use async_trait::async_trait;
use gavel_common::types::Termination;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Environment variables a judged process may see
const FORWARDED_ENV: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "TZ", "SYSTEMROOT", "TEMP", "TMP"];

/// How long to keep draining pipes after the child is gone
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

const SIGKILL: i32 = 9;

/// Windows status codes seen when a process dies under an artificially small
/// address space
#[cfg(windows)]
const WINDOWS_MEMORY_CODES: &[i32] = &[
    0xC00000FDu32 as i32, // STATUS_STACK_OVERFLOW
    0xC0000005u32 as i32, // STATUS_ACCESS_VIOLATION
    0xC0000017u32 as i32, // STATUS_NO_MEMORY
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub timeout_ms: u64,
    /// Only honoured when the command asks for external limiting
    pub memory_limit_mb: Option<u64>,
}

/// Outcome of one supervised process, consumed immediately by the judge
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub elapsed_ms: u64,
    pub termination: Termination,
}

impl ExecutionResult {
    pub fn launch_failed(message: String, elapsed_ms: u64) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: message.into_bytes(),
            exit_code: None,
            signal: None,
            elapsed_ms,
            termination: Termination::LaunchFailed,
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Exit code 0 within the deadline, whatever was printed to stderr
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == Some(0)
            && self.signal.is_none()
            && matches!(self.termination, Termination::Success | Termination::Failed)
    }
}

#[async_trait]
pub trait Supervisor: Send + Sync {
    async fn run(&self, spec: &ProcessSpec, stdin: &[u8], limits: RunLimits) -> ExecutionResult;
}

/// Supervisor backed by local child processes
#[derive(Debug, Clone)]
pub struct LocalSupervisor {
    max_output_bytes: usize,
}

impl LocalSupervisor {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }
}

impl Default for LocalSupervisor {
    fn default() -> Self {
        Self::new(16 * 1024 * 1024)
    }
}

#[async_trait]
impl Supervisor for LocalSupervisor {
    #[instrument(skip(self, spec, stdin), fields(program = %spec.program, timeout_ms = limits.timeout_ms))]
    async fn run(&self, spec: &ProcessSpec, stdin: &[u8], limits: RunLimits) -> ExecutionResult {
        let start = Instant::now();

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .envs(FORWARDED_ENV.iter().filter_map(|k| std::env::var(k).ok().map(|v| (*k, v))))
            .kill_on_drop(true);

        let memory_limit_mb = limits.memory_limit_mb.filter(|_| spec.external_memory_limit);
        isolate_child(&mut command, memory_limit_mb);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %spec.program, error = %e, "Failed to launch process");
                return ExecutionResult::launch_failed(
                    format!("failed to launch {}: {}", spec.program, e),
                    start.elapsed().as_millis() as u64,
                );
            }
        };
        let mut group = ProcessGroup::new(child.id());

        let stdin_task = child.stdin.take().map(|mut pipe| {
            let data = with_trailing_newline(stdin);
            tokio::spawn(async move {
                // A child that exits without reading its input closes the
                // pipe under us; that is not an error of the run
                let _ = pipe.write_all(&data).await;
                let _ = pipe.shutdown().await;
            })
        });
        let stdout_task = child.stdout.take().map(|pipe| tokio::spawn(capture(pipe, self.max_output_bytes)));
        let stderr_task = child.stderr.take().map(|pipe| tokio::spawn(capture(pipe, self.max_output_bytes)));

        let deadline = Duration::from_millis(limits.timeout_ms);
        let (status, timed_out, wait_error) = match tokio::time::timeout(deadline, child.wait()).await {
            Ok(Ok(status)) => (Some(status), false, None),
            Ok(Err(e)) => {
                group.kill();
                let _ = child.start_kill();
                let _ = child.wait().await;
                (None, false, Some(e))
            }
            Err(_) => {
                debug!(timeout_ms = limits.timeout_ms, "Deadline reached, killing process group");
                group.kill();
                let _ = child.start_kill();
                (child.wait().await.ok(), true, None)
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        // Leftover descendants would otherwise hold the output pipes open
        group.kill();

        if let Some(task) = stdin_task {
            task.abort();
        }
        let (stdout, mut stderr) = tokio::join!(collect(stdout_task), collect(stderr_task));

        if let Some(e) = wait_error {
            stderr.extend_from_slice(format!("\n[failed to wait for process: {}]", e).as_bytes());
        }

        let (exit_code, signal) = status.map(exit_parts).unwrap_or((None, None));
        let termination = if timed_out {
            Termination::TimedOut
        } else {
            classify(exit_code, signal, &stderr)
        };

        debug!(
            elapsed_ms = elapsed_ms,
            exit_code = ?exit_code,
            signal = ?signal,
            termination = ?termination,
            "Process finished"
        );

        ExecutionResult {
            stdout,
            stderr,
            exit_code,
            signal,
            elapsed_ms,
            termination,
        }
    }
}

/// Map an exit to a termination class.
///
/// A zero exit with anything on stderr is still a failure: a program that
/// writes diagnostics while "succeeding" is treated as faulty.
pub fn classify(exit_code: Option<i32>, signal: Option<i32>, stderr: &[u8]) -> Termination {
    if is_memory_kill(exit_code, signal) {
        return Termination::MemoryExceeded;
    }
    match (exit_code, signal) {
        (Some(0), None) if stderr.is_empty() => Termination::Success,
        _ => Termination::Failed,
    }
}

/// Kill signatures of an externally imposed memory cap
fn is_memory_kill(exit_code: Option<i32>, signal: Option<i32>) -> bool {
    if signal == Some(SIGKILL) {
        return true;
    }
    #[cfg(windows)]
    if let Some(code) = exit_code {
        return WINDOWS_MEMORY_CODES.contains(&code);
    }
    let _ = exit_code;
    false
}

fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        (status.code(), status.signal())
    }
    #[cfg(not(unix))]
    {
        (status.code(), None)
    }
}

/// Many judged programs block on a final read that never sees a newline
fn with_trailing_newline(input: &[u8]) -> Vec<u8> {
    let mut data = input.to_vec();
    if data.last() != Some(&b'\n') {
        data.push(b'\n');
    }
    data
}

async fn capture<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = (&mut reader).take(limit as u64).read_to_end(&mut buf).await;
    // Keep draining so the child never blocks on a full pipe
    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
    buf
}

async fn collect(task: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    let Some(mut task) = task else {
        return Vec::new();
    };
    match tokio::time::timeout(OUTPUT_GRACE, &mut task).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(e)) => {
            warn!(error = %e, "Output capture task failed");
            Vec::new()
        }
        Err(_) => {
            // A grandchild still holds the pipe open
            task.abort();
            Vec::new()
        }
    }
}

/// Owns the child's process group. Killing is idempotent, and dropping the
/// guard kills whatever is still alive in the group.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { pgid: leader }
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // ESRCH just means every member is already gone
    if let Err(e) = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        if e != nix::errno::Errno::ESRCH {
            warn!(pgid = pgid, error = %e, "Failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Make the child a session leader and, on Linux, cap its address space.
/// Elsewhere the adapter's OOM signatures and heap flags carry the memory
/// budget.
#[cfg(unix)]
fn isolate_child(command: &mut Command, memory_limit_mb: Option<u64>) {
    let address_space = memory_limit_mb.map(|mb| mb.saturating_mul(1024 * 1024));
    #[cfg(not(target_os = "linux"))]
    let _ = address_space;

    // SAFETY: the closure runs between fork and exec and only calls setsid
    // and setrlimit, which are async-signal-safe.
    unsafe {
        command.pre_exec(move || {
            nix::unistd::setsid()?;
            #[cfg(target_os = "linux")]
            if let Some(bytes) = address_space {
                use rlimit::{setrlimit, Resource};
                setrlimit(Resource::AS, bytes, bytes)?;
                setrlimit(Resource::CORE, 0, 0)?;
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn isolate_child(_command: &mut Command, _memory_limit_mb: Option<u64>) {}
