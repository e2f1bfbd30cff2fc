//! Process spawning and output capture for interpreters
//!
//! On Unix each interpreter leads its own process group. Whatever is left of
//! that group is killed once the interpreter exits or its time runs out, so
//! background processes cannot outlive the run or hold its pipes open.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::runner::command::InterpreterCommand;

/// How long to keep draining pipes once the interpreter is gone.
/// Processes outside its group may still hold the pipes open.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Errors that prevent an interpreter run from producing an outcome
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty interpreter command")]
    EmptyCommand,

    #[error("failed to spawn interpreter: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to wait for interpreter: {0}")]
    Wait(#[source] std::io::Error),
}

/// Output of one interpreter run
#[derive(Debug)]
pub struct ProcessOutput {
    /// Exit status, `None` if the process was killed after the timeout
    pub status: Option<ExitStatus>,

    /// Whether the wall time limit expired
    pub timed_out: bool,

    /// Captured stdout, truncated to the capture limit
    pub stdout: Vec<u8>,

    /// Captured stderr, truncated to the capture limit
    pub stderr: Vec<u8>,

    /// Time from spawn until the process was reaped
    pub wall_time: Duration,
}

/// Spawn an interpreter and wait for it to exit
///
/// Waits at most `timeout` when given; on expiry the process group is killed
/// and the interpreter reaped before returning. Both output streams are
/// drained concurrently so the child never blocks on a full pipe; at most
/// `capture_limit` bytes of each are kept. After the interpreter is gone the
/// streams are drained for at most one more second.
///
/// # Errors
///
/// Returns [`ProcessError`] if the process could not be spawned or waited on.
#[instrument(skip(command), fields(command = %command.display()))]
pub async fn run_interpreter(
    command: &InterpreterCommand,
    timeout: Option<Duration>,
    capture_limit: usize,
) -> Result<ProcessOutput, ProcessError> {
    let program = command.program().ok_or(ProcessError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(command.args())
        .envs(command.environment().iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;

    let start = Instant::now();
    let pid = child.id();
    debug!(?pid, "interpreter spawned");

    let stdout_task = tokio::spawn(drain(child.stdout.take(), capture_limit));
    let stderr_task = tokio::spawn(drain(child.stderr.take(), capture_limit));

    let waited = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };

    let (status, timed_out) = match waited {
        Some(Ok(status)) => {
            // Stragglers left in the group would keep the pipes open
            kill_group(pid);
            (Some(status), false)
        }
        Some(Err(e)) => {
            warn!(error = %e, "lost track of interpreter, killing");
            terminate(&mut child, pid).await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(ProcessError::Wait(e));
        }
        None => {
            warn!(?timeout, "interpreter exceeded wall time, killing");
            terminate(&mut child, pid).await;
            (None, true)
        }
    };
    let wall_time = start.elapsed();

    let (stdout, stderr) = tokio::join!(collect(stdout_task), collect(stderr_task));

    debug!(
        ?status,
        timed_out,
        wall_time = format_args!("{:.3}s", wall_time.as_secs_f64()),
        stdout_len = stdout.len(),
        stderr_len = stderr.len(),
        "interpreter finished"
    );

    Ok(ProcessOutput {
        status,
        timed_out,
        stdout,
        stderr,
        wall_time,
    })
}

/// Kill the interpreter's process group, then kill and reap the interpreter
async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill interpreter");
    }
}

/// Send SIGKILL to every process in the group led by `pid`
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pgid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "killed interpreter process group"),
        // Group already empty
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "failed to kill interpreter process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Read a stream to EOF, keeping the first `limit` bytes
async fn drain<R>(reader: Option<R>, limit: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let Some(mut reader) = reader else {
        return captured;
    };

    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(captured.len());
                captured.extend_from_slice(&buf[..n.min(room)]);
            }
            Err(e) => {
                debug!(error = %e, "stopped reading interpreter output");
                break;
            }
        }
    }
    captured
}

async fn collect(task: JoinHandle<Vec<u8>>) -> Vec<u8> {
    let abort = task.abort_handle();
    match tokio::time::timeout(DRAIN_GRACE, task).await {
        Ok(joined) => joined.unwrap_or_else(|e| {
            warn!(error = %e, "output reader task failed");
            Vec::new()
        }),
        Err(_) => {
            warn!("interpreter output still open after exit, abandoning it");
            abort.abort();
            Vec::new()
        }
    }
}
