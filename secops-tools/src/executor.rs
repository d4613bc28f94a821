//! Bounded subprocess execution.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::command::ResolvedCommand;
use crate::error::ToolError;
use crate::sandbox::ResourceLimits;

const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024; // 4MB per stream
const DRAIN_GRACE: Duration = Duration::from_secs(2);
const READ_CHUNK: usize = 8192;

/// Raw capture of one process run. A non-zero exit is data, not a fault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `None` when the process timed out or died from a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
    pub truncated: bool,
}

/// Runs a resolved command. The dispatcher only sees this trait, so tests
/// can substitute a recording executor.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn execute(&self, command: &ResolvedCommand) -> Result<ExecutionResult, ToolError>;
}

/// Spawns real processes in their own session.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    max_output_bytes: usize,
    limits: ResourceLimits,
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            limits: ResourceLimits::default(),
        }
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Resolves a bare name against PATH; explicit paths must exist.
    pub fn locate(binary: &str) -> Result<PathBuf, ToolError> {
        let not_found = |detail: String| ToolError::BinaryNotFound {
            binary: binary.to_string(),
            detail,
        };

        if binary.contains('/') {
            let path = Path::new(binary);
            return if path.is_file() {
                Ok(path.to_path_buf())
            } else {
                Err(not_found(format!("{} does not exist", binary)))
            };
        }

        which::which(binary).map_err(|e| not_found(e.to_string()))
    }

    fn command(&self, program: &Path, resolved: &ResolvedCommand) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(resolved.args())
            .stdin(if resolved.stdin_payload.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // New session, so the whole tree can be signalled through one pgid.
        #[cfg(unix)]
        {
            let limits = self.limits;
            unsafe {
                cmd.pre_exec(move || {
                    libc::setsid();
                    limits.apply()
                });
            }
        }

        cmd
    }
}

#[async_trait]
impl ProcessExecutor for SystemExecutor {
    async fn execute(&self, resolved: &ResolvedCommand) -> Result<ExecutionResult, ToolError> {
        let program = Self::locate(resolved.program())?;
        let started = Instant::now();
        let deadline = started + resolved.timeout;

        let mut child = self.command(&program, resolved).spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => ToolError::BinaryNotFound {
                binary: resolved.program().to_string(),
                detail: e.to_string(),
            },
            _ => ToolError::ExecutionFailed(format!("spawn {}: {}", resolved.program(), e)),
        })?;
        let mut group = ProcessGroup::new(child.id());
        info!("Spawned {} (pid {:?})", resolved.program(), child.id());

        if let (Some(payload), Some(mut stdin)) = (resolved.stdin_payload.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                // Tools that never read stdin close it early; a broken pipe is expected then.
                if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                    debug!("stdin write ended early: {}", e);
                }
                let _ = stdin.shutdown().await;
            });
        }

        let cap = self.max_output_bytes;
        let mut stdout_task = spawn_capture(child.stdout.take(), cap);
        let mut stderr_task = spawn_capture(child.stderr.take(), cap);

        let (exit_code, timed_out) = match timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => {
                group.terminate();
                return Err(ToolError::ExecutionFailed(format!("wait {}: {}", resolved.program(), e)));
            }
            Err(_) => {
                warn!(
                    "{} exceeded {}s, terminating process group",
                    resolved.program(),
                    resolved.timeout.as_secs()
                );
                group.terminate();
                let _ = child.kill().await;
                (None, true)
            }
        };

        // Background children can hold the pipes open past the leader's exit.
        let drain_deadline = if timed_out {
            Instant::now() + DRAIN_GRACE
        } else {
            deadline.max(Instant::now() + DRAIN_GRACE)
        };
        let stdout = collect(&mut stdout_task, drain_deadline, &mut group).await;
        let stderr = collect(&mut stderr_task, drain_deadline, &mut group).await;
        group.disarm();

        let duration = started.elapsed();
        info!(
            "{} finished in {}ms (exit {:?}, timed_out {})",
            resolved.program(),
            duration.as_millis(),
            exit_code,
            timed_out
        );

        Ok(ExecutionResult {
            exit_code,
            truncated: stdout.dropped > 0 || stderr.dropped > 0,
            stdout: stdout.into_string(),
            stderr: stderr.into_string(),
            duration,
            timed_out,
        })
    }
}

/// Bytes kept from one stream plus the count of bytes past the cap.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    dropped: usize,
}

impl Captured {
    fn into_string(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!("\n[output truncated: {} bytes omitted]", self.dropped));
        }
        text
    }
}

/// Reads to EOF, keeping at most `cap` bytes. The pipe is drained past the
/// cap so a chatty child never blocks on a full pipe.
async fn read_bounded<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> io::Result<Captured> {
    let mut captured = Captured::default();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(captured.bytes.len());
        let keep = room.min(n);
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.dropped += n - keep;
    }
    Ok(captured)
}

fn spawn_capture<R>(reader: Option<R>, cap: usize) -> JoinHandle<io::Result<Captured>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match reader {
            Some(reader) => read_bounded(reader, cap).await,
            None => Ok(Captured::default()),
        }
    })
}

async fn collect(
    task: &mut JoinHandle<io::Result<Captured>>,
    deadline: Instant,
    group: &mut ProcessGroup,
) -> Captured {
    let joined = match timeout_at(deadline, &mut *task).await {
        Ok(joined) => joined,
        Err(_) => {
            group.terminate();
            match timeout(DRAIN_GRACE, &mut *task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Captured::default();
                }
            }
        }
    };
    match joined {
        Ok(Ok(captured)) => captured,
        Ok(Err(e)) => {
            warn!("output capture failed: {}", e);
            Captured::default()
        }
        Err(e) => {
            warn!("output capture task failed: {}", e);
            Captured::default()
        }
    }
}

/// Session/process-group handle. Signals the whole group on terminate and,
/// unless disarmed, on drop: a cancelled invocation leaves no orphans.
struct ProcessGroup {
    pgid: Option<i32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|p| i32::try_from(p).ok()),
        }
    }

    fn terminate(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            // SAFETY: killpg only sends a signal; ESRCH for a vanished group is harmless.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.terminate();
    }
}
