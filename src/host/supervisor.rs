//! Proxy Supervisor
//!
//! Starts the backing proxy process exactly once, captures its combined
//! stdout/stderr into an [`OutputRing`], and resolves with an [`ExitReport`]
//! when the process is gone. There is no restart policy here: what happens
//! after the report is up to the caller.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use super::output_ring::OutputRing;

/// Supervisor errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// `run()` was called on a supervisor that already ran
    #[error("Proxy supervisor was already started")]
    AlreadyStarted,

    /// Construction parameters are unusable
    #[error("Invalid proxy configuration: {0}")]
    InvalidConfig(String),
}

/// What to launch and how much output to keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfig {
    /// Resolved path of the proxy executable
    pub executable: PathBuf,
    /// Arguments passed verbatim, in order
    pub args: Vec<String>,
    /// Number of output lines retained for the exit report
    pub line_limit: usize,
}

impl ProcessConfig {
    pub fn new(
        executable: impl Into<PathBuf>,
        args: Vec<String>,
        line_limit: usize,
    ) -> Result<Self, SupervisorError> {
        let executable = executable.into();
        if executable.as_os_str().is_empty() {
            return Err(SupervisorError::InvalidConfig(
                "executable path is empty".to_string(),
            ));
        }
        if line_limit == 0 {
            return Err(SupervisorError::InvalidConfig(
                "line limit must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            executable,
            args,
            line_limit,
        })
    }
}

/// Terminal outcome of one proxy run
///
/// At most one of `exit_code`/`signal` is set. Both are absent when the
/// process could not be spawned or its status could not be collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReport {
    #[serde(rename = "status")]
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    /// Most recent output lines joined by `\n`
    pub output: String,
}

impl ExitReport {
    fn from_status(status: Option<ExitStatus>, output: String) -> Self {
        Self {
            exit_code: status.and_then(|s| s.code()),
            signal: status.as_ref().and_then(signal_name),
            output,
        }
    }

    /// Exited on its own with status 0
    pub fn is_clean(&self) -> bool {
        self.exit_code == Some(0) && self.signal.is_none()
    }
}

/// Observable lifecycle of a supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Terminated,
}

enum Slot {
    Idle,
    Running { kill_tx: Option<oneshot::Sender<()>> },
    Terminated,
}

/// Owns the proxy child process for a single run
pub struct ProxySupervisor {
    config: ProcessConfig,
    output: Mutex<OutputRing>,
    slot: Mutex<Slot>,
}

impl ProxySupervisor {
    pub fn new(config: ProcessConfig) -> Result<Self, SupervisorError> {
        let output = OutputRing::new(config.line_limit)?;
        Ok(Self {
            config,
            output: Mutex::new(output),
            slot: Mutex::new(Slot::Idle),
        })
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        match *self.lock_slot() {
            Slot::Idle => SupervisorState::Idle,
            Slot::Running { .. } => SupervisorState::Running,
            Slot::Terminated => SupervisorState::Terminated,
        }
    }

    /// Launch the proxy and wait for it to terminate.
    ///
    /// Spawn failures are not errors: they resolve with a report carrying
    /// neither exit code nor signal. The only error is calling this twice.
    pub async fn run(&self) -> Result<ExitReport, SupervisorError> {
        let kill_rx = {
            let mut slot = self.lock_slot();
            if !matches!(*slot, Slot::Idle) {
                return Err(SupervisorError::AlreadyStarted);
            }
            let (kill_tx, kill_rx) = oneshot::channel();
            *slot = Slot::Running {
                kill_tx: Some(kill_tx),
            };
            kill_rx
        };

        let report = self.supervise(kill_rx).await;
        *self.lock_slot() = Slot::Terminated;

        tracing::info!(
            status = ?report.exit_code,
            signal = ?report.signal,
            "Proxy process terminated"
        );
        Ok(report)
    }

    /// Ask a running proxy to terminate.
    ///
    /// No-op when idle, already terminated, or already asked. The pending
    /// `run()` still resolves, with the report of the killed process.
    pub fn kill(&self) {
        let mut slot = self.lock_slot();
        if let Slot::Running { kill_tx } = &mut *slot {
            if let Some(tx) = kill_tx.take() {
                tracing::info!("Kill requested for proxy process");
                let _ = tx.send(());
            }
        }
    }

    async fn supervise(&self, mut kill_rx: oneshot::Receiver<()>) -> ExitReport {
        let mut cmd = Command::new(&self.config.executable);
        cmd.args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            executable = %self.config.executable.display(),
            args = ?self.config.args,
            "Spawning proxy process"
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    executable = %self.config.executable.display(),
                    error = %e,
                    "Failed to spawn proxy process"
                );
                return ExitReport::from_status(None, self.lock_output().joined());
            }
        };

        tracing::info!(pid = ?child.id(), "Proxy process started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Report only after both streams hit EOF and the exit was observed
        let (status, (), ()) = tokio::join!(
            wait_for_exit(&mut child, &mut kill_rx),
            pump_lines(stdout, "stdout", &self.output),
            pump_lines(stderr, "stderr", &self.output),
        );

        ExitReport::from_status(status, self.lock_output().joined())
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_output(&self) -> MutexGuard<'_, OutputRing> {
        self.output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn wait_for_exit(
    child: &mut Child,
    kill_rx: &mut oneshot::Receiver<()>,
) -> Option<ExitStatus> {
    tokio::select! {
        status = child.wait() => return collect_status(status),
        Ok(()) = kill_rx => request_termination(child),
    }

    collect_status(child.wait().await)
}

fn collect_status(status: std::io::Result<ExitStatus>) -> Option<ExitStatus> {
    match status {
        Ok(status) => Some(status),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to collect proxy exit status");
            None
        }
    }
}

/// Send the platform's default termination request
fn request_termination(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => return,
                Err(e) => tracing::warn!(pid, error = %e, "SIGTERM failed, falling back to kill"),
            }
        }
    }

    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "Failed to kill proxy process");
    }
}

/// Read one output stream line by line into the ring.
///
/// A trailing line without a terminator is still appended at EOF.
async fn pump_lines<R>(stream: Option<R>, name: &'static str, output: &Mutex<OutputRing>)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                tracing::debug!(target: "proxy", stream = name, "{}", line);
                output
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .append(line);
            }
            Err(e) => {
                tracing::warn!(stream = name, error = %e, "Proxy output stream failed");
                break;
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(unix)]
fn signal_name(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    let raw = status.signal()?;
    Some(match nix::sys::signal::Signal::try_from(raw) {
        Ok(signal) => signal.as_str().to_string(),
        Err(_) => raw.to_string(),
    })
}

#[cfg(not(unix))]
fn signal_name(_status: &ExitStatus) -> Option<String> {
    None
}
