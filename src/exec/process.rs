// src/exec/process.rs

//! Runs a single submission as a shell process.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RunEvent;
use crate::exec::pool::PoolSettings;
use crate::types::{ProcessError, Submission};

/// How long to keep reading output after the process has exited or been
/// killed. Grandchildren can hold the pipes open indefinitely.
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

/// Run one submission and report it to the runtime.
///
/// Sends `TaskStarted`, then `TaskFinished` with captured output, unless the
/// pool cancels the process first; cancelled processes are killed and report
/// nothing.
pub async fn run_process(
    submission: Submission,
    settings: &PoolSettings,
    runtime_tx: &mpsc::Sender<RunEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let id = submission.id;
    if runtime_tx.send(RunEvent::TaskStarted { id }).await.is_err() {
        debug!(feature = %id, "runtime gone; not starting process");
        return;
    }

    let finished = match run_inner(&submission, settings, cancel_rx).await {
        Ok(Some(finished)) => finished,
        Ok(None) => return,
        Err(err) => {
            warn!(feature = %id, error = %err, "process execution error");
            Finished {
                error: Some(ProcessError::other(format!("{err:#}"))),
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    };

    let event = RunEvent::TaskFinished {
        id,
        error: finished.error,
        stdout: finished.stdout,
        stderr: finished.stderr,
    };
    if runtime_tx.send(event).await.is_err() {
        debug!(feature = %id, "runtime gone; dropping finished event");
    }
}

struct Finished {
    error: Option<ProcessError>,
    stdout: String,
    stderr: String,
}

/// `Ok(None)` means the process was cancelled.
async fn run_inner(
    submission: &Submission,
    settings: &PoolSettings,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<Option<Finished>> {
    info!(feature = %submission.id, cmd = %submission.command, "starting process");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&submission.command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&submission.command);
        c
    };

    cmd.current_dir(&settings.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning `{}`", submission.command))?;

    let stdout = child.stdout.take().map(collect);
    let stderr = child.stderr.take().map(collect);

    let error = tokio::select! {
        waited = tokio::time::timeout(settings.timeout, child.wait()) => match waited {
            Ok(status) => {
                let status = status.context("waiting for process")?;
                info!(
                    feature = %submission.id,
                    exit_code = ?status.code(),
                    success = status.success(),
                    "process exited"
                );
                if status.success() {
                    None
                } else {
                    Some(match status.code() {
                        Some(code) => ProcessError::exit_code(code),
                        None => ProcessError::other("terminated by signal"),
                    })
                }
            }
            Err(_) => {
                info!(feature = %submission.id, timeout = ?settings.timeout, "process timed out; killing");
                kill(&mut child, submission).await;
                Some(ProcessError::killed())
            }
        },
        _ = &mut cancel_rx => {
            info!(feature = %submission.id, "cancellation requested; killing process");
            kill(&mut child, submission).await;
            return Ok(None);
        }
    };

    Ok(Some(Finished {
        error,
        stdout: output(stdout).await,
        stderr: output(stderr).await,
    }))
}

async fn kill(child: &mut tokio::process::Child, submission: &Submission) {
    if let Err(e) = child.kill().await {
        warn!(feature = %submission.id, error = %e, "failed to kill child process");
    }
}

fn collect<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf).await {
            debug!(error = %e, "output read interrupted");
        }
        buf
    })
}

async fn output(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(OUTPUT_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            debug!(error = %e, "output reader failed");
            String::new()
        }
        Err(_) => {
            handle.abort();
            debug!("output still open after grace period; discarding");
            String::new()
        }
    }
}
