//! Parent-side management of isolated worker processes.
//!
//! Spawns `skillbox-worker` once per test case with a cleared
//! environment, speaks the length-delimited JSON IPC protocol over
//! stdin/stdout, and classifies how the invocation resolved. The worker
//! is torn down unconditionally afterward — success, failure, or forced
//! kill — and never reused.

use std::path::PathBuf;
use std::time::Instant;

use serde_json::Value;
use tokio::io::BufReader;
use tokio::process::Command;

use crate::error::SandboxError;
use crate::harness::SandboxConfig;
use crate::ipc::{read_message_with_limit, write_message, ChildMessage, ParentMessage, RunFailure};
use crate::report::{OutcomeKind, TestOutcome};

/// What came back over the result channel before it closed.
enum WorkerReply {
    /// The worker reported completion.
    Complete(Result<Value, RunFailure>),
    /// The channel closed without a completion message.
    Eof,
}

/// Execute one candidate invocation in a fresh worker process.
///
/// Wall-clock accounting runs from spawn to resolution. Failure to spawn
/// the worker at all is an infrastructure fault and comes back as `Err`;
/// everything the candidate itself can cause resolves to a
/// [`TestOutcome`].
pub(crate) async fn run_test(
    config: &SandboxConfig,
    source: &str,
    args: Vec<Value>,
    expected: &Value,
) -> Result<TestOutcome, SandboxError> {
    let worker_bin = find_worker_binary()?;

    let mut child = Command::new(&worker_bin)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(if std::env::var("SKILLBOX_DEBUG").is_ok() {
            std::process::Stdio::inherit()
        } else {
            std::process::Stdio::null()
        })
        .env_clear()
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            SandboxError::Execution(anyhow::anyhow!(
                "failed to spawn worker at {}: {}",
                worker_bin.display(),
                e
            ))
        })?;

    let start = Instant::now();

    let mut child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| SandboxError::Execution(anyhow::anyhow!("no stdin on worker")))?;
    let child_stdout = child
        .stdout
        .take()
        .ok_or_else(|| SandboxError::Execution(anyhow::anyhow!("no stdout on worker")))?;
    let mut child_stdout = BufReader::new(child_stdout);

    let run_msg = ParentMessage::Run {
        source: source.to_string(),
        args,
        config: config.worker_config(),
    };
    // A write failure here means the worker died immediately; the read
    // loop below will hit EOF and the wait status classifies it.
    if let Err(e) = write_message(&mut child_stdin, &run_msg).await {
        tracing::debug!(error = %e, "failed to send Run message to worker");
    }

    let reply = tokio::time::timeout(
        config.timeout,
        await_reply(&mut child_stdout, config.max_ipc_message_size),
    )
    .await;

    let outcome = match reply {
        Err(_elapsed) => {
            // Wall-clock timeout: non-cooperative kill, then reap. Any
            // partial or late write on the channel is discarded.
            let _ = child.kill().await;
            let _ = child.wait().await;
            let time_ms = elapsed_ms(start);
            TestOutcome::failed(
                OutcomeKind::Timeout,
                format!("timed out after {}ms", config.timeout.as_millis()),
                time_ms,
            )
        }
        Ok(WorkerReply::Complete(result)) => {
            let _ = child.wait().await;
            let time_ms = elapsed_ms(start);
            match result {
                Ok(value) => {
                    if &value == expected {
                        TestOutcome::passed(value, expected.clone(), time_ms)
                    } else {
                        TestOutcome::mismatch(value, expected.clone(), time_ms)
                    }
                }
                Err(RunFailure::Runtime { message }) => {
                    TestOutcome::failed(OutcomeKind::RuntimeFailure, message, time_ms)
                }
                Err(failure @ RunFailure::MemoryExceeded) => {
                    TestOutcome::failed(OutcomeKind::ResourceExceeded, failure.to_string(), time_ms)
                }
                Err(failure @ RunFailure::OutputTooLarge { .. }) => {
                    TestOutcome::failed(OutcomeKind::ResourceExceeded, failure.to_string(), time_ms)
                }
            }
        }
        Ok(WorkerReply::Eof) => {
            // The worker died without reporting. The wait status tells us
            // whether the kernel enforced a resource ceiling.
            let status = child.wait().await.map_err(|e| {
                SandboxError::Execution(anyhow::anyhow!("failed to reap worker: {}", e))
            })?;
            let time_ms = elapsed_ms(start);
            classify_silent_exit(status, time_ms)
        }
    };

    Ok(outcome)
}

/// Read child messages until completion or channel EOF, re-emitting
/// candidate log lines as they arrive.
async fn await_reply(
    child_stdout: &mut BufReader<tokio::process::ChildStdout>,
    max_ipc_message_size: usize,
) -> WorkerReply {
    loop {
        let msg: Result<Option<ChildMessage>, _> =
            read_message_with_limit(child_stdout, max_ipc_message_size).await;
        match msg {
            Ok(Some(ChildMessage::RunComplete { result })) => {
                return WorkerReply::Complete(result);
            }
            Ok(Some(ChildMessage::Log { message })) => {
                tracing::info!(target: "skillbox::sandbox::worker", "{}", message);
            }
            Ok(None) => return WorkerReply::Eof,
            Err(e) => {
                tracing::debug!(error = %e, "IPC read error from worker");
                return WorkerReply::Eof;
            }
        }
    }
}

/// Classify a worker that exited without sending a result.
///
/// Signal termination means the kernel enforced a ceiling: `SIGXCPU` for
/// the CPU rlimit, or an abort after the address-space rlimit made V8's
/// own allocations fail. A clean but silent exit is a candidate-side
/// runtime failure.
#[cfg(unix)]
fn classify_silent_exit(status: std::process::ExitStatus, time_ms: f64) -> TestOutcome {
    use std::os::unix::process::ExitStatusExt;

    if let Some(sig) = status.signal() {
        let name = nix::sys::signal::Signal::try_from(sig)
            .map(|s| s.as_str())
            .unwrap_or("unknown signal");
        let detail = match name {
            "SIGXCPU" => "cpu time limit exceeded",
            _ => "memory limit exceeded",
        };
        return TestOutcome::failed(
            OutcomeKind::ResourceExceeded,
            format!("{detail} (worker terminated by {name})"),
            time_ms,
        );
    }

    TestOutcome::failed(
        OutcomeKind::RuntimeFailure,
        format!(
            "worker exited without reporting a result (status {})",
            status.code().unwrap_or(-1)
        ),
        time_ms,
    )
}

#[cfg(not(unix))]
fn classify_silent_exit(status: std::process::ExitStatus, time_ms: f64) -> TestOutcome {
    TestOutcome::failed(
        OutcomeKind::RuntimeFailure,
        format!(
            "worker exited without reporting a result (status {})",
            status.code().unwrap_or(-1)
        ),
        time_ms,
    )
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Find the `skillbox-worker` binary.
///
/// Search order:
/// 1. `SKILLBOX_WORKER_BIN` environment variable (must be absolute path)
/// 2. Same directory as the current executable
///
/// On Unix, rejects world-writable binaries (mode & 0o002 != 0).
pub(crate) fn find_worker_binary() -> Result<PathBuf, SandboxError> {
    if let Ok(path) = std::env::var("SKILLBOX_WORKER_BIN") {
        let p = PathBuf::from(&path);
        if !p.is_absolute() {
            return Err(SandboxError::Execution(anyhow::anyhow!(
                "SKILLBOX_WORKER_BIN must be an absolute path, got: {}",
                path
            )));
        }
        if p.exists() {
            validate_binary_permissions(&p)?;
            return Ok(p);
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let worker = dir.join("skillbox-worker");
            if worker.exists() {
                validate_binary_permissions(&worker)?;
                return Ok(worker);
            }
            // Test binaries live in target/debug/deps/ but the worker is
            // in target/debug/
            if let Some(parent) = dir.parent() {
                let worker = parent.join("skillbox-worker");
                if worker.exists() {
                    validate_binary_permissions(&worker)?;
                    return Ok(worker);
                }
            }
        }
    }

    Err(SandboxError::Execution(anyhow::anyhow!(
        "skillbox-worker binary not found. Set SKILLBOX_WORKER_BIN or install alongside skillbox"
    )))
}

/// Validate binary file permissions (Unix only).
///
/// Rejects world-writable binaries to prevent substitution attacks.
fn validate_binary_permissions(_path: &std::path::Path) -> Result<(), SandboxError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(_path).map_err(|e| {
            SandboxError::Execution(anyhow::anyhow!(
                "cannot read metadata for {}: {}",
                _path.display(),
                e
            ))
        })?;
        let mode = metadata.permissions().mode();
        if mode & 0o002 != 0 {
            return Err(SandboxError::Execution(anyhow::anyhow!(
                "insecure permissions on worker binary {}: mode {:o} is world-writable",
                _path.display(),
                mode,
            )));
        }
    }
    Ok(())
}
