//! Skillbox worker — isolated child process for one candidate invocation.
//!
//! Spawned by the harness once per test case. Receives the candidate
//! source, arguments, and configuration over stdin, installs the resource
//! ceilings, executes the candidate in a V8 isolate with the restricted
//! namespace, and writes exactly one completion message to stdout.
//!
//! **Security**: runs with a cleared environment and no inherited state;
//! its only channel to the parent is the stdin/stdout pipe pair. Resource
//! ceilings are installed before any candidate code runs and cannot be
//! raised from inside.

use anyhow::{Context, Result};
use skillbox_sandbox::ipc::{read_message, write_message, ChildMessage, ParentMessage, RunFailure};
use skillbox_sandbox::runtime::run_candidate;
use tokio::io::{self, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Clean environment: remove all env vars for isolation
    let env_keys: Vec<String> = std::env::vars().map(|(k, _)| k).collect();
    for key in env_keys {
        std::env::remove_var(&key);
    }

    // Minimal logging to stderr (parent surfaces it under SKILLBOX_DEBUG)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let mut stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();

    let msg: ParentMessage = read_message(&mut stdin)
        .await
        .context("failed to read initial message from parent")?
        .context("parent closed stdin before sending Run")?;

    let ParentMessage::Run {
        source,
        args,
        config,
    } = msg;

    // Ceilings go on before any candidate code can run. A failure here is
    // reported through the channel rather than silently proceeding
    // unlimited.
    if let Err(e) = config.limits.apply() {
        let msg = ChildMessage::RunComplete {
            result: Err(RunFailure::Runtime {
                message: format!("failed to install resource limits: {e}"),
            }),
        };
        write_message(&mut stdout, &msg).await?;
        stdout.flush().await?;
        return Ok(());
    }

    // V8 isolates are !Send — run the invocation on a dedicated thread
    // with its own single-threaded runtime, and forward its messages.
    let (tx, mut rx) = mpsc::unbounded_channel::<ChildMessage>();

    let exec_tx = tx.clone();
    let exec_handle = std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                let _ = exec_tx.send(ChildMessage::RunComplete {
                    result: Err(RunFailure::Runtime {
                        message: format!("failed to create tokio runtime: {e}"),
                    }),
                });
                return;
            }
        };

        let result = rt.block_on(run_candidate(&config, &source, &args));

        let _ = exec_tx.send(ChildMessage::RunComplete { result });
    });
    drop(tx);

    // Forward messages until the one-shot completion has been written.
    while let Some(child_msg) = rx.recv().await {
        let is_complete = matches!(child_msg, ChildMessage::RunComplete { .. });
        write_message(&mut stdout, &child_msg)
            .await
            .context("failed to write message to parent")?;
        stdout.flush().await?;
        if is_complete {
            break;
        }
    }

    let _ = exec_handle.join();

    Ok(())
}
