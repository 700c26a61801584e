//! IPC protocol for parent ↔ worker communication.
//!
//! Uses length-delimited JSON messages: 4-byte big-endian length prefix +
//! JSON payload. All messages are typed via [`ParentMessage`] and
//! [`ChildMessage`] enums. The channel is one-shot in the result
//! direction: the worker writes at most one [`ChildMessage::RunComplete`]
//! and the parent reads at most one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::limits::ResourceLimits;

/// Default maximum IPC message size: 8 MB.
pub const DEFAULT_MAX_IPC_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

/// Messages sent from the parent process to the worker child.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParentMessage {
    /// The only parent message: run this candidate invocation.
    Run {
        /// The candidate function expression source text.
        source: String,
        /// Positional arguments for this test case.
        args: Vec<Value>,
        /// Worker configuration.
        config: WorkerConfig,
    },
}

/// Messages sent from the worker child to the parent process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChildMessage {
    /// The invocation has finished. Written at most once.
    RunComplete {
        /// The produced value, or a typed failure.
        result: Result<Value, RunFailure>,
    },
    /// A log line emitted by candidate code via the harness `log` hook.
    Log {
        /// The log message text.
        message: String,
    },
}

/// A candidate-side failure crossing the isolation boundary as a value.
///
/// Everything the candidate's code can cause — a thrown exception, a blown
/// heap ceiling, an oversized result — is represented here and shipped
/// over the result channel; it never crashes the channel itself. Only
/// OS-enforced limits may kill the worker outright, and the parent
/// classifies that from the wait status instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    /// Candidate code threw, or did not evaluate to a callable function.
    Runtime {
        /// The error description.
        message: String,
    },
    /// The isolate hit its heap ceiling and execution was terminated.
    MemoryExceeded,
    /// The serialized result exceeds the configured maximum size.
    OutputTooLarge {
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Runtime { message } => write!(f, "{message}"),
            Self::MemoryExceeded => write!(f, "memory limit exceeded"),
            Self::OutputTooLarge { max } => {
                write!(f, "result exceeds maximum size of {max} bytes")
            }
        }
    }
}

/// Configuration passed to the worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Resource ceilings installed before candidate code runs.
    pub limits: ResourceLimits,
    /// V8 heap ceiling in bytes.
    pub max_heap_size: usize,
    /// Maximum size of the serialized result in bytes.
    pub max_output_size: usize,
    /// Maximum IPC message size in bytes.
    #[serde(default = "default_max_ipc_message_size")]
    pub max_ipc_message_size: usize,
}

fn default_max_ipc_message_size() -> usize {
    DEFAULT_MAX_IPC_MESSAGE_SIZE
}

/// Write a length-delimited JSON message to an async writer.
///
/// Format: 4-byte big-endian length prefix followed by the JSON payload.
pub async fn write_message<T: Serialize, W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &T,
) -> Result<(), std::io::Error> {
    let payload = serde_json::to_vec(msg)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "IPC payload too large: {} bytes (max {} bytes)",
                payload.len(),
                u32::MAX
            ),
        )
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a length-delimited JSON message from an async reader.
///
/// Returns `None` if the reader has reached EOF (clean shutdown).
/// Uses [`DEFAULT_MAX_IPC_MESSAGE_SIZE`] as the size limit.
pub async fn read_message<T: for<'de> Deserialize<'de>, R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<T>, std::io::Error> {
    read_message_with_limit(reader, DEFAULT_MAX_IPC_MESSAGE_SIZE).await
}

/// Read a length-delimited JSON message with a configurable size limit.
pub async fn read_message_with_limit<T: for<'de> Deserialize<'de>, R: AsyncRead + Unpin>(
    reader: &mut R,
    max_size: usize,
) -> Result<Option<T>, std::io::Error> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_buf) as usize;

    if len > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("IPC message too large: {len} bytes (limit: {max_size} bytes)"),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    let msg: T = serde_json::from_slice(&payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(Some(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn worker_config() -> WorkerConfig {
        WorkerConfig {
            limits: ResourceLimits::default(),
            max_heap_size: 64 * 1024 * 1024,
            max_output_size: 1024 * 1024,
            max_ipc_message_size: DEFAULT_MAX_IPC_MESSAGE_SIZE,
        }
    }

    #[tokio::test]
    async fn roundtrip_run_message() {
        let msg = ParentMessage::Run {
            source: "(a, b) => a + b".into(),
            args: vec![serde_json::json!(1), serde_json::json!(2)],
            config: worker_config(),
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &msg).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: ParentMessage = read_message(&mut cursor).await.unwrap().unwrap();

        let ParentMessage::Run {
            source,
            args,
            config,
        } = decoded;
        assert_eq!(source, "(a, b) => a + b");
        assert_eq!(args.len(), 2);
        assert_eq!(config.limits.mem_limit_mb, 256);
    }

    #[tokio::test]
    async fn roundtrip_run_complete_ok() {
        let msg = ChildMessage::RunComplete {
            result: Ok(serde_json::json!(3)),
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &msg).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: ChildMessage = read_message(&mut cursor).await.unwrap().unwrap();

        match decoded {
            ChildMessage::RunComplete { result } => {
                assert_eq!(result.unwrap(), serde_json::json!(3));
            }
            other => panic!("expected RunComplete, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn roundtrip_run_complete_runtime_failure() {
        let msg = ChildMessage::RunComplete {
            result: Err(RunFailure::Runtime {
                message: "boom".into(),
            }),
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &msg).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: ChildMessage = read_message(&mut cursor).await.unwrap().unwrap();

        match decoded {
            ChildMessage::RunComplete { result } => {
                assert_eq!(
                    result.unwrap_err(),
                    RunFailure::Runtime {
                        message: "boom".into()
                    }
                );
            }
            other => panic!("expected RunComplete, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn roundtrip_memory_exceeded() {
        let msg = ChildMessage::RunComplete {
            result: Err(RunFailure::MemoryExceeded),
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &msg).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: ChildMessage = read_message(&mut cursor).await.unwrap().unwrap();

        match decoded {
            ChildMessage::RunComplete { result } => {
                assert_eq!(result.unwrap_err(), RunFailure::MemoryExceeded);
            }
            other => panic!("expected RunComplete, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_messages_in_stream() {
        let msg1 = ChildMessage::Log {
            message: "first".into(),
        };
        let msg2 = ChildMessage::RunComplete {
            result: Ok(serde_json::json!("done")),
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &msg1).await.unwrap();
        write_message(&mut buf, &msg2).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let d1: ChildMessage = read_message(&mut cursor).await.unwrap().unwrap();
        let d2: ChildMessage = read_message(&mut cursor).await.unwrap().unwrap();

        assert!(matches!(d1, ChildMessage::Log { .. }));
        assert!(matches!(d2, ChildMessage::RunComplete { .. }));

        // EOF after all messages
        let d3: Option<ChildMessage> = read_message(&mut cursor).await.unwrap();
        assert!(d3.is_none());
    }

    #[tokio::test]
    async fn eof_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let result: Option<ChildMessage> = read_message(&mut cursor).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn read_message_with_limit_rejects_oversized() {
        let msg = ChildMessage::Log {
            message: "x".repeat(1024),
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &msg).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let result: Result<Option<ChildMessage>, _> =
            read_message_with_limit(&mut cursor, 64).await;
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("too large"), "error: {err_msg}");
    }

    #[tokio::test]
    async fn worker_config_ipc_limit_serde_default() {
        // Deserializing JSON without max_ipc_message_size uses the default
        let json = r#"{
            "limits": {"mem_limit_mb": 256, "cpu_limit_s": 1},
            "max_heap_size": 67108864,
            "max_output_size": 1048576
        }"#;
        let config: WorkerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_ipc_message_size, DEFAULT_MAX_IPC_MESSAGE_SIZE);
    }
}
