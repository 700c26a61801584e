#![warn(missing_docs)]

//! # skillbox-sandbox
//!
//! Grades untrusted candidate functions against test batteries without
//! letting them touch the host.
//!
//! A candidate is a JavaScript function expression supplied as source
//! text. [`SkillHarness::evaluate`] first runs a static gate over the
//! parsed source (rejecting `with` blocks, import machinery, and calls to
//! `open` / `eval` / `require` / the `Function` constructors), then runs
//! each test case in its own short-lived worker process hosting a V8
//! isolate, and aggregates a [`SkillReport`].
//!
//! ## Security model
//!
//! - **Static gate first**: denylisted constructs are refused before any
//!   execution context exists. The gate is syntactic and inspects only
//!   the candidate's own source — a forbidden construct hidden behind a
//!   reference resolved at run time is not seen here; it is contained by
//!   the layers below instead.
//! - **Fresh process per test**: one worker per test case, spawned with a
//!   cleared environment and torn down unconditionally. No state survives
//!   from one test to the next.
//! - **Enumerated namespace**: candidate code sees exactly the
//!   [`PERMITTED_PRIMITIVES`] — inert intrinsics plus a handful of
//!   helpers. Every other global is deleted before candidate code runs;
//!   there is no filesystem, network, module loader, or host reflection
//!   to take away.
//! - **Hard resource ceilings**: `RLIMIT_AS` (default 256 MiB) and
//!   `RLIMIT_CPU` (default 1 s) are installed soft == hard inside the
//!   worker, with a V8 heap ceiling in front of them for graceful
//!   memory-failure reporting.
//! - **One-shot result channel**: the only data shared between worker and
//!   parent is a typed completion message, written at most once and read
//!   at most once. On wall-clock timeout the parent kills the worker
//!   non-cooperatively and discards any partial write.
//!
//! Out of scope: syscall filtering, network namespaces, concurrent
//! evaluation of multiple candidates, and persistence of results.
//!
//! ## Example
//!
//! ```no_run
//! use skillbox_sandbox::{SandboxConfig, SkillHarness, TestCase};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), skillbox_sandbox::SandboxError> {
//! let harness = SkillHarness::new(SandboxConfig::with_timeout(Duration::from_millis(500)));
//! let tests = vec![
//!     TestCase::new(serde_json::json!([1, 2]), serde_json::json!(3)),
//!     TestCase::new(serde_json::json!([2, 2]), serde_json::json!(4)),
//! ];
//! let report = harness.evaluate("(a, b) => a + b", &tests).await?;
//! assert!(report.passed);
//! # Ok(())
//! # }
//! ```

pub mod ast_gate;
pub mod error;
pub mod harness;
mod host;
pub mod ipc;
pub mod limits;
mod ops;
pub mod primitives;
pub mod report;
pub mod runtime;
pub mod validator;

pub use error::SandboxError;
pub use harness::{SandboxConfig, SkillHarness};
pub use limits::ResourceLimits;
pub use primitives::PERMITTED_PRIMITIVES;
pub use report::{OutcomeKind, SkillReport, TestCase, TestOutcome};
pub use skillbox_error::Violation;
