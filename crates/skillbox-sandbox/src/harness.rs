//! The test harness — the only entry point for evaluating a candidate.
//!
//! Validates the candidate's source exactly once, then runs every test
//! case strictly sequentially, each in its own fresh worker process, and
//! aggregates the outcomes into a [`SkillReport`]. A failing or
//! timing-out test never halts the batch; a static-gate rejection aborts
//! the whole run before any worker is spawned and no report is produced.

use std::time::{Duration, Instant};

use crate::ast_gate;
use crate::error::SandboxError;
use crate::host;
use crate::ipc::{WorkerConfig, DEFAULT_MAX_IPC_MESSAGE_SIZE};
use crate::limits::ResourceLimits;
use crate::report::{SkillReport, TestCase};
use crate::validator;

/// Configuration for a harness run.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Per-test wall-clock timeout.
    pub timeout: Duration,
    /// Resource ceilings installed in each worker (address space, CPU).
    pub limits: ResourceLimits,
    /// V8 heap ceiling in bytes.
    pub max_heap_size: usize,
    /// Maximum candidate source size in bytes.
    pub max_code_size: usize,
    /// Maximum serialized result size in bytes.
    pub max_output_size: usize,
    /// Maximum IPC message size in bytes.
    pub max_ipc_message_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            limits: ResourceLimits::default(),
            max_heap_size: 64 * 1024 * 1024,  // 64 MB
            max_code_size: 64 * 1024,         // 64 KB
            max_output_size: 1024 * 1024,     // 1 MB
            max_ipc_message_size: DEFAULT_MAX_IPC_MESSAGE_SIZE,
        }
    }
}

impl SandboxConfig {
    /// A config with the given per-test timeout and default limits.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// The slice of this config shipped to each worker.
    ///
    /// The heap ceiling is clamped to the memory limit so a tight
    /// `mem_limit_mb` always binds before the default heap size.
    pub(crate) fn worker_config(&self) -> WorkerConfig {
        let mem_limit_bytes = self.limits.mem_limit_bytes();
        WorkerConfig {
            limits: self.limits,
            max_heap_size: self.max_heap_size.min(mem_limit_bytes as usize),
            max_output_size: self.max_output_size,
            max_ipc_message_size: self.max_ipc_message_size,
        }
    }
}

/// Evaluates untrusted candidate functions against test batteries.
pub struct SkillHarness {
    config: SandboxConfig,
}

impl SkillHarness {
    /// Create a harness with the given configuration.
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Evaluate a candidate against a battery of test cases.
    ///
    /// The static gate runs exactly once, before anything executes; on
    /// rejection this returns [`SandboxError::Rejected`] and zero workers
    /// are spawned. Otherwise every test case runs in input order, one
    /// fresh worker each, and the report always contains exactly one
    /// outcome per test case. Overall `passed` is the logical AND over
    /// the per-test flags; total time spans the whole batch.
    pub async fn evaluate(
        &self,
        source: &str,
        tests: &[TestCase],
    ) -> Result<SkillReport, SandboxError> {
        validator::check_source(source, self.config.max_code_size)?;
        ast_gate::validate(source)?;

        tracing::debug!(
            code_len = source.len(),
            test_count = tests.len(),
            "candidate accepted by static gate"
        );

        let batch_start = Instant::now();
        let mut results = Vec::with_capacity(tests.len());

        for (index, test) in tests.iter().enumerate() {
            let outcome = host::run_test(
                &self.config,
                source,
                test.normalized_args(),
                &test.expected,
            )
            .await?;

            tracing::debug!(
                test = index,
                outcome = ?outcome.outcome,
                time_ms = outcome.time_ms,
                "test resolved"
            );
            results.push(outcome);
        }

        let passed = results.iter().all(|r| r.passed);
        Ok(SkillReport {
            passed,
            time_ms: batch_start.elapsed().as_secs_f64() * 1000.0,
            results,
        })
    }
}
