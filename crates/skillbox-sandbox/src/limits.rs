//! Resource ceilings applied inside the worker before candidate code runs.
//!
//! Both limits are set as simultaneous soft/hard rlimits, so the running
//! code cannot raise or remove them. Exceeding `RLIMIT_AS` makes further
//! allocation fail inside the worker; exceeding `RLIMIT_CPU` makes the
//! kernel terminate the worker with `SIGXCPU`, which the parent
//! classifies as a resource violation distinct from a wall-clock timeout.
//!
//! V8 reserves large virtual regions up front (pointer-compression cage,
//! code range) that never become resident, so the address-space rlimit is
//! installed as `mem_limit + ADDRESS_SPACE_ALLOWANCE` to leave room for
//! those fixed reservations. The precise memory ceiling candidate code
//! observes is the isolate heap limit, which is clamped to
//! `mem_limit_mb`; the rlimit is the hard backstop behind it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default address-space ceiling in MiB.
pub const DEFAULT_MEM_LIMIT_MB: u64 = 256;

/// Default CPU-time ceiling in seconds.
pub const DEFAULT_CPU_LIMIT_S: u64 = 1;

/// Fixed allowance on top of `mem_limit` for V8's up-front virtual
/// reservations. Reserved, never resident; candidate allocations are
/// bounded by the heap ceiling well before this.
pub const ADDRESS_SPACE_ALLOWANCE: u64 = 8 * 1024 * 1024 * 1024;

/// Hard ceilings for one worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Virtual address-space ceiling in MiB (`RLIMIT_AS`).
    pub mem_limit_mb: u64,
    /// CPU-time ceiling in seconds (`RLIMIT_CPU`).
    pub cpu_limit_s: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            mem_limit_mb: DEFAULT_MEM_LIMIT_MB,
            cpu_limit_s: DEFAULT_CPU_LIMIT_S,
        }
    }
}

/// Failure to install an rlimit.
#[derive(Debug, Error)]
#[error("failed to set {resource}: {errno}")]
pub struct LimitError {
    /// The rlimit that could not be set.
    pub resource: &'static str,
    /// The OS error.
    pub errno: String,
}

impl ResourceLimits {
    /// Address-space ceiling in bytes.
    pub fn mem_limit_bytes(&self) -> u64 {
        self.mem_limit_mb * 1024 * 1024
    }

    /// Install both ceilings on the calling process, soft == hard.
    ///
    /// Must run in the worker before any candidate code executes.
    #[cfg(unix)]
    pub fn apply(&self) -> Result<(), LimitError> {
        use nix::sys::resource::{setrlimit, Resource};

        let bytes = self.mem_limit_bytes() + ADDRESS_SPACE_ALLOWANCE;
        setrlimit(Resource::RLIMIT_AS, bytes, bytes).map_err(|e| LimitError {
            resource: "RLIMIT_AS",
            errno: e.to_string(),
        })?;

        setrlimit(Resource::RLIMIT_CPU, self.cpu_limit_s, self.cpu_limit_s).map_err(|e| {
            LimitError {
                resource: "RLIMIT_CPU",
                errno: e.to_string(),
            }
        })?;

        Ok(())
    }

    /// No rlimit support off Unix; the V8 heap ceiling still applies.
    #[cfg(not(unix))]
    pub fn apply(&self) -> Result<(), LimitError> {
        tracing::warn!("rlimits unsupported on this platform; relying on heap ceiling only");
        Ok(())
    }
}
