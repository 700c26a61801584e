#![warn(missing_docs)]

//! # skillbox-config
//!
//! Configuration loading for the skillbox evaluation sandbox.
//!
//! Supports TOML configuration files with environment variable expansion.
//!
//! ## Example
//!
//! ```toml
//! [sandbox]
//! timeout_ms = 2000
//! mem_limit_mb = 256
//! cpu_limit_s = 1
//! max_heap_mb = 64
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors from config parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level skillbox configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillboxConfig {
    /// Sandbox execution settings.
    #[serde(default)]
    pub sandbox: SandboxOverrides,
}

/// Sandbox configuration overrides.
///
/// Every field is optional; unset fields fall back to the sandbox
/// defaults (256 MiB address space, 1 s CPU, 64 MiB V8 heap).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SandboxOverrides {
    /// Per-test wall-clock timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Address-space ceiling per worker in megabytes (RLIMIT_AS).
    #[serde(default)]
    pub mem_limit_mb: Option<u64>,

    /// CPU-time ceiling per worker in seconds (RLIMIT_CPU).
    #[serde(default)]
    pub cpu_limit_s: Option<u64>,

    /// Maximum V8 heap size in megabytes.
    #[serde(default)]
    pub max_heap_mb: Option<usize>,

    /// Maximum candidate source size in kilobytes.
    #[serde(default)]
    pub max_code_size_kb: Option<usize>,

    /// Maximum serialized result size in kilobytes.
    #[serde(default)]
    pub max_output_size_kb: Option<usize>,

    /// Maximum IPC message size in megabytes.
    #[serde(default)]
    pub max_ipc_message_size_mb: Option<usize>,
}

impl SkillboxConfig {
    /// Parse a config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: SkillboxConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string, expanding `${ENV_VAR}` references.
    pub fn from_toml_with_env(toml_str: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(toml_str);
        Self::from_toml(&expanded)
    }

    /// Load config from a file path, expanding environment variables.
    pub fn from_file_with_env(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_with_env(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(0) = self.sandbox.timeout_ms {
            return Err(ConfigError::Invalid("timeout_ms must be non-zero".into()));
        }
        if let Some(0) = self.sandbox.mem_limit_mb {
            return Err(ConfigError::Invalid("mem_limit_mb must be non-zero".into()));
        }
        if let Some(0) = self.sandbox.cpu_limit_s {
            return Err(ConfigError::Invalid("cpu_limit_s must be non-zero".into()));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns in a string using environment variables.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(value) => result.push_str(&value),
                Err(_) => {
                    // Leave the placeholder if env var not found
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses_sandbox_overrides() {
        let toml = r#"
            [sandbox]
            timeout_ms = 2000
            mem_limit_mb = 128
            cpu_limit_s = 2
            max_heap_mb = 32
        "#;

        let config = SkillboxConfig::from_toml(toml).unwrap();
        assert_eq!(config.sandbox.timeout_ms, Some(2000));
        assert_eq!(config.sandbox.mem_limit_mb, Some(128));
        assert_eq!(config.sandbox.cpu_limit_s, Some(2));
        assert_eq!(config.sandbox.max_heap_mb, Some(32));
        assert_eq!(config.sandbox.max_code_size_kb, None);
    }

    #[test]
    fn config_parses_empty_toml() {
        let config = SkillboxConfig::from_toml("").unwrap();
        assert!(config.sandbox.timeout_ms.is_none());
    }

    #[test]
    fn config_rejects_zero_timeout() {
        let toml = r#"
            [sandbox]
            timeout_ms = 0
        "#;
        let err = SkillboxConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn config_rejects_zero_limits() {
        let toml = "[sandbox]\nmem_limit_mb = 0\n";
        assert!(SkillboxConfig::from_toml(toml).is_err());

        let toml = "[sandbox]\ncpu_limit_s = 0\n";
        assert!(SkillboxConfig::from_toml(toml).is_err());
    }

    #[test]
    fn config_expands_environment_variables() {
        std::env::set_var("SKILLBOX_TEST_TIMEOUT", "750");
        let toml = r#"
            [sandbox]
            timeout_ms = ${SKILLBOX_TEST_TIMEOUT}
        "#;
        let config = SkillboxConfig::from_toml_with_env(toml).unwrap();
        std::env::remove_var("SKILLBOX_TEST_TIMEOUT");
        assert_eq!(config.sandbox.timeout_ms, Some(750));
    }

    #[test]
    fn config_leaves_unknown_placeholders() {
        let expanded = expand_env_vars("value = \"${SKILLBOX_DOES_NOT_EXIST}\"");
        assert!(expanded.contains("${SKILLBOX_DOES_NOT_EXIST}"));
    }

    #[test]
    fn config_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skillbox.toml");
        std::fs::write(&path, "[sandbox]\ntimeout_ms = 1500\n").unwrap();

        let config = SkillboxConfig::from_file(&path).unwrap();
        assert_eq!(config.sandbox.timeout_ms, Some(1500));
    }
}
