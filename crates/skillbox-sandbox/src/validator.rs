//! Preflight source checks, run before the candidate is parsed.
//!
//! These are cheap guards in front of the AST gate: empty input and
//! oversized input are refused without touching the parser.

use crate::error::SandboxError;

/// Check candidate source size bounds before parsing.
pub fn check_source(source: &str, max_code_size: usize) -> Result<(), SandboxError> {
    if source.len() > max_code_size {
        return Err(SandboxError::CodeTooLarge {
            max: max_code_size,
            actual: source.len(),
        });
    }

    if source.trim().is_empty() {
        return Err(SandboxError::EmptySource);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_function() {
        assert!(check_source("(a, b) => a + b", 64 * 1024).is_ok());
    }

    #[test]
    fn rejects_empty_source() {
        assert!(matches!(
            check_source("", 64 * 1024),
            Err(SandboxError::EmptySource)
        ));
        assert!(matches!(
            check_source("   \n\t", 64 * 1024),
            Err(SandboxError::EmptySource)
        ));
    }

    #[test]
    fn rejects_oversized_source() {
        let big = "x".repeat(100);
        let err = check_source(&big, 50).unwrap_err();
        match err {
            SandboxError::CodeTooLarge { max, actual } => {
                assert_eq!(max, 50);
                assert_eq!(actual, 100);
            }
            other => panic!("expected CodeTooLarge, got: {other:?}"),
        }
    }
}
