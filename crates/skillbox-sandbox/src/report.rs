//! Test cases, per-test outcomes, and the aggregated skill report.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One test case: positional arguments and the expected output.
///
/// Deserializes from the ordered-pair form `[args, expected]` or the
/// object form `{"args": ..., "expected": ...}`. A bare scalar in args
/// position means a single-argument call; an array means one argument
/// per element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    /// Positional arguments, as supplied (array or bare scalar).
    pub args: Value,
    /// The expected output value.
    pub expected: Value,
}

impl<'de> Deserialize<'de> for TestCase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Pair(Value, Value),
            Object { args: Value, expected: Value },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Pair(args, expected) | Repr::Object { args, expected } => {
                Ok(TestCase { args, expected })
            }
        }
    }
}

impl TestCase {
    /// Build a test case from explicit args and expected value.
    pub fn new(args: Value, expected: Value) -> Self {
        Self { args, expected }
    }

    /// Normalize the arguments to a positional sequence.
    ///
    /// An array is taken element-wise; anything else is a single
    /// argument.
    pub fn normalized_args(&self) -> Vec<Value> {
        match &self.args {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        }
    }
}

/// Classification of one isolated candidate invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Produced value strictly equals the expected value.
    Passed,
    /// Produced value differs from the expected value.
    Mismatch,
    /// Candidate code raised a failure.
    RuntimeFailure,
    /// A memory or CPU ceiling was hit (distinct from wall-clock timeout).
    ResourceExceeded,
    /// The wall-clock timeout elapsed and the worker was killed.
    Timeout,
}

/// The recorded result of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Whether this test passed.
    pub passed: bool,
    /// Outcome classification.
    pub outcome: OutcomeKind,
    /// The produced value, when one crossed the result channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The expected value, recorded whenever a comparison happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Failure description when not passed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time from worker spawn to resolution, in milliseconds.
    pub time_ms: f64,
}

impl TestOutcome {
    /// A passing outcome with both values recorded.
    pub fn passed(result: Value, expected: Value, time_ms: f64) -> Self {
        Self {
            passed: true,
            outcome: OutcomeKind::Passed,
            result: Some(result),
            expected: Some(expected),
            error: None,
            time_ms,
        }
    }

    /// A mismatch: both values recorded for the report consumer.
    pub fn mismatch(result: Value, expected: Value, time_ms: f64) -> Self {
        Self {
            passed: false,
            outcome: OutcomeKind::Mismatch,
            result: Some(result),
            expected: Some(expected),
            error: Some("produced value does not equal expected value".into()),
            time_ms,
        }
    }

    /// A non-comparison failure of the given kind.
    pub fn failed(outcome: OutcomeKind, error: impl Into<String>, time_ms: f64) -> Self {
        Self {
            passed: false,
            outcome,
            result: None,
            expected: None,
            error: Some(error.into()),
            time_ms,
        }
    }
}

/// Aggregated result of running one candidate against a full test batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillReport {
    /// Logical AND over all per-test `passed` flags.
    pub passed: bool,
    /// Total wall-clock time for the batch, in milliseconds.
    pub time_ms: f64,
    /// One outcome per input test case, in input order.
    pub results: Vec<TestOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_args_normalize_elementwise() {
        let test = TestCase::new(json!([1, 2]), json!(3));
        assert_eq!(test.normalized_args(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn scalar_args_normalize_to_single_argument() {
        let test = TestCase::new(json!(5), json!(25));
        assert_eq!(test.normalized_args(), vec![json!(5)]);

        let test = TestCase::new(json!("abc"), json!(3));
        assert_eq!(test.normalized_args(), vec![json!("abc")]);
    }

    #[test]
    fn null_args_are_a_single_null_argument() {
        let test = TestCase::new(Value::Null, json!(0));
        assert_eq!(test.normalized_args(), vec![Value::Null]);
    }

    #[test]
    fn test_case_deserializes_from_object_form() {
        let tests: Vec<TestCase> =
            serde_json::from_str(r#"[{"args": [1, 2], "expected": 3}]"#).unwrap();
        assert_eq!(tests[0], TestCase::new(json!([1, 2]), json!(3)));
    }

    #[test]
    fn test_case_deserializes_from_pair_form() {
        let tests: Vec<TestCase> =
            serde_json::from_str(r#"[[[1, 2], 3], [5, 25]]"#).unwrap();
        assert_eq!(tests[0], TestCase::new(json!([1, 2]), json!(3)));
        assert_eq!(tests[1], TestCase::new(json!(5), json!(25)));
    }

    #[test]
    fn passed_outcome_serializes_with_both_values() {
        let outcome = TestOutcome::passed(json!(3), json!(3), 1.5);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["passed"], json!(true));
        assert_eq!(json["outcome"], json!("passed"));
        assert_eq!(json["result"], json!(3));
        assert_eq!(json["expected"], json!(3));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failed_outcome_omits_absent_values() {
        let outcome = TestOutcome::failed(OutcomeKind::Timeout, "timeout", 50.0);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], json!("timeout"));
        assert_eq!(json["error"], json!("timeout"));
        assert!(json.get("result").is_none());
        assert!(json.get("expected").is_none());
    }

    #[test]
    fn comparison_is_strict() {
        // Integer 3 and float 3.0 are distinct JSON values; the harness
        // compares without coercion.
        assert_ne!(json!(3), json!(3.0));
        assert_ne!(json!(1), json!(true));
        assert_ne!(json!("3"), json!(3));
    }

    #[test]
    fn report_round_trips() {
        let report = SkillReport {
            passed: false,
            time_ms: 12.0,
            results: vec![
                TestOutcome::passed(json!(3), json!(3), 5.0),
                TestOutcome::mismatch(json!(4), json!(5), 6.0),
            ],
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: SkillReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }
}
