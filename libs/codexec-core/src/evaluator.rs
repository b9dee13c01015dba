//! Test Evaluator - Language-Agnostic Verdicts
//!
//! **Core Responsibility:**
//! Compare decoded per-case results against the expected outputs carried by
//! the test cases and assign a verdict to each case.
//!
//! **Critical Properties:**
//! - Knows nothing about toolchains or processes
//! - Never alters the execution report it reads
//! - Pure function: (report, test cases) → verdicts
//!
//! **Verdict Priority:**
//! 1. Compile phase report → CompileError for every case
//! 2. Per-case timeout marker → TimeLimitExceeded
//! 3. Per-case stderr present → RuntimeError
//! 4. No expected output → Unjudged
//! 5. JSON equality (numbers compared by value, so `3` matches `3.0`) → Accepted / WrongAnswer

use codexec_common::types::{ExecutionReport, Phase, TestCaseSet, TestResult, TIMEOUT_MARKER};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
    CompileError,
    Unjudged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseVerdict {
    pub case_id: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub verdicts: Vec<CaseVerdict>,
    pub passed: usize,
    pub total: usize,
}

impl EvaluationSummary {
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }

    pub fn verdict_for(&self, case_id: &str) -> Option<Verdict> {
        self.verdicts
            .iter()
            .find(|v| v.case_id == case_id)
            .map(|v| v.verdict)
    }
}

/// JSON equality where numbers compare by value.
fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| values_match(v, w)))
        }
        _ => actual == expected,
    }
}

/// Verdict for one decoded result.
pub fn evaluate_case(result: &TestResult, expected: Option<&Value>) -> Verdict {
    match result.stderr.as_deref() {
        Some(TIMEOUT_MARKER) => return Verdict::TimeLimitExceeded,
        Some(stderr) if !stderr.is_empty() => return Verdict::RuntimeError,
        _ => {}
    }
    match expected {
        None => Verdict::Unjudged,
        Some(expected) if values_match(&result.result, expected) => Verdict::Accepted,
        Some(_) => Verdict::WrongAnswer,
    }
}

/// Evaluate a whole report against the request's test cases.
///
/// Cases the runner omitted from its output are judged as RuntimeError.
pub fn evaluate(report: &ExecutionReport, cases: &TestCaseSet) -> EvaluationSummary {
    let verdicts: Vec<CaseVerdict> = cases
        .iter()
        .map(|case| {
            let verdict = if report.phase == Phase::Compile {
                Verdict::CompileError
            } else {
                match report.result_for(&case.id) {
                    Some(result) => evaluate_case(result, case.expected_output.as_ref()),
                    None => Verdict::RuntimeError,
                }
            };
            CaseVerdict {
                case_id: case.id.clone(),
                verdict,
            }
        })
        .collect();

    let passed = verdicts
        .iter()
        .filter(|v| v.verdict == Verdict::Accepted)
        .count();

    EvaluationSummary {
        total: verdicts.len(),
        passed,
        verdicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codexec_common::types::{ReportBody, ERROR_OCCURRED_MARKER};
    use serde_json::json;
    use std::path::PathBuf;
    use uuid::Uuid;

    /// Helper to create a successful result
    fn make_result(case_id: &str, value: Value) -> TestResult {
        TestResult {
            case_id: case_id.to_string(),
            result: value,
            utime: 0,
            stime: 0,
            wall_time: 0.001,
            peak_memory_kb: 8000,
            stdout: Some(String::new()),
            stderr: None,
        }
    }

    fn make_report(phase: Phase, body: ReportBody) -> ExecutionReport {
        ExecutionReport {
            request_id: Uuid::new_v4(),
            phase,
            exit_code: Some(0),
            body,
            stderr: String::new(),
            workspace_dir: PathBuf::from("/ws"),
        }
    }

    fn cases() -> TestCaseSet {
        TestCaseSet::from_json_str(
            r#"{"1":{"input":{"m":1,"n":2},"output":3},"2":{"input":{"m":3,"n":4},"output":7},"3":{"input":{"m":0,"n":0}}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_values_match_numbers_by_value() {
        assert!(values_match(&json!(3), &json!(3.0)));
        assert!(values_match(&json!([1, 2.0]), &json!([1.0, 2])));
        assert!(values_match(&json!({"a": 1}), &json!({"a": 1.0})));
        assert!(!values_match(&json!([1, 2]), &json!([2, 1])));
        assert!(!values_match(&json!("3"), &json!(3)));
    }

    #[test]
    fn test_evaluate_case_priorities() {
        let mut result = make_result("1", json!(3));
        assert_eq!(evaluate_case(&result, Some(&json!(3))), Verdict::Accepted);
        assert_eq!(evaluate_case(&result, Some(&json!(4))), Verdict::WrongAnswer);
        assert_eq!(evaluate_case(&result, None), Verdict::Unjudged);

        result.stderr = Some("Traceback ...".to_string());
        assert_eq!(evaluate_case(&result, Some(&json!(3))), Verdict::RuntimeError);

        let placeholder = TestResult::placeholder("1", TIMEOUT_MARKER);
        assert_eq!(evaluate_case(&placeholder, Some(&json!(3))), Verdict::TimeLimitExceeded);

        let crashed = TestResult::placeholder("1", ERROR_OCCURRED_MARKER);
        assert_eq!(evaluate_case(&crashed, Some(&json!(3))), Verdict::RuntimeError);
    }

    #[test]
    fn test_evaluate_report() {
        let report = make_report(
            Phase::Execute,
            ReportBody::Results(vec![
                make_result("1", json!(3)),
                make_result("2", json!(8)),
                make_result("3", json!(0)),
            ]),
        );
        let summary = evaluate(&report, &cases());
        assert_eq!(summary.verdict_for("1"), Some(Verdict::Accepted));
        assert_eq!(summary.verdict_for("2"), Some(Verdict::WrongAnswer));
        assert_eq!(summary.verdict_for("3"), Some(Verdict::Unjudged));
        assert_eq!((summary.passed, summary.total), (1, 3));
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_compile_report_fails_every_case() {
        let report = make_report(Phase::Compile, ReportBody::Raw(String::new()));
        let summary = evaluate(&report, &cases());
        assert!(summary
            .verdicts
            .iter()
            .all(|v| v.verdict == Verdict::CompileError));
        assert_eq!(summary.passed, 0);
    }

    #[test]
    fn test_missing_case_is_runtime_error() {
        let report = make_report(
            Phase::Execute,
            ReportBody::Results(vec![make_result("1", json!(3))]),
        );
        let summary = evaluate(&report, &cases());
        assert_eq!(summary.verdict_for("2"), Some(Verdict::RuntimeError));
    }
}
