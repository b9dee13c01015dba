//! Result protocol decoding and the placeholder fallback.
//!
//! A runner prints one JSON object keyed by case id. When it prints nothing
//! (crash, kill, timeout) every requested case gets a placeholder instead,
//! so a report always carries the request's full set of case ids.

use codexec_common::types::{TestCaseSet, TestResult, ERROR_OCCURRED_MARKER, TIMEOUT_MARKER};
use serde_json::{Map, Value};
use tracing::warn;

/// Parse runner stdout into per-case results, in the order the runner wrote them.
pub fn decode(stdout: &str) -> Result<Vec<TestResult>, serde_json::Error> {
    let entries: Map<String, Value> = serde_json::from_str(stdout)?;
    entries
        .into_iter()
        .map(|(case_id, value)| {
            let mut result: TestResult = serde_json::from_value(value)?;
            result.case_id = case_id;
            Ok(result)
        })
        .collect()
}

/// One placeholder per requested case, in request order.
pub fn fallback(cases: &TestCaseSet, reason: &str) -> Vec<TestResult> {
    cases
        .ids()
        .map(|id| TestResult::placeholder(id, reason))
        .collect()
}

/// Reorder decoded results to follow the request. Ids the request did not
/// contain keep their runner order at the end.
fn in_request_order(mut results: Vec<TestResult>, cases: &TestCaseSet) -> Vec<TestResult> {
    let mut ordered = Vec::with_capacity(results.len());
    for id in cases.ids() {
        if let Some(pos) = results.iter().position(|r| r.case_id == id) {
            ordered.push(results.remove(pos));
        }
    }
    ordered.extend(results);
    ordered
}

/// Decode `stdout`, or fall back to placeholders when the runner produced
/// nothing usable. Placeholders say `timeout` when the budget was hit.
pub fn decode_or_fallback(stdout: &str, cases: &TestCaseSet, timed_out: bool) -> Vec<TestResult> {
    let reason = if timed_out {
        TIMEOUT_MARKER
    } else {
        ERROR_OCCURRED_MARKER
    };

    if stdout.trim().is_empty() {
        return fallback(cases, reason);
    }

    match decode(stdout) {
        Ok(results) => in_request_order(results, cases),
        Err(e) => {
            warn!(error = %e, stdout_len = stdout.len(), "Runner output is not a result protocol object");
            fallback(cases, reason)
        }
    }
}
