use crate::error::{ExecutorError, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Marker placed in a per-case `stderr` when the execute phase hit its time budget.
pub const TIMEOUT_MARKER: &str = "timeout";

/// Placeholder `stderr` for cases whose runner produced no result protocol.
pub const ERROR_OCCURRED_MARKER: &str = "(error occurred)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    Cpp,
    Java,
    Python,
    JavaScript,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Cpp,
        Language::Java,
        Language::Python,
        Language::JavaScript,
    ];

    /// Canonical identifier, also the name of the scaffolding subdirectory.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Python => "python",
            Language::JavaScript => "javascript",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpp" | "c++" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" => Ok(Language::JavaScript),
            _ => Err(ExecutorError::UnsupportedLanguage(s.to_string())),
        }
    }
}

impl TryFrom<String> for Language {
    type Error = ExecutorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.as_str().to_string()
    }
}

/// What happens to a request's workspace once the request completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CleanupPolicy {
    /// Keep every staged file (debugging).
    #[default]
    None,
    /// Remove this request's directory only.
    HashOnly,
    /// Remove this request's directory, then its parent if it is left empty.
    SafeAll,
}

impl CleanupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupPolicy::None => "none",
            CleanupPolicy::HashOnly => "hash",
            CleanupPolicy::SafeAll => "all",
        }
    }
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupPolicy {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(CleanupPolicy::None),
            "hash" | "hash_only" => Ok(CleanupPolicy::HashOnly),
            "all" | "safe_all" => Ok(CleanupPolicy::SafeAll),
            _ => Err(ExecutorError::InvalidPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for CleanupPolicy {
    type Error = ExecutorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CleanupPolicy> for String {
    fn from(policy: CleanupPolicy) -> Self {
        policy.as_str().to_string()
    }
}

/// One test case. `input` keeps insertion order: it is the positional
/// argument order of the call into the submitted solution.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub id: String,
    pub input: Map<String, Value>,
    pub expected_output: Option<Value>,
}

impl TestCase {
    pub fn arity(&self) -> usize {
        self.input.len()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTestCase {
    #[serde(default)]
    input: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
}

/// Ordered set of test cases sharing one parameter arity.
///
/// Serializes to the test-case file format consumed by the runners:
/// `{"<id>": {"input": {...}, "output": ...}, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct TestCaseSet {
    cases: Vec<TestCase>,
}

impl TestCaseSet {
    pub fn new(cases: Vec<TestCase>) -> Result<Self> {
        if let Some(first) = cases.first() {
            let arity = first.arity();
            if let Some(odd) = cases.iter().find(|c| c.arity() != arity) {
                return Err(ExecutorError::InvalidTestCases(format!(
                    "case '{}' has {} parameters, expected {} (from case '{}')",
                    odd.id,
                    odd.arity(),
                    arity,
                    first.id
                )));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for case in &cases {
            if !seen.insert(case.id.as_str()) {
                return Err(ExecutorError::InvalidTestCases(format!(
                    "duplicate case id '{}'",
                    case.id
                )));
            }
        }
        Ok(Self { cases })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ExecutorError::InvalidTestCases(e.to_string()))
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.clone().into()).to_string()
    }

    /// Parameter count of the first case, applied uniformly to all cases.
    pub fn arity(&self) -> usize {
        self.cases.first().map(TestCase::arity).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestCase> {
        self.cases.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.cases.iter().map(|c| c.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.id == id)
    }
}

impl TryFrom<Map<String, Value>> for TestCaseSet {
    type Error = ExecutorError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut cases = Vec::with_capacity(map.len());
        for (id, value) in map {
            let wire: WireTestCase = serde_json::from_value(value).map_err(|e| {
                ExecutorError::InvalidTestCases(format!("case '{}': {}", id, e))
            })?;
            cases.push(TestCase {
                id,
                input: wire.input,
                expected_output: wire.output,
            });
        }
        Self::new(cases)
    }
}

impl From<TestCaseSet> for Map<String, Value> {
    fn from(set: TestCaseSet) -> Self {
        let mut map = Map::with_capacity(set.cases.len());
        for case in set.cases {
            let mut entry = Map::new();
            entry.insert("input".to_string(), Value::Object(case.input));
            if let Some(output) = case.expected_output {
                entry.insert("output".to_string(), output);
            }
            map.insert(case.id, Value::Object(entry));
        }
        map
    }
}

/// A single execution request. Immutable once built; consumed by the executor.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub id: Uuid,
    pub language: Language,
    pub solution_source: String,
    pub test_cases: TestCaseSet,
    pub workspace_root: PathBuf,
    pub timeout: Duration,
    pub cleanup_policy: CleanupPolicy,
}

impl ExecutionRequest {
    pub fn new(language: Language, solution_source: impl Into<String>, test_cases: TestCaseSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            solution_source: solution_source.into(),
            test_cases,
            workspace_root: PathBuf::from("/workspace"),
            timeout: Duration::from_secs(10),
            cleanup_policy: CleanupPolicy::None,
        }
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup_policy = policy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Compile,
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Compile => f.write_str("compile"),
            Phase::Execute => f.write_str("execute"),
        }
    }
}

/// Per-case entry of the result protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(skip)]
    pub case_id: String,
    #[serde(default)]
    pub result: Value,
    pub utime: i64,
    pub stime: i64,
    #[serde(rename = "realtime")]
    pub wall_time: f64,
    #[serde(rename = "max_memory")]
    pub peak_memory_kb: i64,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
}

impl TestResult {
    /// Stand-in for a case whose runner never reported.
    pub fn placeholder(case_id: impl Into<String>, reason: &str) -> Self {
        Self {
            case_id: case_id.into(),
            result: Value::Null,
            utime: -1,
            stime: -1,
            wall_time: -1.0,
            peak_memory_kb: -1,
            stdout: Some(String::new()),
            stderr: Some(reason.to_string()),
        }
    }
}

/// Third element of the executor's return value.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportBody {
    /// Raw compiler stdout (compile phase).
    Raw(String),
    /// Decoded per-case results in request order (execute phase).
    Results(Vec<TestResult>),
}

impl Serialize for ReportBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ReportBody::Raw(raw) => serializer.serialize_str(raw),
            ReportBody::Results(results) => {
                let mut map = serializer.serialize_map(Some(results.len()))?;
                for result in results {
                    map.serialize_entry(&result.case_id, result)?;
                }
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub request_id: Uuid,
    pub phase: Phase,
    pub exit_code: Option<i32>,
    pub body: ReportBody,
    pub stderr: String,
    pub workspace_dir: PathBuf,
}

impl ExecutionReport {
    pub fn results(&self) -> Option<&[TestResult]> {
        match &self.body {
            ReportBody::Results(results) => Some(results),
            ReportBody::Raw(_) => None,
        }
    }

    pub fn result_for(&self, case_id: &str) -> Option<&TestResult> {
        self.results()?.iter().find(|r| r.case_id == case_id)
    }

    pub fn timed_out(&self) -> bool {
        self.phase == Phase::Execute && self.stderr == TIMEOUT_MARKER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TWO_CASES: &str = r#"{"1":{"input":{"m":1,"n":2},"output":3},"2":{"input":{"m":3,"n":4}}}"#;

    #[test]
    fn test_language_parsing_is_case_insensitive() {
        assert_eq!("CPP".parse::<Language>().unwrap(), Language::Cpp);
        assert_eq!("c++".parse::<Language>().unwrap(), Language::Cpp);
        assert_eq!("Python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("JS".parse::<Language>().unwrap(), Language::JavaScript);
        assert!(matches!(
            "cobol".parse::<Language>(),
            Err(ExecutorError::UnsupportedLanguage(lang)) if lang == "cobol"
        ));
    }

    #[test]
    fn test_cleanup_policy_aliases() {
        assert_eq!("NONE".parse::<CleanupPolicy>().unwrap(), CleanupPolicy::None);
        assert_eq!("hash_only".parse::<CleanupPolicy>().unwrap(), CleanupPolicy::HashOnly);
        assert_eq!("Hash".parse::<CleanupPolicy>().unwrap(), CleanupPolicy::HashOnly);
        assert_eq!("SAFE_ALL".parse::<CleanupPolicy>().unwrap(), CleanupPolicy::SafeAll);
        assert!("sometimes".parse::<CleanupPolicy>().is_err());
    }

    #[test]
    fn test_case_set_preserves_order() {
        let set = TestCaseSet::from_json_str(
            r#"{"b":{"input":{"z":1,"a":2}},"a":{"input":{"y":3,"b":4}}}"#,
        )
        .unwrap();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["b", "a"]);
        let first = set.get("b").unwrap();
        assert_eq!(first.input.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(set.arity(), 2);
    }

    #[test]
    fn test_case_set_file_format() {
        let set = TestCaseSet::from_json_str(TWO_CASES).unwrap();
        assert_eq!(set.get("1").unwrap().expected_output, Some(json!(3)));
        assert_eq!(set.get("2").unwrap().expected_output, None);

        let written: Value = serde_json::from_str(&set.to_json_string()).unwrap();
        assert_eq!(written, serde_json::from_str::<Value>(TWO_CASES).unwrap());
    }

    #[test]
    fn test_case_set_rejects_mixed_arity() {
        let err = TestCaseSet::from_json_str(r#"{"1":{"input":{"m":1}},"2":{"input":{"m":1,"n":2}}}"#)
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidTestCases(_)));
    }

    #[test]
    fn test_empty_case_set_has_zero_arity() {
        let set = TestCaseSet::from_json_str("{}").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.arity(), 0);
    }

    #[test]
    fn test_result_protocol_field_names() {
        let result = TestResult {
            case_id: "1".to_string(),
            result: json!(3),
            utime: 1,
            stime: 0,
            wall_time: 0.000012,
            peak_memory_kb: 9000,
            stdout: Some(String::new()),
            stderr: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["realtime"], json!(0.000012));
        assert_eq!(value["max_memory"], json!(9000));
        assert!(value.get("case_id").is_none());
        assert_eq!(value["stderr"], Value::Null);
    }

    #[test]
    fn test_report_body_serializes_keyed_by_case() {
        let body = ReportBody::Results(vec![
            TestResult::placeholder("2", TIMEOUT_MARKER),
            TestResult::placeholder("1", TIMEOUT_MARKER),
        ]);
        let text = serde_json::to_string(&body).unwrap();
        assert!(text.find("\"2\"").unwrap() < text.find("\"1\"").unwrap());

        let raw = serde_json::to_value(ReportBody::Raw("out".to_string())).unwrap();
        assert_eq!(raw, json!("out"));
    }
}
