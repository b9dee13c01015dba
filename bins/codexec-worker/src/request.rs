// Request wire format accepted by the worker
use codexec_common::types::{CleanupPolicy, ExecutionRequest, Language, TestCaseSet};
use codexec_common::ExecutorError;
use codexec_core::WorkerConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Fields left out fall back to the worker configuration.
#[derive(Debug, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub language: Language,
    #[serde(alias = "source")]
    pub solution_source: String,
    pub test_cases: TestCaseSet,
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub cleanup: Option<CleanupPolicy>,
}

impl RequestEnvelope {
    pub fn into_request(self, config: &WorkerConfig) -> Result<ExecutionRequest, ExecutorError> {
        let timeout = match self.timeout_secs {
            Some(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
            Some(secs) => {
                return Err(ExecutorError::Config(format!(
                    "timeout_secs must be positive, got {}",
                    secs
                )))
            }
            None => config.timeout,
        };

        let mut request = ExecutionRequest::new(self.language, self.solution_source, self.test_cases)
            .with_workspace_root(self.workspace_root.unwrap_or_else(|| config.workspace_root.clone()))
            .with_timeout(timeout)
            .with_cleanup_policy(self.cleanup.unwrap_or(config.cleanup_policy));
        if let Some(id) = self.id {
            request.id = id;
        }
        Ok(request)
    }
}
