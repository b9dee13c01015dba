use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a request before (or instead of) producing a report.
///
/// Compile failures, timeouts, silent crashes and per-case runtime errors are
/// not represented here: they travel in-band inside `ExecutionReport`.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid test cases: {0}")]
    InvalidTestCases(String),

    #[error("Invalid cleanup policy: {0}")]
    InvalidPolicy(String),

    #[error("Workspace error at {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage scaffolding {}: {source}", path.display())]
    Scaffold {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template {} has no '{marker}' insertion marker", template.display())]
    MissingMarker { template: PathBuf, marker: String },

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting on '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_failure_is_not_reported_as_spawn() {
        let err = ExecutorError::Wait {
            command: "sleep 1".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        };
        let message = err.to_string();
        assert!(message.starts_with("Failed waiting on 'sleep 1'"));
        assert!(!message.contains("spawn"));
    }
}
