//! Execution Orchestrator
//!
//! **Responsibility:**
//! Drive one request through workspace → compile → execute → decode → release.
//!
//! **Architecture:**
//! 1. Resolve the toolchain in the registry (registry.rs)
//! 2. Acquire a uniquely-tokened workspace (workspace.rs)
//! 3. Compile; any compiler stderr ends the request in the compile phase
//! 4. Execute once over the whole test-case file
//! 5. Decode the result protocol or fall back to placeholders (protocol.rs)
//!
//! The workspace is released on every path. Early returns through `?` drop
//! the guard, which applies the same cleanup policy.

use crate::config::WorkerConfig;
use crate::protocol;
use crate::registry::ToolchainRegistry;
use crate::runner::ProcessRunner;
use crate::workspace::{new_token, Workspace};
use codexec_common::types::{ExecutionReport, ExecutionRequest, Phase, ReportBody};
use codexec_common::Result;
use std::time::Instant;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct Executor {
    registry: ToolchainRegistry,
}

impl Executor {
    pub fn new(registry: ToolchainRegistry) -> Self {
        Self { registry }
    }

    /// Executor with built-in toolchains, the configured resource ceiling and
    /// any toolchain overrides the configuration names.
    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let runner = ProcessRunner::new().with_ceiling(config.resource_ceiling);
        let registry = ToolchainRegistry::with_defaults(&config.scaffold_root, runner)
            .with_overrides(config.toolchain_overrides()?);
        Ok(Self::new(registry))
    }

    pub fn registry(&self) -> &ToolchainRegistry {
        &self.registry
    }

    /// Run one request to completion.
    ///
    /// Errors are reserved for failures of the harness itself (unsupported
    /// language, unwritable workspace, missing scaffolding, spawn failure).
    /// Compile errors, timeouts and crashes of the submitted program are
    /// reported in the returned [`ExecutionReport`].
    #[instrument(skip(self, request), fields(request_id = %request.id, language = %request.language))]
    pub async fn run(&self, request: ExecutionRequest) -> Result<ExecutionReport> {
        let start = Instant::now();
        let language_id = request.language.as_str();

        // Unsupported languages fail before anything touches the filesystem.
        self.registry.provider(language_id)?;

        let workspace = Workspace::acquire(
            &request.workspace_root,
            &new_token(),
            request.cleanup_policy,
        )?;
        let workspace_dir = workspace.dir().to_path_buf();
        info!(
            token = workspace.token(),
            cleanup = %workspace.policy(),
            cases = request.test_cases.len(),
            "Workspace ready"
        );

        let mut toolchain = self
            .registry
            .create(language_id, &workspace_dir, request.timeout)?
            .with_submission(request.solution_source, request.test_cases.clone());

        let compiled = toolchain.compile().await?;
        if compiled.compile_failed() {
            warn!(
                exit_code = ?compiled.exit_code,
                stderr_len = compiled.stderr.len(),
                "Compilation failed; execute phase skipped"
            );
            workspace.release();
            return Ok(ExecutionReport {
                request_id: request.id,
                phase: Phase::Compile,
                exit_code: compiled.exit_code,
                body: ReportBody::Raw(compiled.stdout),
                stderr: compiled.stderr,
                workspace_dir,
            });
        }

        let executed = toolchain.execute().await?;
        let results = protocol::decode_or_fallback(
            &executed.stdout,
            &request.test_cases,
            executed.timed_out,
        );
        workspace.release();

        info!(
            exit_code = ?executed.exit_code,
            timed_out = executed.timed_out,
            cases = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Execution finished"
        );

        Ok(ExecutionReport {
            request_id: request.id,
            phase: Phase::Execute,
            exit_code: executed.exit_code,
            body: ReportBody::Results(results),
            stderr: executed.stderr,
            workspace_dir,
        })
    }
}
