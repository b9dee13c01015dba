use super::{RunOutcome, ToolchainContext, ToolchainDescriptor};
use crate::runner::RunOptions;
use codexec_common::types::Language;
use codexec_common::Result;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const INTERPRETER: &str = "python3";
const CACHE_TAG_SCRIPT: &str = "import sys; print(sys.implementation.cache_tag or '')";
const CACHE_TAG_BUDGET: Duration = Duration::from_secs(30);

pub fn descriptor() -> ToolchainDescriptor {
    let mut descriptor = ToolchainDescriptor {
        compile_command: Some(format!(
            "{} -m py_compile {{wrapper_path}} {{solution_path}}",
            INTERPRETER
        )),
        execute_command: format!(
            "{} {{exe_path}} {{solution_path}} {{testcase_path}}",
            INTERPRETER
        ),
        ..ToolchainDescriptor::base(Language::Python, "main.py", "solution.py")
    };
    descriptor.env.insert(0, "PYTHONIOENCODING=UTF-8".to_string());
    descriptor
}

/// Command printing the cache tag of the interpreter the compile command uses.
pub fn cache_tag_command(descriptor: &ToolchainDescriptor) -> String {
    let interpreter = descriptor
        .compile_command
        .as_deref()
        .and_then(|command| command.split_whitespace().next())
        .unwrap_or(INTERPRETER);
    format!("{} -c \"{}\"", interpreter, CACHE_TAG_SCRIPT)
}

/// Byte-compiled path of `source_file` for a given interpreter cache tag.
pub fn cached_artifact(source_file: &str, cache_tag: &str) -> String {
    let stem = Path::new(source_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_file);
    format!("__pycache__/{}.{}.pyc", stem, cache_tag)
}

/// Interpreted toolchain whose compile step leaves a byte-code cache behind.
/// The cache file name depends on the host interpreter and is read at compile time.
#[derive(Debug)]
pub struct PythonToolchain {
    pub(super) ctx: ToolchainContext,
}

impl PythonToolchain {
    pub fn new(ctx: ToolchainContext) -> Self {
        Self { ctx }
    }

    pub async fn compile(&mut self) -> Result<RunOutcome> {
        self.ctx.copy_asset(&self.ctx.descriptor.wrapper_file)?;
        self.ctx.stage_inputs(&self.ctx.solution_source)?;

        let outcome = self.ctx.run_compile().await?;
        if outcome.compile_failed() {
            return Ok(outcome);
        }

        match self.read_cache_tag().await {
            Some(tag) => {
                let artifact = cached_artifact(&self.ctx.descriptor.wrapper_file, &tag);
                if self.ctx.workspace_dir.join(&artifact).is_file() {
                    debug!(artifact = %artifact, "Using byte-compiled runner");
                    self.ctx.descriptor.executable_file = artifact;
                } else {
                    warn!(artifact = %artifact, "Byte-compiled runner missing, running source");
                }
            }
            None => warn!("Could not determine interpreter cache tag, running source"),
        }
        Ok(outcome)
    }

    async fn read_cache_tag(&self) -> Option<String> {
        let options = RunOptions {
            cwd: Some(self.ctx.workspace_dir.clone()),
            ..Default::default()
        };
        let output = self
            .ctx
            .runner
            .run(&cache_tag_command(&self.ctx.descriptor), CACHE_TAG_BUDGET, &options)
            .await
            .ok()?;
        let tag = output.stdout.trim();
        (output.exit_code == Some(0) && !tag.is_empty()).then(|| tag.to_string())
    }
}
