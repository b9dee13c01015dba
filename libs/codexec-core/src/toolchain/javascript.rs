use super::{scaffold, RunOutcome, ToolchainContext, ToolchainDescriptor};
use codexec_common::types::Language;
use codexec_common::Result;

/// Appended to the submitted source so the runner can `require` it.
const SOLUTION_EXPORT: &str = "solution_adder.js";

pub fn descriptor() -> ToolchainDescriptor {
    let mut descriptor = ToolchainDescriptor {
        compile_command: Some("node --check {solution_path}".to_string()),
        execute_command: "node {wrapper_path} {solution_path} {testcase_path}".to_string(),
        ..ToolchainDescriptor::base(Language::JavaScript, "main.js", "solution.js")
    };
    descriptor.env.insert(0, "NO_COLOR=true".to_string());
    descriptor
}

/// Interpreted toolchain; "compile" is a syntax check of the solution.
#[derive(Debug)]
pub struct JavaScriptToolchain {
    pub(super) ctx: ToolchainContext,
}

impl JavaScriptToolchain {
    pub fn new(ctx: ToolchainContext) -> Self {
        Self { ctx }
    }

    pub async fn compile(&mut self) -> Result<RunOutcome> {
        let ctx = &self.ctx;
        ctx.copy_asset(&ctx.descriptor.wrapper_file)?;
        let export = scaffold::read_file(&ctx.scaffold_dir.join(SOLUTION_EXPORT))?;

        let mut source = ctx.solution_source.clone();
        if !source.ends_with('\n') {
            source.push('\n');
        }
        source.push_str(&export);
        ctx.stage_inputs(&source)?;

        ctx.run_compile().await
    }
}
