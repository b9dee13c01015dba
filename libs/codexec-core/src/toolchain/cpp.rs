use super::{scaffold, RunOutcome, ToolchainContext, ToolchainDescriptor};
use codexec_common::types::Language;
use codexec_common::Result;
use tracing::debug;

/// JSON header the runner includes; supplied by the host under `scaffolding/cpp`.
const JSON_HEADER: &str = "nlohmann/json.hpp";

pub fn descriptor() -> ToolchainDescriptor {
    ToolchainDescriptor {
        // -w: warnings on stderr would be read as a failed compile.
        compile_command: Some(
            "g++ -O2 -w -fmax-errors=3 -std=c++17 {wrapper_path} -lm -lpthread -o {exe_path}".to_string(),
        ),
        execute_command: "{exe_path} {solution_path} {testcase_path}".to_string(),
        executable_file: "main".to_string(),
        sandbox_profile: Some("c_cpp".to_string()),
        apply_resource_ceiling: true,
        ..ToolchainDescriptor::base(Language::Cpp, "main.cpp", "solution.cpp")
    }
}

/// Compiled toolchain whose runner needs a generated call-site wrapper.
#[derive(Debug)]
pub struct CppToolchain {
    pub(super) ctx: ToolchainContext,
}

impl CppToolchain {
    pub fn new(ctx: ToolchainContext) -> Self {
        Self { ctx }
    }

    pub async fn compile(&mut self) -> Result<RunOutcome> {
        let ctx = &self.ctx;
        ctx.copy_asset(JSON_HEADER)?;

        let arity = ctx.test_cases.arity();
        let runner_source = scaffold::render_template(
            &ctx.scaffold_dir.join(&ctx.descriptor.wrapper_file),
            &scaffold::cpp_call_wrapper(arity),
        )?;
        scaffold::write_file(&ctx.wrapper_path(), &runner_source)?;
        ctx.stage_inputs(&ctx.solution_source)?;
        debug!(arity, "Staged C++ runner");

        ctx.run_compile().await
    }
}
