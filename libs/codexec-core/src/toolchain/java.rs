use super::{RunOutcome, ToolchainContext, ToolchainDescriptor};
use codexec_common::types::Language;
use codexec_common::Result;

const JACKSON_VERSION: &str = "2.18.2";

pub fn descriptor() -> ToolchainDescriptor {
    ToolchainDescriptor {
        compile_command: Some(
            "javac -encoding UTF-8 -nowarn -Xlint:none -cp {classpath} {wrapper_path} {solution_path}"
                .to_string(),
        ),
        // Classes land in the workspace itself; the solution path is passed for diagnostics only.
        execute_command:
            "java -Dfile.encoding=UTF-8 -cp {workspace_dir}:{classpath} {exe_name} {solution_path} {testcase_path}"
                .to_string(),
        executable_file: "Main".to_string(),
        libraries: ["jackson-databind", "jackson-core", "jackson-annotations"]
            .iter()
            .map(|name| format!("{}-{}.jar", name, JACKSON_VERSION))
            .collect(),
        ..ToolchainDescriptor::base(Language::Java, "Main.java", "Solution.java")
    }
}

/// JVM toolchain. Argument binding happens by reflection inside the runner,
/// so no code is generated here.
#[derive(Debug)]
pub struct JavaToolchain {
    pub(super) ctx: ToolchainContext,
}

impl JavaToolchain {
    pub fn new(ctx: ToolchainContext) -> Self {
        Self { ctx }
    }

    pub async fn compile(&mut self) -> Result<RunOutcome> {
        let ctx = &self.ctx;
        ctx.copy_asset(&ctx.descriptor.wrapper_file)?;
        ctx.stage_inputs(&ctx.solution_source)?;
        ctx.run_compile().await
    }
}
