//! Per-language toolchains.
//!
//! The set of languages is closed: each one is a variant of [`Toolchain`]
//! built from a [`ToolchainDescriptor`] (constant configuration) and a
//! [`ToolchainContext`] (the workspace, submission and runner it works with).
//! All variants share the same two operations, `compile` and `execute`.

pub mod cpp;
pub mod java;
pub mod javascript;
pub mod python;
pub mod scaffold;

use crate::runner::{ProcessOutput, ProcessRunner, RunOptions, COMPILE_BUDGET};
use codexec_common::types::{Language, Phase, TestCaseSet};
use codexec_common::Result;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub use cpp::CppToolchain;
pub use java::JavaToolchain;
pub use javascript::JavaScriptToolchain;
pub use python::PythonToolchain;

/// Name of the staged test-case file inside every workspace.
pub const TESTCASE_FILE: &str = "testcase.json";

fn default_env() -> Vec<String> {
    vec!["LANG=C.UTF-8".to_string(), "LC_ALL=C.UTF-8".to_string()]
}

/// Constant per-language configuration.
///
/// Command templates use `{name}` placeholders; see [`ToolchainContext::render`]
/// for the names every toolchain understands.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolchainDescriptor {
    pub language: Language,
    /// `None` means the language has no compile step at all.
    pub compile_command: Option<String>,
    pub execute_command: String,
    /// Runner program copied from the scaffolding directory.
    pub wrapper_file: String,
    pub solution_file: String,
    /// Artifact the execute command runs, relative to the workspace.
    pub executable_file: String,
    /// Library archives under `<scaffolding>/lib`, joined into `{classpath}`.
    pub libraries: Vec<String>,
    /// `KEY=VALUE` entries added to the child environment.
    pub env: Vec<String>,
    /// Informational sandbox profile tag. Nothing enforces it yet.
    pub sandbox_profile: Option<String>,
    /// Whether the execute phase installs the runner's resource ceiling.
    pub apply_resource_ceiling: bool,
}

impl ToolchainDescriptor {
    fn base(language: Language, wrapper_file: &str, solution_file: &str) -> Self {
        Self {
            language,
            compile_command: None,
            execute_command: String::new(),
            wrapper_file: wrapper_file.to_string(),
            solution_file: solution_file.to_string(),
            executable_file: wrapper_file.to_string(),
            libraries: Vec::new(),
            env: default_env(),
            sandbox_profile: None,
            apply_resource_ceiling: false,
        }
    }

    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Cpp => cpp::descriptor(),
            Language::Java => java::descriptor(),
            Language::Python => python::descriptor(),
            Language::JavaScript => javascript::descriptor(),
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compile_command.is_some()
    }

    fn env_pairs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .filter_map(|entry| match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => Some((key.to_string(), value.to_string())),
                _ => {
                    warn!(entry = %entry, language = %self.language, "Ignoring malformed env entry");
                    None
                }
            })
            .collect()
    }
}

/// Output of one toolchain phase.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub phase: Phase,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl RunOutcome {
    /// Outcome of a phase that had nothing to run.
    pub fn skipped(phase: Phase) -> Self {
        Self {
            phase,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    fn from_output(phase: Phase, output: ProcessOutput) -> Self {
        Self {
            phase,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            timed_out: output.timed_out,
        }
    }

    /// Compile-phase verdict. Any stderr at all counts as failure, warnings included.
    pub fn compile_failed(&self) -> bool {
        self.phase == Phase::Compile && !self.stderr.is_empty()
    }
}

/// Everything a toolchain instance operates on.
#[derive(Debug, Clone)]
pub struct ToolchainContext {
    pub descriptor: ToolchainDescriptor,
    pub workspace_dir: PathBuf,
    /// `<scaffold root>/<language>`.
    pub scaffold_dir: PathBuf,
    pub timeout: Duration,
    pub runner: ProcessRunner,
    pub solution_source: String,
    pub test_cases: TestCaseSet,
}

impl ToolchainContext {
    pub fn new(
        descriptor: ToolchainDescriptor,
        workspace_dir: &Path,
        scaffold_root: &Path,
        timeout: Duration,
        runner: ProcessRunner,
    ) -> Self {
        let scaffold_dir = scaffold_root.join(descriptor.language.as_str());
        Self {
            descriptor,
            workspace_dir: workspace_dir.to_path_buf(),
            scaffold_dir,
            timeout,
            runner,
            solution_source: String::new(),
            test_cases: TestCaseSet::default(),
        }
    }

    pub fn solution_path(&self) -> PathBuf {
        self.workspace_dir.join(&self.descriptor.solution_file)
    }

    pub fn wrapper_path(&self) -> PathBuf {
        self.workspace_dir.join(&self.descriptor.wrapper_file)
    }

    pub fn testcase_path(&self) -> PathBuf {
        self.workspace_dir.join(TESTCASE_FILE)
    }

    pub fn exe_path(&self) -> PathBuf {
        self.workspace_dir.join(&self.descriptor.executable_file)
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.scaffold_dir.join("lib")
    }

    pub fn classpath(&self) -> String {
        let lib_dir = self.lib_dir();
        self.descriptor
            .libraries
            .iter()
            .map(|lib| lib_dir.join(lib).display().to_string())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Stage the test-case file and `solution_source` (which may carry
    /// language-specific additions) into the workspace.
    pub fn stage_inputs(&self, solution_source: &str) -> Result<()> {
        scaffold::write_file(&self.testcase_path(), &self.test_cases.to_json_string())?;
        scaffold::write_file(&self.solution_path(), solution_source)?;
        Ok(())
    }

    /// Copy `relative` from this language's scaffolding directory into the
    /// workspace at the same relative path.
    pub fn copy_asset(&self, relative: &str) -> Result<PathBuf> {
        let target = self.workspace_dir.join(relative);
        scaffold::copy_file(&self.scaffold_dir.join(relative), &target)?;
        Ok(target)
    }

    /// Substitute placeholders in `template`. Values are shell-quoted.
    ///
    /// Known names: `workspace_dir`, `solution_path`, `testcase_path`,
    /// `wrapper_path`, `exe_path`, `exe_name`, `lib_dir`, `classpath`.
    pub fn render(&self, template: &str) -> String {
        let vars: [(&str, String); 8] = [
            ("workspace_dir", self.workspace_dir.display().to_string()),
            ("solution_path", self.solution_path().display().to_string()),
            ("testcase_path", self.testcase_path().display().to_string()),
            ("wrapper_path", self.wrapper_path().display().to_string()),
            ("exe_path", self.exe_path().display().to_string()),
            ("exe_name", self.descriptor.executable_file.clone()),
            ("lib_dir", self.lib_dir().display().to_string()),
            ("classpath", self.classpath()),
        ];
        // One left-to-right pass: substituted values are never rescanned.
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let known = after.find('}').and_then(|close| {
                let name = &after[..close];
                vars.iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, value)| (close, value))
            });
            match known {
                Some((close, value)) => {
                    rendered.push_str(&shell_quote(value));
                    rest = &after[close + 1..];
                }
                None => {
                    rendered.push('{');
                    rest = after;
                }
            }
        }
        rendered.push_str(rest);
        rendered
    }

    fn run_options(&self, apply_ceiling: bool) -> RunOptions {
        RunOptions {
            cwd: Some(self.workspace_dir.clone()),
            env: self.descriptor.env_pairs(),
            apply_ceiling,
        }
    }

    /// Run the descriptor's compile command, if any.
    pub async fn run_compile(&self) -> Result<RunOutcome> {
        let Some(template) = &self.descriptor.compile_command else {
            return Ok(RunOutcome::skipped(Phase::Compile));
        };
        let command = self.render(template);
        debug!(language = %self.descriptor.language, command = %command, "Compiling");
        let output = self
            .runner
            .run(&command, COMPILE_BUDGET, &self.run_options(false))
            .await?;
        debug!(
            exit_code = ?output.exit_code,
            elapsed_ms = output.elapsed.as_millis() as u64,
            "Compile finished"
        );
        Ok(RunOutcome::from_output(Phase::Compile, output))
    }

    /// Run the descriptor's execute command within the request timeout.
    pub async fn run_execute(&self) -> Result<RunOutcome> {
        let command = self.render(&self.descriptor.execute_command);
        debug!(language = %self.descriptor.language, command = %command, "Executing");
        let output = self
            .runner
            .run(
                &command,
                self.timeout,
                &self.run_options(self.descriptor.apply_resource_ceiling),
            )
            .await?;
        debug!(
            exit_code = ?output.exit_code,
            timed_out = output.timed_out,
            elapsed_ms = output.elapsed.as_millis() as u64,
            "Execute finished"
        );
        Ok(RunOutcome::from_output(Phase::Execute, output))
    }
}

fn shell_quote(value: &str) -> Cow<'_, str> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_./:=@%+-,".contains(c));
    if safe {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
    }
}

/// A toolchain bound to one workspace.
#[derive(Debug)]
pub enum Toolchain {
    Cpp(CppToolchain),
    Java(JavaToolchain),
    Python(PythonToolchain),
    JavaScript(JavaScriptToolchain),
}

impl Toolchain {
    /// Build the variant for `ctx.descriptor.language`.
    pub fn from_context(ctx: ToolchainContext) -> Self {
        match ctx.descriptor.language {
            Language::Cpp => Toolchain::Cpp(CppToolchain::new(ctx)),
            Language::Java => Toolchain::Java(JavaToolchain::new(ctx)),
            Language::Python => Toolchain::Python(PythonToolchain::new(ctx)),
            Language::JavaScript => Toolchain::JavaScript(JavaScriptToolchain::new(ctx)),
        }
    }

    pub fn context(&self) -> &ToolchainContext {
        match self {
            Toolchain::Cpp(t) => &t.ctx,
            Toolchain::Java(t) => &t.ctx,
            Toolchain::Python(t) => &t.ctx,
            Toolchain::JavaScript(t) => &t.ctx,
        }
    }

    fn context_mut(&mut self) -> &mut ToolchainContext {
        match self {
            Toolchain::Cpp(t) => &mut t.ctx,
            Toolchain::Java(t) => &mut t.ctx,
            Toolchain::Python(t) => &mut t.ctx,
            Toolchain::JavaScript(t) => &mut t.ctx,
        }
    }

    pub fn language(&self) -> Language {
        self.context().descriptor.language
    }

    /// Attach the submission this toolchain will stage and run.
    pub fn with_submission(mut self, solution_source: impl Into<String>, test_cases: TestCaseSet) -> Self {
        let ctx = self.context_mut();
        ctx.solution_source = solution_source.into();
        ctx.test_cases = test_cases;
        self
    }

    /// Stage sources and scaffolding, then run the compile (or syntax-check) command.
    pub async fn compile(&mut self) -> Result<RunOutcome> {
        match self {
            Toolchain::Cpp(t) => t.compile().await,
            Toolchain::Java(t) => t.compile().await,
            Toolchain::Python(t) => t.compile().await,
            Toolchain::JavaScript(t) => t.compile().await,
        }
    }

    /// Run the staged program against the staged test-case file.
    pub async fn execute(&self) -> Result<RunOutcome> {
        self.context().run_execute().await
    }
}
