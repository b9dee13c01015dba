// Worker configuration and per-language toolchain overrides
use crate::runner::ResourceCeiling;
use crate::toolchain::ToolchainDescriptor;
use codexec_common::types::{CleanupPolicy, Language};
use codexec_common::{ExecutorError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_WORKSPACE_ROOT: &str = "/workspace";
const DEFAULT_TIMEOUT_SECS: f64 = 10.0;
const DEFAULT_MEMORY_LIMIT_MB: u64 = 500;
const DEFAULT_CPU_LIMIT_SECS: u64 = 30;

/// Scaffolding shipped next to the workspace sources.
pub fn default_scaffold_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scaffolding")
}

/// Operator-supplied replacement for parts of a built-in descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolchainOverride {
    pub language: Language,
    pub compile_command: Option<String>,
    pub execute_command: Option<String>,
    pub env: Option<Vec<String>>,
}

impl ToolchainOverride {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            compile_command: None,
            execute_command: None,
            env: None,
        }
    }

    /// Fields left `None` keep the built-in value.
    pub fn apply(&self, descriptor: &mut ToolchainDescriptor) {
        if let Some(command) = &self.compile_command {
            descriptor.compile_command = Some(command.clone());
        }
        if let Some(command) = &self.execute_command {
            descriptor.execute_command = command.clone();
        }
        if let Some(env) = &self.env {
            descriptor.env = env.clone();
        }
    }
}

#[derive(Debug, Deserialize)]
struct OverrideEntry {
    language: String,
    #[serde(default)]
    compile_command: Option<String>,
    #[serde(default)]
    execute_command: Option<String>,
    #[serde(default)]
    env: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ToolchainsJson {
    toolchains: Vec<OverrideEntry>,
}

/// Toolchain override manager
#[derive(Debug, Clone, Default)]
pub struct ToolchainConfigManager {
    overrides: HashMap<Language, ToolchainOverride>,
}

impl ToolchainConfigManager {
    /// Load overrides from a `{"toolchains": [...]}` file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Err(ExecutorError::Config(format!(
                "Toolchain config file not found: {}",
                config_path.display()
            )));
        }

        let content = fs::read_to_string(config_path).map_err(|e| {
            ExecutorError::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let parsed: ToolchainsJson = serde_json::from_str(content)
            .map_err(|e| ExecutorError::Config(format!("Failed to parse toolchain config: {}", e)))?;

        let mut overrides = Vec::with_capacity(parsed.toolchains.len());
        for entry in parsed.toolchains {
            overrides.push(ToolchainOverride {
                language: entry.language.parse()?,
                compile_command: entry.compile_command,
                execute_command: entry.execute_command,
                env: entry.env,
            });
        }
        Ok(Self::from_overrides(overrides))
    }

    pub fn from_overrides(overrides: impl IntoIterator<Item = ToolchainOverride>) -> Self {
        Self {
            overrides: overrides.into_iter().map(|o| (o.language, o)).collect(),
        }
    }

    pub fn get(&self, language: Language) -> Option<&ToolchainOverride> {
        self.overrides.get(&language)
    }

    /// List all languages with an override
    pub fn list_languages(&self) -> Vec<Language> {
        self.overrides.keys().copied().collect()
    }
}

/// Process-wide defaults, read from `CODEXEC_*` environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub workspace_root: PathBuf,
    pub timeout: Duration,
    pub cleanup_policy: CleanupPolicy,
    pub scaffold_root: PathBuf,
    pub toolchains_path: Option<PathBuf>,
    pub resource_ceiling: Option<ResourceCeiling>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from(DEFAULT_WORKSPACE_ROOT),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            cleanup_policy: CleanupPolicy::None,
            scaffold_root: default_scaffold_root(),
            toolchains_path: None,
            resource_ceiling: Some(ResourceCeiling::new(
                DEFAULT_MEMORY_LIMIT_MB,
                DEFAULT_CPU_LIMIT_SECS,
            )),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(root) = lookup("CODEXEC_WORKSPACE_ROOT") {
            config.workspace_root = PathBuf::from(root);
        }
        if let Some(secs) = lookup("CODEXEC_TIMEOUT_SECS") {
            let secs: f64 = parse_var("CODEXEC_TIMEOUT_SECS", &secs)?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ExecutorError::Config(format!(
                    "CODEXEC_TIMEOUT_SECS must be positive, got {}",
                    secs
                )));
            }
            config.timeout = Duration::from_secs_f64(secs);
        }
        if let Some(policy) = lookup("CODEXEC_CLEANUP") {
            config.cleanup_policy = policy.parse()?;
        }
        if let Some(dir) = lookup("CODEXEC_SCAFFOLD_DIR") {
            config.scaffold_root = PathBuf::from(dir);
        }
        config.toolchains_path = lookup("CODEXEC_TOOLCHAINS").map(PathBuf::from);

        let memory_mb = match lookup("CODEXEC_MEMORY_LIMIT_MB") {
            Some(v) => parse_var("CODEXEC_MEMORY_LIMIT_MB", &v)?,
            None => DEFAULT_MEMORY_LIMIT_MB,
        };
        let cpu_secs = match lookup("CODEXEC_CPU_LIMIT_SECS") {
            Some(v) => parse_var("CODEXEC_CPU_LIMIT_SECS", &v)?,
            None => DEFAULT_CPU_LIMIT_SECS,
        };
        config.resource_ceiling = if memory_mb == 0 || cpu_secs == 0 {
            None
        } else {
            Some(ResourceCeiling::new(memory_mb, cpu_secs))
        };

        Ok(config)
    }

    /// Overrides named by `CODEXEC_TOOLCHAINS`, or none.
    pub fn toolchain_overrides(&self) -> Result<ToolchainConfigManager> {
        match &self.toolchains_path {
            Some(path) => ToolchainConfigManager::load(path),
            None => Ok(ToolchainConfigManager::default()),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ExecutorError::Config(format!("{}={:?}: {}", name, value, e)))
}
