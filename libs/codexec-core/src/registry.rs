//! Language identifier → toolchain dispatch.
//!
//! The single extension point for languages: a new toolchain registers a
//! descriptor and a constructor here and the executor picks it up unchanged.

use crate::config::ToolchainConfigManager;
use crate::runner::ProcessRunner;
use crate::toolchain::{
    cpp, java, javascript, python, CppToolchain, JavaScriptToolchain, JavaToolchain, PythonToolchain,
    Toolchain, ToolchainContext, ToolchainDescriptor,
};
use codexec_common::types::Language;
use codexec_common::{ExecutorError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub type ToolchainFactory = fn(ToolchainContext) -> Toolchain;

/// Descriptor source plus constructor for one language.
#[derive(Clone, Copy)]
pub struct ToolchainProvider {
    pub descriptor: fn() -> ToolchainDescriptor,
    pub build: ToolchainFactory,
}

impl ToolchainProvider {
    pub fn builtin(language: Language) -> Self {
        match language {
            Language::Cpp => Self {
                descriptor: cpp::descriptor,
                build: |ctx| Toolchain::Cpp(CppToolchain::new(ctx)),
            },
            Language::Java => Self {
                descriptor: java::descriptor,
                build: |ctx| Toolchain::Java(JavaToolchain::new(ctx)),
            },
            Language::Python => Self {
                descriptor: python::descriptor,
                build: |ctx| Toolchain::Python(PythonToolchain::new(ctx)),
            },
            Language::JavaScript => Self {
                descriptor: javascript::descriptor,
                build: |ctx| Toolchain::JavaScript(JavaScriptToolchain::new(ctx)),
            },
        }
    }
}

impl std::fmt::Debug for ToolchainProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolchainProvider")
            .field("language", &(self.descriptor)().language)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ToolchainRegistry {
    providers: HashMap<String, ToolchainProvider>,
    overrides: ToolchainConfigManager,
    scaffold_root: PathBuf,
    runner: ProcessRunner,
}

impl ToolchainRegistry {
    /// Empty registry; nothing is supported until registered.
    pub fn new(scaffold_root: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        Self {
            providers: HashMap::new(),
            overrides: ToolchainConfigManager::default(),
            scaffold_root: scaffold_root.into(),
            runner,
        }
    }

    /// Registry with every built-in language and its aliases.
    pub fn with_defaults(scaffold_root: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        let mut registry = Self::new(scaffold_root, runner);
        for (id, language) in [
            ("cpp", Language::Cpp),
            ("c++", Language::Cpp),
            ("java", Language::Java),
            ("python", Language::Python),
            ("py", Language::Python),
            ("javascript", Language::JavaScript),
            ("js", Language::JavaScript),
        ] {
            registry.register(id, ToolchainProvider::builtin(language));
        }
        registry
    }

    pub fn with_overrides(mut self, overrides: ToolchainConfigManager) -> Self {
        self.overrides = overrides;
        self
    }

    /// Register (or replace) the provider for `language_id`. Ids are case-insensitive.
    pub fn register(&mut self, language_id: &str, provider: ToolchainProvider) {
        self.providers.insert(language_id.to_lowercase(), provider);
    }

    pub fn provider(&self, language_id: &str) -> Result<ToolchainProvider> {
        self.providers
            .get(&language_id.to_lowercase())
            .copied()
            .ok_or_else(|| ExecutorError::UnsupportedLanguage(language_id.to_string()))
    }

    pub fn is_supported(&self, language_id: &str) -> bool {
        self.providers.contains_key(&language_id.to_lowercase())
    }

    /// Registered identifiers, sorted.
    pub fn language_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Effective descriptor for `language_id`, overrides applied.
    pub fn descriptor(&self, language_id: &str) -> Result<ToolchainDescriptor> {
        let provider = self.provider(language_id)?;
        let mut descriptor = (provider.descriptor)();
        if let Some(o) = self.overrides.get(descriptor.language) {
            o.apply(&mut descriptor);
        }
        Ok(descriptor)
    }

    /// Instantiate the toolchain for `language_id`, bound to `workspace_dir`.
    pub fn create(&self, language_id: &str, workspace_dir: &Path, timeout: Duration) -> Result<Toolchain> {
        let provider = self.provider(language_id)?;
        let descriptor = self.descriptor(language_id)?;
        debug!(
            language = %descriptor.language,
            compiled = descriptor.is_compiled(),
            sandbox_profile = ?descriptor.sandbox_profile,
            ceiling = ?self.runner.ceiling().filter(|_| descriptor.apply_resource_ceiling),
            "Creating toolchain"
        );
        let ctx = ToolchainContext::new(
            descriptor,
            workspace_dir,
            &self.scaffold_root,
            timeout,
            self.runner.clone(),
        );
        Ok((provider.build)(ctx))
    }
}
