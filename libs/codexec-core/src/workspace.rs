//! Per-request workspace directories.
//!
//! Layout: `{workspace_root}/executor/{token}`. The token is unique per
//! request, so concurrent requests sharing a root never collide and no
//! locking is needed.

use codexec_common::types::CleanupPolicy;
use codexec_common::{ExecutorError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXECUTOR_SUBDIR: &str = "executor";

/// Generate a fresh workspace token.
pub fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Resolve a possibly relative workspace root against the current directory.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    if root.is_absolute() {
        return Ok(root.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| ExecutorError::Workspace {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(root))
}

/// Scoped workspace. Released exactly once: explicitly via [`Workspace::release`]
/// or, on any early exit, when dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    token: String,
    policy: CleanupPolicy,
    released: bool,
}

impl Workspace {
    /// Create `{root}/executor/{token}` and all of its ancestors.
    pub fn acquire(root: &Path, token: &str, policy: CleanupPolicy) -> Result<Self> {
        let dir = resolve_root(root)?.join(EXECUTOR_SUBDIR).join(token);
        fs::create_dir_all(&dir).map_err(|source| ExecutorError::Workspace {
            path: dir.clone(),
            source,
        })?;
        debug!(workspace = %dir.display(), policy = %policy, "Workspace acquired");
        Ok(Self {
            dir,
            token: token.to_string(),
            policy,
            released: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn policy(&self) -> CleanupPolicy {
        self.policy
    }

    /// Apply the cleanup policy. Never fails: removal errors are ignored.
    pub fn release(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.policy {
            CleanupPolicy::None => {
                debug!(workspace = %self.dir.display(), "Workspace kept");
            }
            CleanupPolicy::HashOnly => {
                remove_dir_quietly(&self.dir);
            }
            CleanupPolicy::SafeAll => {
                remove_dir_quietly(&self.dir);
                // Only succeeds when empty; siblings still being populated keep it alive.
                if let Some(parent) = self.dir.parent() {
                    if fs::remove_dir(parent).is_ok() {
                        debug!(dir = %parent.display(), "Removed empty workspace parent");
                    }
                }
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_dir_quietly(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!(workspace = %dir.display(), "Workspace removed"),
        Err(e) => warn!(workspace = %dir.display(), error = %e, "Failed to remove workspace"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_nested_directories() {
        let base = TempDir::new().unwrap();
        let root = base.path().join("deep").join("root");
        let ws = Workspace::acquire(&root, "abc", CleanupPolicy::None).unwrap();
        assert!(ws.dir().is_dir());
        assert_eq!(ws.dir(), root.join("executor").join("abc"));
        assert_eq!(ws.token(), "abc");
    }

    #[test]
    fn test_policy_none_keeps_files() {
        let base = TempDir::new().unwrap();
        let ws = Workspace::acquire(base.path(), &new_token(), CleanupPolicy::None).unwrap();
        let dir = ws.dir().to_path_buf();
        fs::write(dir.join("solution.py"), "pass").unwrap();
        ws.release();
        assert!(dir.join("solution.py").is_file());
    }

    #[test]
    fn test_policy_hash_only_removes_own_dir() {
        let base = TempDir::new().unwrap();
        let ws = Workspace::acquire(base.path(), &new_token(), CleanupPolicy::HashOnly).unwrap();
        assert_eq!(ws.policy(), CleanupPolicy::HashOnly);
        let dir = ws.dir().to_path_buf();
        fs::write(dir.join("testcase.json"), "{}").unwrap();
        ws.release();
        assert!(!dir.exists());
        assert!(base.path().join("executor").is_dir());
    }

    #[test]
    fn test_policy_safe_all_removes_empty_parent() {
        let base = TempDir::new().unwrap();
        let ws = Workspace::acquire(base.path(), &new_token(), CleanupPolicy::SafeAll).unwrap();
        let dir = ws.dir().to_path_buf();
        ws.release();
        assert!(!dir.exists());
        assert!(!base.path().join("executor").exists());
    }

    #[test]
    fn test_policy_safe_all_keeps_busy_parent() {
        let base = TempDir::new().unwrap();
        let other = Workspace::acquire(base.path(), "other", CleanupPolicy::None).unwrap();
        let ws = Workspace::acquire(base.path(), "mine", CleanupPolicy::SafeAll).unwrap();
        ws.release();
        assert!(other.dir().is_dir());
    }

    #[test]
    fn test_drop_releases_on_early_exit() {
        let base = TempDir::new().unwrap();
        let dir = {
            let ws = Workspace::acquire(base.path(), &new_token(), CleanupPolicy::HashOnly).unwrap();
            ws.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: std::collections::HashSet<_> = (0..64).map(|_| new_token()).collect();
        assert_eq!(tokens.len(), 64);
    }
}
