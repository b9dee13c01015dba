//! Bounded process runner.
//!
//! Runs one shell command line with a hard wall-clock budget and fully
//! buffered stdout/stderr capture. On timeout the whole process group is
//! killed, stdout is discarded and stderr becomes [`TIMEOUT_MARKER`].

use codexec_common::types::TIMEOUT_MARKER;
use codexec_common::{ExecutorError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Budget for compile-phase commands. Compilation is a one-time cost paid to a
/// trusted toolchain, so this is far above any execute timeout.
pub const COMPILE_BUDGET: Duration = Duration::from_secs(8000);

const SHELL: &str = "/bin/sh";

/// Address-space and CPU-time caps applied to the spawned tree before the
/// target program starts. Best effort: no cgroup backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceCeiling {
    pub address_space_bytes: u64,
    pub cpu_time_secs: u64,
}

impl ResourceCeiling {
    pub fn new(memory_mb: u64, cpu_time_secs: u64) -> Self {
        Self {
            address_space_bytes: memory_mb * 1024 * 1024,
            cpu_time_secs,
        }
    }
}

/// Per-invocation knobs.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Install the runner's resource ceiling through the pre-exec hook.
    pub apply_ceiling: bool,
}

/// Raw result of one child process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    /// Exit code, `128 + signal` when killed by a signal, `None` on timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    ceiling: Option<ResourceCeiling>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ceiling(mut self, ceiling: Option<ResourceCeiling>) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn ceiling(&self) -> Option<ResourceCeiling> {
        self.ceiling
    }

    /// Run `command_line` through `/bin/sh -c` within `budget`.
    pub async fn run(
        &self,
        command_line: &str,
        budget: Duration,
        options: &RunOptions,
    ) -> Result<ProcessOutput> {
        let mut cmd = Command::new(SHELL);
        cmd.arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        #[cfg(unix)]
        {
            cmd.process_group(0);
            if options.apply_ceiling {
                if let Some(ceiling) = self.ceiling {
                    // SAFETY: the closure only calls setrlimit, which is async-signal-safe.
                    unsafe {
                        cmd.pre_exec(move || apply_ceiling(ceiling));
                    }
                }
            }
        }

        let start = Instant::now();
        let child = cmd.spawn().map_err(|source| ExecutorError::Spawn {
            command: command_line.to_string(),
            source,
        })?;
        let pid = child.id();

        debug!(pid = ?pid, budget_ms = budget.as_millis() as u64, command = %command_line, "Spawned");

        match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = exit_code_of(&output.status);
                Ok(ProcessOutput {
                    exit_code,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    timed_out: false,
                    elapsed: start.elapsed(),
                })
            }
            Ok(Err(source)) => Err(ExecutorError::Wait {
                command: command_line.to_string(),
                source,
            }),
            Err(_) => {
                // The child handle is gone (kill_on_drop); take the grandchildren with it.
                if let Some(pid) = pid {
                    kill_group(pid);
                }
                warn!(
                    pid = ?pid,
                    budget_ms = budget.as_millis() as u64,
                    "Process exceeded time budget, killed"
                );
                Ok(ProcessOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: TIMEOUT_MARKER.to_string(),
                    timed_out: true,
                    elapsed: start.elapsed(),
                })
            }
        }
    }
}

fn exit_code_of(status: &std::process::ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.code().or_else(|| status.signal().map(|s| 128 + s))
    }
    #[cfg(not(unix))]
    {
        status.code()
    }
}

#[cfg(unix)]
fn apply_ceiling(ceiling: ResourceCeiling) -> std::io::Result<()> {
    use nix::libc::rlim_t;
    use nix::sys::resource::{setrlimit, Resource};

    let bytes = ceiling.address_space_bytes as rlim_t;
    setrlimit(Resource::RLIMIT_AS, bytes, bytes)?;
    let secs = ceiling.cpu_time_secs as rlim_t;
    setrlimit(Resource::RLIMIT_CPU, secs, secs)?;
    Ok(())
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, error = %e, "Process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_stderr_and_exit_code() {
        let out = ProcessRunner::new()
            .run("echo hello; echo oops >&2; exit 3", Duration::from_secs(5), &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr, "oops\n");
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn test_shell_syntax_is_interpreted() {
        let options = RunOptions {
            env: vec![("CODEXEC_GREETING".to_string(), "hi there".to_string())],
            ..Default::default()
        };
        let out = ProcessRunner::new()
            .run("printf '%s' \"$CODEXEC_GREETING\"", Duration::from_secs(5), &options)
            .await
            .unwrap();
        assert_eq!(out.stdout, "hi there");
    }

    #[tokio::test]
    async fn test_timeout_discards_stdout_and_marks_stderr() {
        let start = Instant::now();
        let out = ProcessRunner::new()
            .run("echo partial; sleep 30", Duration::from_millis(300), &RunOptions::default())
            .await
            .unwrap();
        assert!(out.timed_out);
        assert_eq!(out.exit_code, None);
        assert_eq!(out.stdout, "");
        assert_eq!(out.stderr, TIMEOUT_MARKER);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_elapsed_covers_run_and_timeout() {
        let runner = ProcessRunner::new();
        let out = runner
            .run("sleep 0.2", Duration::from_secs(5), &RunOptions::default())
            .await
            .unwrap();
        assert!(out.elapsed >= Duration::from_millis(200));

        let out = runner
            .run("sleep 30", Duration::from_millis(300), &RunOptions::default())
            .await
            .unwrap();
        assert!(out.elapsed >= Duration::from_millis(300));
        assert!(out.elapsed < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_runs_in_requested_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let options = RunOptions {
            cwd: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        ProcessRunner::new()
            .run("touch staged.txt", Duration::from_secs(5), &options)
            .await
            .unwrap();
        assert!(dir.path().join("staged.txt").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_death_maps_to_128_plus_signal() {
        let out = ProcessRunner::new()
            .run("kill -9 $$", Duration::from_secs(5), &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(128 + 9));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ceiling_applies_cpu_limit() {
        let runner = ProcessRunner::new().with_ceiling(Some(ResourceCeiling::new(512, 7)));
        let options = RunOptions {
            apply_ceiling: true,
            ..Default::default()
        };
        let out = runner
            .run("ulimit -t", Duration::from_secs(5), &options)
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "7");

        let unlimited = runner
            .run("ulimit -t", Duration::from_secs(5), &RunOptions::default())
            .await
            .unwrap();
        assert_ne!(unlimited.stdout.trim(), "7");
    }
}
