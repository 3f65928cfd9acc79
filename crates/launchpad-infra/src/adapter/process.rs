//! Child process execution shared by the CLI-tool adapters.
//!
//! Children inherit the step's resolved environment and working directory,
//! never read stdin, and run in their own process group. Dropping an attempt
//! (timeout, cancellation) kills the whole group, so tools started by a shell
//! command line go down with it, and a terminal Ctrl-C reaches only the CLI.
//! Output is captured so failures can report a masked tail.

use std::path::Path;
use std::process::Stdio;

use launchpad_core::pipeline::adapter::StepInvocation;
use launchpad_core::pipeline::context::SecretMasker;
use launchpad_types::error::AdapterError;

/// Lines of output kept in failure details.
pub const TAIL_LINES: usize = 20;

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last lines of output with secrets masked. Stderr is preferred since
    /// that is where tools report errors.
    pub fn tail(&self, masker: &SecretMasker) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source.trim_end().lines().collect();
        let start = lines.len().saturating_sub(TAIL_LINES);
        masker.mask(&lines[start..].join("\n"))
    }

    /// Failure detail: masked tail, or the exit status when there is no output.
    pub fn failure_detail(&self, masker: &SecretMasker) -> String {
        let tail = self.tail(masker);
        if !tail.is_empty() {
            return tail;
        }
        match self.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Run `program` with `args` in `cwd` using the invocation's environment.
pub async fn run_process(
    invocation: &StepInvocation<'_>,
    program: &str,
    args: &[String],
    cwd: &Path,
) -> Result<ProcessOutput, AdapterError> {
    let masker = invocation.masker();
    tracing::debug!(
        program,
        args = %masker.mask(&args.join(" ")),
        cwd = %cwd.display(),
        attempt = invocation.attempt,
        "spawning process"
    );

    let mut command = tokio::process::Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .envs(invocation.env.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|e| AdapterError::Spawn {
        program: program.to_string(),
        detail: masker.mask(&e.to_string()),
    })?;
    let mut group = GroupGuard::new(child.id());

    let output = child.wait_with_output().await.map_err(|e| AdapterError::Spawn {
        program: program.to_string(),
        detail: masker.mask(&e.to_string()),
    })?;
    group.disarm();

    let result = ProcessOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    tracing::debug!(program, exit_code = ?result.exit_code, "process exited");
    Ok(result)
}

/// Kills a child's process group when dropped before `disarm`.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        #[cfg(unix)]
        {
            // SAFETY: kill(2) has no memory-safety preconditions; a negative
            // pid addresses the group created by `process_group(0)`.
            let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
            tracing::debug!(pgid, delivered = rc == 0, "killed process group");
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }
}

/// Run a shell command line through `sh -c`.
pub async fn run_shell(
    invocation: &StepInvocation<'_>,
    command: &str,
    cwd: &Path,
) -> Result<ProcessOutput, AdapterError> {
    run_process(invocation, "sh", &["-c".to_string(), command.to_string()], cwd).await
}

/// Ensure the step's working directory exists before spawning into it.
pub async fn ensure_dir(dir: &Path) -> Result<(), AdapterError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AdapterError::Spawn {
            program: "mkdir".to_string(),
            detail: format!("cannot create {}: {e}", dir.display()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::adapter::testing::Harness;
    use launchpad_types::workflow::{ParamValue, StepSpec};

    fn output(stdout: &str, stderr: &str, code: Option<i32>) -> ProcessOutput {
        ProcessOutput {
            exit_code: code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn tail_prefers_stderr_and_keeps_last_lines() {
        let stderr: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        let out = output("ignored", &stderr, Some(1));
        let tail = out.tail(&SecretMasker::empty());
        assert!(tail.starts_with("line 11"));
        assert!(tail.ends_with("line 30"));
        assert_eq!(tail.lines().count(), TAIL_LINES);
    }

    #[test]
    fn failure_detail_without_output_reports_status() {
        let out = output("", "  \n", Some(2));
        assert_eq!(
            out.failure_detail(&SecretMasker::empty()),
            "exited with status 2"
        );
        assert!(!output("", "", Some(0)).failure_detail(&SecretMasker::empty()).is_empty());
    }

    #[tokio::test]
    async fn run_shell_uses_step_env_and_masks_output() {
        let tmp = tempfile::tempdir().unwrap();
        let step = StepSpec::new("echo", "command")
            .env_var("GREETING", ParamValue::literal("hello"))
            .env_var("TOKEN", ParamValue::secret("API_TOKEN"));
        let harness = Harness::new(step, &[("API_TOKEN", "tok-999")], tmp.path()).await;
        let invocation = harness.invocation();

        let out = run_shell(&invocation, "echo $GREETING; echo $TOKEN >&2; exit 4", tmp.path())
            .await
            .unwrap();

        assert_eq!(out.exit_code, Some(4));
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.tail(invocation.masker()), "***");
    }

    /// True once `pid` is gone or only a zombie awaiting its reaper.
    #[cfg(target_os = "linux")]
    fn process_gone(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropped_attempt_kills_grandchildren() {
        let tmp = tempfile::tempdir().unwrap();
        let harness = Harness::new(StepSpec::new("slow", "command"), &[], tmp.path()).await;
        let invocation = harness.invocation();
        let pid_file = tmp.path().join("sleep.pid");

        let attempt = run_shell(&invocation, "sleep 30 & echo $! > sleep.pid; wait", tmp.path());
        let timed_out = tokio::time::timeout(Duration::from_millis(500), attempt).await;
        assert!(timed_out.is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        let mut gone = false;
        for _ in 0..40 {
            if process_gone(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(gone, "background sleep {pid} survived the timed out attempt");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let harness = Harness::new(StepSpec::new("x", "command"), &[], tmp.path()).await;
        let err = run_process(
            &harness.invocation(),
            "launchpad-definitely-not-a-program",
            &[],
            tmp.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AdapterError::Spawn { .. }));
    }
}
