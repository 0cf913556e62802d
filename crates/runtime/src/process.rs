//! Process runner backed by `tokio::process`.

use std::process::Stdio;
use std::time::Instant;

use launcher_core::{InferenceJob, JobOutput, JobRunner, LauncherError, LauncherResult};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Spawns jobs as child processes with piped output.
///
/// The child is killed if it outlives its timeout or if the future running it
/// is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl JobRunner for ProcessRunner {
    async fn run(&self, job: &InferenceJob) -> LauncherResult<JobOutput> {
        info!(
            program = %job.program.display(),
            args = ?job.args_lossy(),
            env = ?job.env,
            "Launching process"
        );

        let mut command = Command::new(&job.program);
        command
            .args(&job.args)
            .envs(&job.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &job.working_dir {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let child = command.spawn().map_err(|source| LauncherError::Launch {
            program: job.program.clone(),
            source,
        })?;

        let output = match job.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| {
                    warn!(timeout_ms = timeout.as_millis() as u64, "Process timed out, killing it");
                    LauncherError::Timeout {
                        ms: timeout.as_millis() as u64,
                    }
                })??,
            None => child.wait_with_output().await?,
        };

        let result = JobOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            code = ?result.code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Process exited"
        );
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_captures_output_and_env() {
        let job = InferenceJob::new("/bin/sh")
            .args(["-c", "echo \"$GREETING\"; echo oops >&2; exit 3"])
            .env("GREETING", "hello");

        let output = ProcessRunner::new().run(&job).await.unwrap();
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let job = InferenceJob::new("/bin/sh")
            .args(["-c", "pwd"])
            .working_dir(dir.path());

        let output = ProcessRunner::new().run(&job).await.unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(output.stdout.trim(), expected.display().to_string());
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let job = InferenceJob::new("/nonexistent/python");
        let err = ProcessRunner::new().run(&job).await.unwrap_err();
        assert!(matches!(err, LauncherError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let job = InferenceJob::new("/bin/sh")
            .args(["-c", "sleep 5"])
            .timeout(Some(Duration::from_millis(100)));

        let start = Instant::now();
        let err = ProcessRunner::new().run(&job).await.unwrap_err();
        assert!(matches!(err, LauncherError::Timeout { ms: 100 }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
