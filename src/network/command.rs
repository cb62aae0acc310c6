//! Runs collaborator binaries.
//!
//! The governance client and the Candid-to-JSON converter are external
//! programs. Each invocation is bounded by a timeout and its output captured.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{NetworkError, Result};

/// Default timeout for a single command in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,
    /// Command output (stdout).
    pub stdout: String,
    /// Command error output (stderr).
    pub stderr: String,
    /// Exit code if available.
    pub exit_code: Option<i32>,
}

/// Spawns collaborator binaries with a per-call timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    /// Maximum time a single command may run.
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS))
    }
}

impl CommandRunner {
    /// Creates a runner with the given per-command timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs `program` with `args`, optionally feeding `stdin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started, its input cannot be
    /// written, or it runs past the timeout.
    pub async fn run(
        &self,
        program: &Path,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<CommandResult> {
        let name = program.display().to_string();
        debug!("Running {name} {}", args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| NetworkError::Spawn {
            program: name.clone(),
            message: e.to_string(),
        })?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input)
                .await
                .map_err(|e| NetworkError::transport(format!("Failed to write to {name}: {e}")))?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                NetworkError::transport(format!("{name} timed out after {:?}", self.timeout))
            })?
            .map_err(|e| NetworkError::transport(format!("Failed to wait for {name}: {e}")))?;

        let result = CommandResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        trace!("{name} exited with {:?}", result.exit_code);

        Ok(result)
    }

    /// Runs a command and returns its stdout, failing on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::CommandFailed`] if the command exits unsuccessfully,
    /// or any error from [`CommandRunner::run`].
    pub async fn run_checked(
        &self,
        program: &Path,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> Result<String> {
        let result = self.run(program, args, stdin).await?;

        if result.success {
            Ok(result.stdout)
        } else {
            Err(NetworkError::CommandFailed {
                program: program.display().to_string(),
                status: result
                    .exit_code
                    .map_or_else(|| String::from("signal"), |c| format!("exit code {c}")),
                stderr: result.stderr.trim().to_string(),
            }
            .into())
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::UpgradeOrdersError;

    #[tokio::test]
    async fn test_captures_stdout_and_feeds_stdin() {
        let runner = CommandRunner::default();
        let out = runner
            .run_checked(Path::new("cat"), &[], Some(b"candid text"))
            .await
            .unwrap();
        assert_eq!(out, "candid text");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_command_failure() {
        let runner = CommandRunner::default();
        let err = runner
            .run_checked(Path::new("false"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpgradeOrdersError::Network(NetworkError::CommandFailed { .. })
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let runner = CommandRunner::default();
        let err = runner
            .run(Path::new("/nonexistent/governance-client"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpgradeOrdersError::Network(NetworkError::Spawn { .. })
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = CommandRunner::new(Duration::from_millis(50));
        let err = runner
            .run(Path::new("sleep"), &[String::from("5")], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
