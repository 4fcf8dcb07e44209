//! External process execution for command-backed checks.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::check::CheckError;

/// Captured result of one process run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, -1 when killed by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last non-empty stdout line, trimmed.
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
    }

    /// Error text for a failed run: stderr, or stdout when stderr is empty.
    pub fn error_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs argv vectors with a timeout.
pub struct CommandRunner;

impl CommandRunner {
    /// Execute `argv` on behalf of check `name`. A zero timeout waits forever.
    pub async fn execute(
        name: &str,
        argv: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, CheckError> {
        let start = Instant::now();

        let Some((program, args)) = argv.split_first() else {
            return Err(CheckError::EmptyCommand {
                name: name.to_string(),
            });
        };
        debug!(check = name, program = %program, "spawning");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CheckError::Spawn {
                program: program.clone(),
                source,
            })?;

        let wait = child.wait_with_output();
        let output = if timeout.is_zero() {
            wait.await
        } else {
            tokio::time::timeout(timeout, wait)
                .await
                .map_err(|_| CheckError::TimedOut {
                    name: name.to_string(),
                    seconds: timeout.as_secs(),
                })?
        }
        .map_err(|e| CheckError::Execution {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
