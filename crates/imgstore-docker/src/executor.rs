use std::ffi::OsString;
use std::process::Stdio;

use tokio::process::Command;

use crate::docker::DockerError;

/// Names a docker-compatible binary to use instead of `docker`.
pub const DOCKER_ENV: &str = "IMGSTORE_DOCKER";

/// Runs docker subcommands. Tests substitute a mockall mock.
#[allow(async_fn_in_trait)]
pub trait DockerExecutor: Send + Sync {
    /// Run and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, DockerError>;

    /// Run with output attached to the terminal.
    async fn exec_streaming(&self, args: &[String]) -> Result<(), DockerError>;
}

/// Spawns the docker CLI (or `$IMGSTORE_DOCKER`).
#[derive(Debug, Clone)]
pub struct RealExecutor {
    program: OsString,
}

impl RealExecutor {
    pub fn new() -> Self {
        Self::with_program(std::env::var_os(DOCKER_ENV).unwrap_or_else(|| OsString::from("docker")))
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, args: &[String]) -> Command {
        tracing::debug!(program = ?self.program, ?args, "docker");
        let mut command = Command::new(&self.program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        command
    }
}

impl Default for RealExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, DockerError> {
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| DockerError::NotFound { source: e })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(command_failed(args, stderr));
        }
        String::from_utf8(output.stdout).map_err(|e| DockerError::InvalidUtf8 { source: e })
    }

    async fn exec_streaming(&self, args: &[String]) -> Result<(), DockerError> {
        let status = self
            .command(args)
            .status()
            .await
            .map_err(|e| DockerError::NotFound { source: e })?;

        if status.success() {
            Ok(())
        } else {
            Err(command_failed(args, format!("exited with {status}")))
        }
    }
}

fn command_failed(args: &[String], stderr: String) -> DockerError {
    DockerError::CommandFailed {
        args: args.to_vec(),
        stderr,
    }
}
