use crate::docker::DockerError;
use crate::executor::{DockerExecutor, RealExecutor};
use std::path::Path;

/// Local docker operations, parameterized over the executor for testability.
pub struct DockerClient<E: DockerExecutor = RealExecutor> {
    executor: E,
}

impl DockerClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor::new(),
        }
    }
}

impl Default for DockerClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DockerExecutor> DockerClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Build ──

    /// Build the bundle directory into an image tagged `image_tag`.
    ///
    /// Output is streamed to the terminal. A failed build leaves no tag behind.
    pub async fn build(&self, bundle_dir: &Path, image_tag: &str) -> Result<(), BuildError> {
        let bundle_str = bundle_dir
            .to_str()
            .ok_or_else(|| BuildError::InvalidPath(bundle_dir.to_path_buf()))?;

        tracing::info!(tag = image_tag, context = bundle_str, "docker build");
        self.executor
            .exec_streaming(&args(["build", "--tag", image_tag, bundle_str]))
            .await
            .map_err(|e| BuildError::Build { source: e })
    }

    /// Image ID of a local tag.
    pub async fn image_id(&self, image_tag: &str) -> Result<String, BuildError> {
        let output = self
            .executor
            .exec(&args(["image", "inspect", image_tag, "--format", "{{.Id}}"]))
            .await
            .map_err(|e| BuildError::Inspect { source: e })?;

        Ok(output.trim().to_owned())
    }

    // ── Doctor ──

    /// Check the docker CLI and daemon without early return.
    ///
    /// Project checks are appended by the caller.
    pub async fn doctor(&self) -> DoctorReport {
        let mut report = DoctorReport::default();

        // 1. docker CLI
        match self
            .executor
            .exec(&args(["version", "--format", "{{.Client.Version}}"]))
            .await
        {
            Ok(v) => report.docker = CheckResult::ok(v.trim()),
            Err(DockerError::NotFound { .. }) => {
                report.docker = CheckResult::fail("docker CLI not installed");
                report.daemon = CheckResult::fail("skipped (no docker CLI)");
                return report;
            }
            // The client prints its version even when the daemon is down
            Err(DockerError::CommandFailed { .. }) => {
                report.docker = CheckResult::ok("installed");
            }
            Err(e) => report.docker = CheckResult::fail(&e.to_string()),
        }

        // 2. Daemon reachable
        match self
            .executor
            .exec(&args(["info", "--format", "{{.ServerVersion}}"]))
            .await
        {
            Ok(v) if !v.trim().is_empty() => {
                report.daemon = CheckResult::ok(&format!("server {}", v.trim()));
            }
            _ => report.daemon = CheckResult::fail("daemon not reachable — is docker running?"),
        }

        report
    }
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

// ── Doctor types ──

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub docker: CheckResult,
    pub daemon: CheckResult,
    pub project: Vec<NamedCheck>,
}

impl DoctorReport {
    pub fn push(&mut self, name: &str, result: CheckResult) {
        self.project.push(NamedCheck {
            name: name.to_owned(),
            result,
        });
    }

    pub fn all_passed(&self) -> bool {
        self.docker.passed && self.daemon.passed && self.project.iter().all(|c| c.result.passed)
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}

#[derive(Debug, Clone)]
pub struct NamedCheck {
    pub name: String,
    pub result: CheckResult,
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("bundle path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),

    #[error("docker build failed")]
    Build { source: DockerError },

    #[error("failed to inspect image")]
    Inspect { source: DockerError },
}

impl std::fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for check in &self.project {
            write_row(f, &check.name, &check.result)?;
        }
        write_row(f, "docker CLI", &self.docker)?;
        write_row(f, "docker daemon", &self.daemon)
    }
}

fn write_row(f: &mut std::fmt::Formatter<'_>, name: &str, result: &CheckResult) -> std::fmt::Result {
    writeln!(f, "  {:<16} {}  {}", name, result.icon(), result.detail)
}
