use std::path::{Path, PathBuf};
use std::time::Duration;

use airseal_core::{EngineKind, ImageTag};
use tokio::sync::mpsc;

use crate::engine::EngineError;
use crate::executor::{EngineExecutor, RealExecutor};

/// Limit for `version` / `--version` checks.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit for `save` and `rmi`.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Container engine client, parameterized over the executor for testability.
///
/// Every engine invocation is bounded: checks by [`PROBE_TIMEOUT`], `save`
/// and `rmi` by the command timeout, builds by [`BuildRequest::timeout`].
pub struct EngineClient<E: EngineExecutor = RealExecutor> {
    executor: E,
    kind: EngineKind,
    command_timeout: Duration,
}

impl EngineClient<RealExecutor> {
    pub fn new(kind: EngineKind) -> Self {
        Self::with_executor(RealExecutor::new(kind), kind)
    }
}

impl<E: EngineExecutor> EngineClient<E> {
    pub fn with_executor(executor: E, kind: EngineKind) -> Self {
        Self {
            executor,
            kind,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Override the limit applied to `save` and `rmi`.
    pub fn with_command_timeout(mut self, limit: Duration) -> Self {
        self.command_timeout = limit;
        self
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn exec_within(&self, args: Vec<String>, limit: Duration) -> Result<String, EngineError> {
        match tokio::time::timeout(limit, self.executor.exec(&args)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(engine = self.kind.binary(), ?args, "engine command timed out");
                Err(EngineError::TimedOut { args, limit })
            }
        }
    }

    // ── Probe ──

    /// Check that the engine CLI is installed and its daemon answers.
    /// Returns the server version when the engine reports one.
    pub async fn probe(&self) -> Result<String, EngineUnavailableError> {
        let output = self
            .exec_within(args(["version"]), PROBE_TIMEOUT)
            .await
            .map_err(|e| EngineUnavailableError {
                engine: self.kind,
                source: e,
            })?;

        let version = server_version(&output).unwrap_or_else(|| output.trim().to_owned());
        tracing::debug!(engine = self.kind.binary(), %version, "engine available");
        Ok(version)
    }

    // ── Doctor ──

    /// Run all diagnostic checks without early return.
    pub async fn doctor(&self) -> DoctorReport {
        let mut report = DoctorReport::default();

        match self.exec_within(args(["--version"]), PROBE_TIMEOUT).await {
            Ok(v) => report.cli = CheckResult::ok(v.lines().next().unwrap_or("").trim()),
            Err(e) => report.cli = CheckResult::fail(&e.to_string()),
        }

        match self.exec_within(args(["version"]), PROBE_TIMEOUT).await {
            Ok(v) => {
                let version = server_version(&v).unwrap_or_else(|| "reachable".to_owned());
                report.daemon = CheckResult::ok(&version);
            }
            Err(EngineError::CommandFailed { stderr, .. }) => {
                let detail = stderr
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("daemon not reachable");
                report.daemon = CheckResult::fail(detail.trim());
            }
            Err(e) => report.daemon = CheckResult::fail(&e.to_string()),
        }

        report
    }

    // ── Build ──

    /// Build an image, streaming each output line to `on_line` and
    /// collecting the full log in arrival order.
    ///
    /// A non-zero exit or a timeout yields `success = false`; only an engine
    /// that cannot be started is an `Err`. No retries.
    pub async fn build(
        &self,
        request: &BuildRequest<'_>,
        mut on_line: impl FnMut(&str),
    ) -> Result<BuildResult, BuildError> {
        let mut cmd = vec!["build".to_owned()];
        if self.kind == EngineKind::Docker {
            cmd.push("--progress=plain".to_owned());
        }
        cmd.extend([
            "-f".to_owned(),
            path_arg(request.dockerfile)?,
            "-t".to_owned(),
            request.tag.to_string(),
            path_arg(request.context_dir)?,
        ]);

        tracing::info!(engine = self.kind.binary(), tag = %request.tag, "starting image build");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = tokio::time::timeout(request.timeout, self.executor.exec_streaming(&cmd, tx));
        let collect = async {
            let mut log = Vec::new();
            while let Some(line) = rx.recv().await {
                on_line(&line);
                log.push(line);
            }
            log
        };
        let (outcome, log) = tokio::join!(run, collect);

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(EngineError::NotFound { binary, source })) => {
                return Err(BuildError::Unavailable {
                    source: EngineError::NotFound { binary, source },
                });
            }
            Ok(Err(EngineError::CommandFailed { stderr, .. })) => {
                Some(last_diagnostic(&log).unwrap_or(stderr))
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(_elapsed) => Some(format!(
                "build timed out after {}s",
                request.timeout.as_secs()
            )),
        };

        match &failure {
            None => tracing::info!(tag = %request.tag, lines = log.len(), "image built"),
            Some(message) => tracing::warn!(tag = %request.tag, %message, "image build failed"),
        }

        Ok(BuildResult {
            image_tag: request.tag.to_string(),
            success: failure.is_none(),
            log,
            error_message: failure,
        })
    }

    // ── Export ──

    /// Save `tag` into a single archive file (`<engine> save -o`).
    pub async fn export(&self, tag: &ImageTag, archive: &Path) -> Result<(), ExportError> {
        let archive_str = archive
            .to_str()
            .ok_or_else(|| ExportError::InvalidPath(archive.to_path_buf()))?;
        let tag = tag.to_string();

        self.exec_within(args(["save", "-o", archive_str, &tag]), self.command_timeout)
            .await
            .map_err(|e| ExportError::Save {
                path: archive.to_path_buf(),
                source: e,
            })?;

        tracing::info!(%tag, archive = %archive.display(), "image exported");
        Ok(())
    }

    pub async fn remove_image(&self, tag: &ImageTag) -> Result<(), EngineError> {
        let tag = tag.to_string();
        self.exec_within(args(["rmi", &tag]), self.command_timeout)
            .await?;
        tracing::debug!(%tag, "image removed");
        Ok(())
    }
}

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

fn path_arg(path: &Path) -> Result<String, BuildError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| BuildError::InvalidPath(path.to_path_buf()))
}

/// `Version:` from the `Server:` section of `<engine> version` output.
/// Falls back to the first `Version:` line (podman prints no sections).
fn server_version(output: &str) -> Option<String> {
    let version_of = |section: &str| {
        section
            .lines()
            .find_map(|l| l.trim().strip_prefix("Version:"))
            .map(|v| v.trim().to_owned())
    };
    match output.split_once("Server:") {
        Some((_, server)) => version_of(server),
        None => version_of(output),
    }
}

/// Last line mentioning an error, else the last non-blank line.
fn last_diagnostic(log: &[String]) -> Option<String> {
    log.iter()
        .rev()
        .find(|l| l.to_ascii_lowercase().contains("error"))
        .or_else(|| log.iter().rev().find(|l| !l.trim().is_empty()))
        .map(|l| l.trim().to_owned())
}

/// Inputs for one build invocation.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub context_dir: &'a Path,
    pub dockerfile: &'a Path,
    pub tag: &'a ImageTag,
    pub timeout: Duration,
}

/// Terminal outcome of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub image_tag: String,
    pub success: bool,
    /// stdout and stderr lines, in arrival order.
    pub log: Vec<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub cli: CheckResult,
    pub daemon: CheckResult,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.cli.passed && self.daemon.passed
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

// ── Error types ──

#[derive(Debug, thiserror::Error)]
#[error("container engine `{}` is unavailable", .engine.binary())]
pub struct EngineUnavailableError {
    pub engine: EngineKind,
    pub source: EngineError,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("container engine could not be started")]
    Unavailable { source: EngineError },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("archive path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("failed to save image to {path}")]
    Save { path: PathBuf, source: EngineError },
}
