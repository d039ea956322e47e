use std::process::Stdio;

use airseal_core::EngineKind;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::EngineError;

/// Abstraction over container engine CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait EngineExecutor: Send + Sync {
    /// Execute an engine command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, EngineError>;

    /// Execute an engine command, sending every stdout/stderr line to
    /// `lines` as it arrives. A non-zero exit is `CommandFailed`.
    async fn exec_streaming(
        &self,
        args: &[String],
        lines: UnboundedSender<String>,
    ) -> Result<(), EngineError>;
}

/// Real engine CLI executor.
///
/// Child processes are killed when the returned future is dropped, so a
/// timed-out or abandoned build does not leave the client running.
pub struct RealExecutor {
    binary: String,
}

impl RealExecutor {
    pub fn new(kind: EngineKind) -> Self {
        Self::with_binary(kind.binary())
    }

    /// Use an explicit binary name or path.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command(&self, args: &[String]) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn not_found(&self, source: std::io::Error) -> EngineError {
        EngineError::NotFound {
            binary: self.binary.clone(),
            source,
        }
    }
}

impl EngineExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, EngineError> {
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| self.not_found(e))?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| EngineError::InvalidUtf8 { source: e })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(EngineError::CommandFailed {
                args: args.to_vec(),
                stderr,
            })
        }
    }

    async fn exec_streaming(
        &self,
        args: &[String],
        lines: UnboundedSender<String>,
    ) -> Result<(), EngineError> {
        let mut child = self.command(args).spawn().map_err(|e| self.not_found(e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (out, err) = tokio::join!(
            forward_lines(stdout, &lines),
            forward_lines(stderr, &lines)
        );
        out.and(err)
            .map_err(|e| EngineError::Output { source: e })?;

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Output { source: e })?;

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::CommandFailed {
                args: args.to_vec(),
                stderr: format!("exit status: {status}"),
            })
        }
    }
}

/// Forward `stream` line by line until EOF or until the receiver is gone.
/// Invalid UTF-8 is replaced rather than aborting the build log.
async fn forward_lines<R: AsyncRead + Unpin>(
    stream: Option<R>,
    tx: &UnboundedSender<String>,
) -> std::io::Result<()> {
    let Some(stream) = stream else {
        return Ok(());
    };
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\n', '\r'])
            .to_owned();
        if tx.send(line).is_err() {
            return Ok(());
        }
    }
}
