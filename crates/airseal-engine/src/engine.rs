#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("container engine `{binary}` not found on PATH (install docker or podman)")]
    NotFound {
        binary: String,
        source: std::io::Error,
    },

    #[error("engine command failed: {args:?}\n{stderr}")]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("engine command timed out after {}s: {args:?}", .limit.as_secs())]
    TimedOut {
        args: Vec<String>,
        limit: std::time::Duration,
    },

    #[error("engine output was not valid UTF-8")]
    InvalidUtf8 { source: std::string::FromUtf8Error },

    #[error("failed to read engine output")]
    Output { source: std::io::Error },
}
