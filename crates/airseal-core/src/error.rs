use std::path::PathBuf;

use crate::run::RunStage;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config value for `{key}`: {reason}")]
    ConfigInvalid { key: &'static str, reason: String },

    // ── Run workspace ──
    #[error("failed to create build directory root {path}")]
    BuildRootCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create run directory {path}")]
    RunDirCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove run directory {path}")]
    RunDirRemove {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Run state machine ──
    #[error("invalid run transition {from} -> {to}")]
    InvalidTransition { from: RunStage, to: RunStage },
}
