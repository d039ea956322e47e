pub mod client;
pub mod engine;
pub mod executor;

pub use client::{
    BuildError, BuildRequest, BuildResult, CheckResult, DEFAULT_COMMAND_TIMEOUT, DoctorReport,
    EngineClient, EngineUnavailableError, ExportError, PROBE_TIMEOUT,
};
pub use engine::EngineError;
pub use executor::{EngineExecutor, RealExecutor};
