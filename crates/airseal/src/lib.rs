//! Build airgapped container images from a single Python source file.
//!
//! This is the unified facade crate that re-exports the airseal sub-crates
//! and adds the [`pipeline`] orchestrator on top of them.
//!
//! # Feature flags
//!
//! | Feature | Default | Crate | Description |
//! |---------|---------|-------|-------------|
//! | `core` | yes | `airseal-core` | Configuration, source files, run identity and state |
//! | `resolve` | yes | `airseal-resolve` | Import extraction, stdlib filter, PyPI resolution |
//! | `build` | yes | `airseal-build` | requirements.txt and Dockerfile generation |
//! | `engine` | yes | `airseal-engine` | docker / podman build, export and probe |
//! | `pipeline` | yes | (this crate) | End-to-end run: upload to image |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use airseal::{AirsealConfig, SourceFile};
//! use airseal::pipeline::{Pipeline, RunOptions};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AirsealConfig::load(Path::new("."))?;
//! let source = SourceFile::read(Path::new("app.py"))?;
//! let pipeline = Pipeline::new(config)?;
//! let report = pipeline
//!     .run(source, &RunOptions::default(), |line| println!("{line}"))
//!     .await;
//! println!("{}", report.outcome);
//! # Ok(())
//! # }
//! ```

// Core types flattened into root namespace for convenience.
#[cfg(feature = "core")]
pub use airseal_core::*;

/// Import extraction, standard-library filtering and package resolution.
#[cfg(feature = "resolve")]
pub mod resolve {
    pub use airseal_resolve::*;
}

/// Manifest, Dockerfile and build-context generation.
#[cfg(feature = "build")]
pub mod build {
    pub use airseal_build::*;
}

/// Container engine operations.
#[cfg(feature = "engine")]
pub mod engine {
    pub use airseal_engine::*;
}

#[cfg(feature = "pipeline")]
pub mod pipeline;
