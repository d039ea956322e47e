//! Core types and configuration for airseal.
//!
//! This crate defines the `airseal.toml` schema ([`AirsealConfig`]), the
//! uploaded [`SourceFile`], per-run identity ([`RunId`], [`ImageTag`]),
//! run-scoped build directories ([`RunWorkspace`]), the one-way run state
//! machine ([`RunState`]), and shared error types.

pub mod config;
pub mod error;
pub mod run;
pub mod source;

pub use config::{AirsealConfig, BuildConfig, EngineKind, PinStrategy, ResolveConfig, Runtime};
pub use error::{Error, Result};
pub use run::{ImageTag, RunId, RunStage, RunState, RunWorkspace};
pub use source::{ExtractionError, SourceFile};
