//! Manifest and Dockerfile generation for airseal.
//!
//! # Build context layout
//!
//! ```text
//! <run dir>/
//!   requirements.txt   ── ManifestWriter::write() → Manifest::render()
//!   Dockerfile         ── DockerfileGenerator::render()
//!   <source file>      ── copied verbatim
//! ```
//!
//! The Dockerfile only installs from `requirements.txt` when the manifest
//! has entries, then sets `PIP_NO_INDEX=1` so nothing in the running
//! container reaches for a package index.

pub mod context;
pub mod dockerfile;
pub mod manifest;

pub use context::{BuildContext, ContextError, write_build_context};
pub use dockerfile::{DefinitionError, DockerfileGenerator, ImageDefinition};
pub use manifest::{
    Manifest, ManifestEntry, ManifestIncompleteError, ManifestOutcome, ManifestParseError,
    ManifestWriter,
};
