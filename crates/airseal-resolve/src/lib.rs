//! Dependency inference for a single Python source file.
//!
//! # Analysis pipeline
//!
//! ```text
//! SourceFile
//!   1. Extract  ── extract_imports()   → ImportSet (top-level names)
//!   2. Filter   ── filter_stdlib()     → third-party candidates
//!   3. Resolve  ── Resolver::resolve() → Vec<ResolvedDependency>
//! ```
//!
//! Extraction never executes the source. Filtering uses a fixed snapshot
//! of the CPython standard library (see [`stdlib`]). Resolution queries a
//! [`PackageIndex`] with a bounded timeout per lookup and falls back to a
//! small alias table for import names that differ from their distribution
//! names.

pub mod alias;
pub mod extract;
pub mod index;
pub mod resolver;
pub mod stdlib;

pub use extract::{ImportSet, extract_imports, scan_imports};
pub use index::{ClientBuildError, IndexError, PackageIndex, PackageInfo, PypiIndex};
pub use resolver::{Resolution, ResolutionWarning, ResolvedDependency, Resolver, UnresolvedReason};
pub use stdlib::{FilterOutcome, filter_stdlib, is_stdlib};
