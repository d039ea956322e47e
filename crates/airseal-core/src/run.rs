//! Per-run identity, run-scoped build directories, and the run state machine.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::source::SourceFile;

/// Image repository namespace for every tag airseal produces.
pub const IMAGE_NAMESPACE: &str = "airseal";

/// Unique identifier of one pipeline run (32 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local image tag: `airseal/<slugified-source-filename>:<run-id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageTag {
    repository: String,
    tag: String,
}

impl ImageTag {
    pub fn for_run(source: &SourceFile, run_id: &RunId) -> Self {
        Self {
            repository: format!("{IMAGE_NAMESPACE}/{}", source.slug()),
            tag: run_id.as_str().to_owned(),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Build-context directory owned by exactly one run:
/// `<build_directory_root>/<slug>-<run_id>/`.
#[derive(Debug)]
pub struct RunWorkspace {
    dir: PathBuf,
}

impl RunWorkspace {
    /// Create the run directory, creating the root if needed.
    ///
    /// Fails if the run directory already exists, so two runs can never
    /// share one.
    pub fn create(build_root: &Path, source: &SourceFile, run_id: &RunId) -> crate::Result<Self> {
        std::fs::create_dir_all(build_root).map_err(|e| crate::Error::BuildRootCreate {
            path: build_root.to_path_buf(),
            source: e,
        })?;

        let dir = build_root.join(format!("{}-{}", source.slug(), run_id));
        std::fs::create_dir(&dir).map_err(|e| crate::Error::RunDirCreate {
            path: dir.clone(),
            source: e,
        })?;

        tracing::debug!(dir = %dir.display(), "run workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn remove(self) -> crate::Result<()> {
        std::fs::remove_dir_all(&self.dir).map_err(|e| crate::Error::RunDirRemove {
            path: self.dir.clone(),
            source: e,
        })
    }
}

/// Stages of one pipeline run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    Uploaded,
    Extracted,
    Filtered,
    Resolved,
    ManifestWritten,
    DefinitionGenerated,
    Building,
    Succeeded,
    Failed,
}

impl RunStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Succeeded | RunStage::Failed)
    }

    /// The stage a successful step moves to.
    pub fn next(self) -> Option<RunStage> {
        match self {
            RunStage::Uploaded => Some(RunStage::Extracted),
            RunStage::Extracted => Some(RunStage::Filtered),
            RunStage::Filtered => Some(RunStage::Resolved),
            RunStage::Resolved => Some(RunStage::ManifestWritten),
            RunStage::ManifestWritten => Some(RunStage::DefinitionGenerated),
            RunStage::DefinitionGenerated => Some(RunStage::Building),
            RunStage::Building => Some(RunStage::Succeeded),
            RunStage::Succeeded | RunStage::Failed => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RunStage::Uploaded => "uploaded",
            RunStage::Extracted => "extracted",
            RunStage::Filtered => "filtered",
            RunStage::Resolved => "resolved",
            RunStage::ManifestWritten => "manifest-written",
            RunStage::DefinitionGenerated => "definition-generated",
            RunStage::Building => "building",
            RunStage::Succeeded => "succeeded",
            RunStage::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One-way run state machine.
///
/// Every non-terminal stage may move to its [`next`](RunStage::next) stage
/// or to [`Failed`](RunStage::Failed). Terminal stages accept nothing.
#[derive(Debug, Clone)]
pub struct RunState {
    history: Vec<RunStage>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            history: vec![RunStage::Uploaded],
        }
    }

    pub fn current(&self) -> RunStage {
        self.history
            .last()
            .copied()
            .unwrap_or(RunStage::Uploaded)
    }

    /// Every stage visited, starting with `Uploaded`.
    pub fn history(&self) -> &[RunStage] {
        &self.history
    }

    pub fn advance(&mut self, to: RunStage) -> crate::Result<()> {
        let from = self.current();
        let allowed = !from.is_terminal() && (to == RunStage::Failed || from.next() == Some(to));
        if !allowed {
            return Err(crate::Error::InvalidTransition { from, to });
        }
        tracing::debug!(%from, %to, "run transition");
        self.history.push(to);
        Ok(())
    }

    /// The last non-terminal stage reached: the stage a failure belongs to.
    pub fn last_active(&self) -> RunStage {
        self.history
            .iter()
            .rev()
            .copied()
            .find(|s| !s.is_terminal())
            .unwrap_or(RunStage::Uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str) -> SourceFile {
        SourceFile::from_bytes(name, b"import os\n".to_vec()).unwrap()
    }

    #[test]
    fn run_ids_are_unique_hex() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn image_tag_format() {
        let run_id = RunId::generate();
        let tag = ImageTag::for_run(&source("My Tool.py"), &run_id);
        assert_eq!(tag.repository(), "airseal/my-tool");
        assert_eq!(tag.to_string(), format!("airseal/my-tool:{run_id}"));
    }

    #[test]
    fn full_happy_path() {
        let mut state = RunState::new();
        let mut stage = RunStage::Uploaded;
        while let Some(next) = stage.next() {
            state.advance(next).unwrap();
            stage = next;
        }
        assert_eq!(state.current(), RunStage::Succeeded);
        assert_eq!(state.history().len(), 8);
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut state = RunState::new();
        let err = state.advance(RunStage::Resolved).unwrap_err();
        assert!(err.to_string().contains("uploaded -> resolved"), "got: {err}");
    }

    #[test]
    fn no_backward_transitions() {
        let mut state = RunState::new();
        state.advance(RunStage::Extracted).unwrap();
        state.advance(RunStage::Filtered).unwrap();
        assert!(state.advance(RunStage::Extracted).is_err());
    }

    #[test]
    fn failed_is_terminal() {
        let mut state = RunState::new();
        state.advance(RunStage::Extracted).unwrap();
        state.advance(RunStage::Failed).unwrap();
        assert_eq!(state.last_active(), RunStage::Extracted);
        assert!(state.advance(RunStage::Filtered).is_err());
        assert!(state.advance(RunStage::Failed).is_err());
    }

    #[test]
    fn succeeded_only_from_building() {
        let mut state = RunState::new();
        assert!(state.advance(RunStage::Succeeded).is_err());
    }
}
