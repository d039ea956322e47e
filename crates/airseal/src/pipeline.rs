//! End-to-end run: source file → extract → filter → resolve → manifest →
//! Dockerfile → build → optional export.
//!
//! Stages run strictly in order within one run. Each run gets its own
//! [`RunId`], image tag and build directory, so concurrent runs only share
//! the build-directory root.

use std::fmt;
use std::path::{Path, PathBuf};

use airseal_build::{
    BuildContext, ContextError, DefinitionError, DockerfileGenerator, ImageDefinition, Manifest,
    ManifestIncompleteError, ManifestOutcome, ManifestWriter, write_build_context,
};
use airseal_core::{
    AirsealConfig, ExtractionError, ImageTag, RunId, RunStage, RunState, RunWorkspace, SourceFile,
};
use airseal_engine::{
    BuildError, BuildRequest, BuildResult, EngineClient, EngineExecutor, EngineUnavailableError,
    ExportError, RealExecutor,
};
use airseal_resolve::{
    ClientBuildError, ImportSet, PackageIndex, PypiIndex, ResolutionWarning, ResolvedDependency,
    Resolver, extract_imports, filter_stdlib,
};

/// Per-run options that are not part of `airseal.toml`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write a `save` archive of the built image here.
    pub export: Option<PathBuf>,
    /// Remove the local image after a successful export.
    pub remove_after_export: bool,
}

/// Everything learned about a source file before anything is generated.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub imports: ImportSet,
    /// Imports dropped as standard library.
    pub excluded: ImportSet,
    pub candidates: ImportSet,
    pub dependencies: Vec<ResolvedDependency>,
}

impl Analysis {
    pub fn warnings(&self) -> Vec<ResolutionWarning> {
        ResolutionWarning::collect(&self.dependencies)
    }
}

/// Manifest and Dockerfile for one source file, not yet on disk.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub manifest: Manifest,
    /// Unresolved imports the manifest policy tolerated.
    pub warnings: Vec<ResolutionWarning>,
    pub definition: ImageDefinition,
}

/// Result of [`Pipeline::generate`].
#[derive(Debug, Clone)]
pub struct Generated {
    pub analysis: Analysis,
    pub prepared: Prepared,
    pub context: BuildContext,
}

/// Record of one run, successful or not.
#[derive(Debug)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub image_tag: ImageTag,
    /// Stages visited, in order, ending in a terminal stage.
    pub history: Vec<RunStage>,
    pub warnings: Vec<ResolutionWarning>,
    pub manifest: Option<Manifest>,
    pub build: Option<BuildResult>,
    /// Build directory, when it was kept.
    pub context_dir: Option<PathBuf>,
    pub outcome: RunOutcome,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded { .. })
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Succeeded {
        image_tag: ImageTag,
        archive: Option<PathBuf>,
    },
    Failed {
        /// Last stage completed before the failure.
        last_stage: RunStage,
        error: PipelineError,
    },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Succeeded {
                image_tag,
                archive: Some(archive),
            } => write!(f, "built {image_tag}, exported to {}", archive.display()),
            RunOutcome::Succeeded { image_tag, .. } => write!(f, "built {image_tag}"),
            RunOutcome::Failed { error, .. } => {
                write!(f, "{} stage failed: {}", error.stage(), error.detail())
            }
        }
    }
}

/// The airseal pipeline, parameterized over the package index and the
/// engine executor for testability.
pub struct Pipeline<I: PackageIndex = PypiIndex, E: EngineExecutor = RealExecutor> {
    config: AirsealConfig,
    resolver: Resolver<I>,
    engine: EngineClient<E>,
}

impl Pipeline<PypiIndex, RealExecutor> {
    pub fn new(config: AirsealConfig) -> Result<Self, PipelineError> {
        let resolver = Resolver::new(&config.resolve)
            .map_err(|e| PipelineError::IndexClient { source: e })?;
        let engine = EngineClient::new(config.build.engine)
            .with_command_timeout(config.build.engine_command_timeout());
        Ok(Self {
            config,
            resolver,
            engine,
        })
    }
}

impl<I: PackageIndex, E: EngineExecutor> Pipeline<I, E> {
    pub fn with_parts(config: AirsealConfig, index: I, executor: E) -> Self {
        let resolver = Resolver::with_index(index, &config.resolve);
        let engine = EngineClient::with_executor(executor, config.build.engine)
            .with_command_timeout(config.build.engine_command_timeout());
        Self {
            config,
            resolver,
            engine,
        }
    }

    pub fn config(&self) -> &AirsealConfig {
        &self.config
    }

    pub fn engine(&self) -> &EngineClient<E> {
        &self.engine
    }

    /// Only sources the configured runtime can run are accepted.
    fn accept(&self, source: &SourceFile) -> Result<(), PipelineError> {
        source
            .check_runtime(self.config.build.runtime)
            .map_err(|e| PipelineError::Extraction { source: e })
    }

    // ── Analyze ──

    /// Extract, filter and resolve. Never fails: unresolved imports are
    /// kept in `dependencies`.
    pub async fn analyze(&self, source: &SourceFile) -> Analysis {
        let imports = extract_imports(source);
        let filtered = filter_stdlib(&imports);
        let dependencies = self.resolver.resolve(&filtered.candidates).await;
        Analysis {
            imports,
            excluded: filtered.excluded,
            candidates: filtered.candidates,
            dependencies,
        }
    }

    // ── Prepare ──

    /// Build the manifest and render the Dockerfile in memory.
    pub fn prepare(
        &self,
        source: &SourceFile,
        analysis: &Analysis,
    ) -> Result<Prepared, PipelineError> {
        let ManifestOutcome { manifest, warnings } = ManifestWriter::new(&self.config.resolve)
            .write(&analysis.dependencies)
            .map_err(|e| PipelineError::ManifestIncomplete { source: e })?;

        let definition = DockerfileGenerator::new(&self.config.build, &manifest, source)
            .render()
            .map_err(|e| PipelineError::DefinitionGeneration { source: e })?;

        Ok(Prepared {
            manifest,
            warnings,
            definition,
        })
    }

    // ── Generate ──

    /// Analyze and prepare, then write the build context into `out_dir`
    /// without building.
    pub async fn generate(
        &self,
        source: &SourceFile,
        out_dir: &Path,
        overwrite: bool,
    ) -> Result<Generated, PipelineError> {
        self.accept(source)?;
        let analysis = self.analyze(source).await;
        let prepared = self.prepare(source, &analysis)?;
        let context = write_build_context(
            out_dir,
            source,
            &prepared.manifest,
            &prepared.definition,
            overwrite,
        )
        .map_err(|e| PipelineError::Context { source: e })?;
        Ok(Generated {
            analysis,
            prepared,
            context,
        })
    }

    // ── Run ──

    /// Run the full pipeline for uploaded bytes.
    pub async fn run_bytes(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        options: &RunOptions,
        on_line: impl FnMut(&str),
    ) -> Result<PipelineReport, PipelineError> {
        let source = SourceFile::from_bytes(filename, bytes)
            .map_err(|e| PipelineError::Extraction { source: e })?;
        self.accept(&source)?;
        Ok(self.run(source, options, on_line).await)
    }

    /// Run the full pipeline. Build output lines are passed to `on_line` as
    /// they arrive.
    ///
    /// The run always ends in a terminal stage; failures are reported in
    /// [`PipelineReport::outcome`] rather than returned.
    pub async fn run(
        &self,
        source: SourceFile,
        options: &RunOptions,
        on_line: impl FnMut(&str),
    ) -> PipelineReport {
        let run_id = RunId::generate();
        let image_tag = ImageTag::for_run(&source, &run_id);
        let mut record = RunRecord::new();

        tracing::info!(run_id = %run_id, source = source.filename(), tag = %image_tag, "run started");

        let result = self
            .execute(&source, &run_id, &image_tag, options, &mut record, on_line)
            .await;

        let outcome = match result {
            Ok(archive) => {
                record.transition(RunStage::Succeeded);
                tracing::info!(run_id = %run_id, tag = %image_tag, "run succeeded");
                RunOutcome::Succeeded {
                    image_tag: image_tag.clone(),
                    archive,
                }
            }
            Err(error) => {
                let last_stage = record.state.last_active();
                record.transition(RunStage::Failed);
                tracing::warn!(run_id = %run_id, stage = error.stage(), error = %error.detail(), "run failed");
                RunOutcome::Failed { last_stage, error }
            }
        };

        let context_dir = match record.workspace.take() {
            Some(ws) if self.config.build.keep_context => Some(ws.path().to_path_buf()),
            Some(ws) => {
                let path = ws.path().to_path_buf();
                if let Err(e) = ws.remove() {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove run directory");
                    Some(path)
                } else {
                    None
                }
            }
            None => None,
        };

        PipelineReport {
            run_id,
            image_tag,
            history: record.state.history().to_vec(),
            warnings: record.warnings,
            manifest: record.manifest,
            build: record.build,
            context_dir,
            outcome,
        }
    }

    async fn execute(
        &self,
        source: &SourceFile,
        run_id: &RunId,
        image_tag: &ImageTag,
        options: &RunOptions,
        record: &mut RunRecord,
        on_line: impl FnMut(&str),
    ) -> Result<Option<PathBuf>, PipelineError> {
        self.accept(source)?;
        let imports = extract_imports(source);
        tracing::info!(imports = imports.len(), "imports extracted");
        record.advance(RunStage::Extracted)?;

        let filtered = filter_stdlib(&imports);
        tracing::info!(
            candidates = filtered.candidates.len(),
            excluded = filtered.excluded.len(),
            "standard library filtered"
        );
        record.advance(RunStage::Filtered)?;

        let dependencies = self.resolver.resolve(&filtered.candidates).await;
        record.advance(RunStage::Resolved)?;

        let analysis = Analysis {
            imports,
            excluded: filtered.excluded,
            candidates: filtered.candidates,
            dependencies,
        };
        record.warnings = analysis.warnings();

        let ManifestOutcome { manifest, warnings } = ManifestWriter::new(&self.config.resolve)
            .write(&analysis.dependencies)
            .map_err(|e| PipelineError::ManifestIncomplete { source: e })?;
        record.warnings = warnings;
        record.advance(RunStage::ManifestWritten)?;

        let definition = DockerfileGenerator::new(&self.config.build, &manifest, source)
            .render()
            .map_err(|e| PipelineError::DefinitionGeneration { source: e })?;
        record.manifest = Some(manifest.clone());
        record.advance(RunStage::DefinitionGenerated)?;

        // Nothing touches the build root until the engine is known to answer.
        let version = self
            .engine
            .probe()
            .await
            .map_err(|e| PipelineError::BuildEngineUnavailable { source: e })?;
        tracing::debug!(%version, "engine probe ok");

        let workspace =
            RunWorkspace::create(&self.config.build.build_directory_root, source, run_id)
                .map_err(|e| PipelineError::Workspace { source: e })?;
        let workspace_dir = workspace.path().to_path_buf();
        record.workspace = Some(workspace);

        let context = write_build_context(&workspace_dir, source, &manifest, &definition, false)
            .map_err(|e| PipelineError::Context { source: e })?;
        record.advance(RunStage::Building)?;

        let request = BuildRequest {
            context_dir: &context.dir,
            dockerfile: &context.dockerfile,
            tag: image_tag,
            timeout: self.config.build.build_timeout(),
        };
        let result = self.engine.build(&request, on_line).await.map_err(|e| match e {
            BuildError::Unavailable { source } => PipelineError::BuildEngineUnavailable {
                source: EngineUnavailableError {
                    engine: self.engine.kind(),
                    source,
                },
            },
            other => PipelineError::BuildInvocation { source: other },
        })?;

        let success = result.success;
        let message = result.error_message.clone();
        record.build = Some(result);
        if !success {
            return Err(PipelineError::BuildFailed {
                tag: image_tag.to_string(),
                message: message.unwrap_or_else(|| "engine reported failure".to_owned()),
            });
        }

        let Some(archive) = &options.export else {
            return Ok(None);
        };
        self.engine
            .export(image_tag, archive)
            .await
            .map_err(|e| PipelineError::Export { source: e })?;
        if options.remove_after_export {
            // The archive already holds the image.
            if let Err(e) = self.engine.remove_image(image_tag).await {
                tracing::warn!(tag = %image_tag, error = %e, "failed to remove exported image");
            }
        }
        Ok(Some(archive.clone()))
    }
}

/// Mutable state threaded through one run.
struct RunRecord {
    state: RunState,
    warnings: Vec<ResolutionWarning>,
    manifest: Option<Manifest>,
    build: Option<BuildResult>,
    workspace: Option<RunWorkspace>,
}

impl RunRecord {
    fn new() -> Self {
        Self {
            state: RunState::new(),
            warnings: Vec::new(),
            manifest: None,
            build: None,
            workspace: None,
        }
    }

    fn advance(&mut self, to: RunStage) -> Result<(), PipelineError> {
        self.state
            .advance(to)
            .map_err(|e| PipelineError::Transition { source: e })?;
        tracing::info!(stage = %to, "stage complete");
        Ok(())
    }

    /// Move to a terminal stage.
    fn transition(&mut self, to: RunStage) {
        if let Err(e) = self.state.advance(to) {
            tracing::error!(error = %e, "run already terminal");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("source file rejected")]
    Extraction { source: ExtractionError },

    #[error("manifest incomplete")]
    ManifestIncomplete { source: ManifestIncompleteError },

    #[error("Dockerfile generation failed")]
    DefinitionGeneration { source: DefinitionError },

    #[error("build engine unavailable")]
    BuildEngineUnavailable { source: EngineUnavailableError },

    #[error("image build for {tag} failed: {message}")]
    BuildFailed { tag: String, message: String },

    #[error("could not invoke the build engine")]
    BuildInvocation { source: BuildError },

    #[error("run directory error")]
    Workspace { source: airseal_core::Error },

    #[error("failed to write build context")]
    Context { source: ContextError },

    #[error("image export failed")]
    Export { source: ExportError },

    #[error("invalid run state")]
    Transition { source: airseal_core::Error },

    #[error("failed to create package index client")]
    IndexClient { source: ClientBuildError },
}

impl PipelineError {
    /// Name of the stage the error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Extraction { .. } => "extract",
            PipelineError::ManifestIncomplete { .. } => "manifest",
            PipelineError::DefinitionGeneration { .. } => "definition",
            PipelineError::BuildEngineUnavailable { .. }
            | PipelineError::BuildFailed { .. }
            | PipelineError::BuildInvocation { .. } => "build",
            PipelineError::Workspace { .. } | PipelineError::Context { .. } => "workspace",
            PipelineError::Export { .. } => "export",
            PipelineError::Transition { .. } => "run",
            PipelineError::IndexClient { .. } => "resolve",
        }
    }

    /// This error and its sources joined with `: `.
    pub fn detail(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            parts.push(err.to_string());
            current = err.source();
        }
        parts.join(": ")
    }
}
