use std::path::{Path, PathBuf};

use airseal_core::SourceFile;

use crate::dockerfile::{ImageDefinition, is_generated_name};
use crate::manifest::Manifest;

/// Files written into a build-context directory.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub dir: PathBuf,
    pub dockerfile: PathBuf,
    pub manifest: PathBuf,
    pub source: PathBuf,
}

/// Writes the manifest, the source file and the Dockerfile into `dir`.
///
/// `dir` is created if missing. An existing Dockerfile is only replaced
/// when `overwrite` is set; run workspaces are always fresh so the pipeline
/// never needs it.
pub fn write_build_context(
    dir: &Path,
    source: &SourceFile,
    manifest: &Manifest,
    definition: &ImageDefinition,
    overwrite: bool,
) -> Result<BuildContext, ContextError> {
    if is_generated_name(source.filename()) {
        return Err(ContextError::SourceCollision {
            name: source.filename().to_owned(),
        });
    }

    let dockerfile = dir.join(ImageDefinition::FILE_NAME);
    if !overwrite && dockerfile.exists() {
        return Err(ContextError::AlreadyExists { path: dockerfile });
    }

    std::fs::create_dir_all(dir).map_err(|e| ContextError::Create {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let manifest_path = dir.join(Manifest::FILE_NAME);
    write_file(&manifest_path, manifest.render().as_bytes())?;

    let source_path = dir.join(source.filename());
    write_file(&source_path, source.text().as_bytes())?;

    // Dockerfile last: its presence marks a complete context.
    write_file(&dockerfile, definition.text().as_bytes())?;

    tracing::debug!(dir = %dir.display(), "build context written");

    Ok(BuildContext {
        dir: dir.to_path_buf(),
        dockerfile,
        manifest: manifest_path,
        source: source_path,
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ContextError> {
    std::fs::write(path, contents).map_err(|e| ContextError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} already exists (use --force to overwrite)")]
    AlreadyExists { path: PathBuf },
    #[error("source file {name:?} would overwrite a generated build file")]
    SourceCollision { name: String },
}
