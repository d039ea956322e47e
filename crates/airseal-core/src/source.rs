use std::path::Path;

use crate::config::Runtime;

/// A single uploaded source file: base file name plus UTF-8 text.
///
/// Immutable once constructed. Construction rejects content the
/// extractor could never scan (empty, whitespace-only, or non-UTF-8).
///
/// # Examples
///
/// ```
/// use airseal_core::SourceFile;
///
/// let src = SourceFile::from_bytes("app.py", b"import numpy\n".to_vec()).unwrap();
/// assert_eq!(src.filename(), "app.py");
/// assert_eq!(src.module_stem(), "app");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    filename: String,
    text: String,
}

impl SourceFile {
    /// Build a source file from uploaded bytes.
    ///
    /// `filename` may carry directory components; only the base name is kept.
    pub fn from_bytes(filename: &str, bytes: Vec<u8>) -> Result<Self, ExtractionError> {
        let filename = base_name(filename).ok_or_else(|| ExtractionError::InvalidFilename {
            filename: filename.to_owned(),
        })?;

        let text = String::from_utf8(bytes).map_err(|e| ExtractionError::NotUtf8 {
            filename: filename.clone(),
            source: e,
        })?;

        if text.trim().is_empty() {
            return Err(ExtractionError::Empty { filename });
        }

        tracing::debug!(filename = %filename, bytes = text.len(), "source file accepted");
        Ok(Self { filename, text })
    }

    /// Read a source file from disk.
    pub fn read(path: &Path) -> Result<Self, ExtractionError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractionError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_bytes(&path.to_string_lossy(), bytes)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// File name without its final extension (`app.py` → `app`).
    pub fn module_stem(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.filename,
        }
    }

    /// Lowercase, dash-separated form of [`module_stem`](Self::module_stem),
    /// safe for use as an image repository component.
    pub fn slug(&self) -> String {
        slugify(self.module_stem())
    }

    /// Final extension, lowercased, if any.
    /// Reject files whose extension the runtime does not run.
    pub fn check_runtime(&self, runtime: Runtime) -> Result<(), ExtractionError> {
        let accepted = self
            .extension()
            .is_some_and(|ext| runtime.extensions().contains(&ext.as_str()));
        if accepted {
            return Ok(());
        }
        Err(ExtractionError::UnsupportedType {
            filename: self.filename.clone(),
            runtime: runtime.interpreter(),
            expected: runtime.extensions().join(", ."),
        })
    }

    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .filter(|(stem, _)| !stem.is_empty())
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

/// Reduce `input` to `[a-z0-9]` runs joined by single dashes.
/// Returns `"source"` when nothing usable remains.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "source".to_owned()
    } else {
        slug
    }
}

fn base_name(filename: &str) -> Option<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")?;
    Some(name.to_owned())
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to read source file {path}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("source file name {filename:?} is not usable")]
    InvalidFilename { filename: String },

    #[error("source file {filename} is not valid UTF-8")]
    NotUtf8 {
        filename: String,
        source: std::string::FromUtf8Error,
    },

    #[error("source file {filename} is empty")]
    Empty { filename: String },

    #[error("{filename} does not look like a {runtime} source file (expected .{expected})")]
    UnsupportedType {
        filename: String,
        runtime: &'static str,
        expected: String,
    },
}
