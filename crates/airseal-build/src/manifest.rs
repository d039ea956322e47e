use std::collections::HashSet;
use std::fmt;

use airseal_core::{PinStrategy, ResolveConfig};
use airseal_resolve::{ResolutionWarning, ResolvedDependency};

/// One `package[==version]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub package: String,
    pub version: Option<String>,
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}=={version}", self.package),
            None => f.write_str(&self.package),
        }
    }
}

/// Ordered dependency manifest, rendered as `requirements.txt`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub const FILE_NAME: &'static str = "requirements.txt";

    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// One entry per line, each terminated by `\n`. Empty manifest renders
    /// as an empty string.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{e}\n"))
            .collect()
    }

    /// Parse manifest text back into entries, preserving order.
    ///
    /// Blank lines are skipped; everything else must be `name` or
    /// `name==version`.
    pub fn parse(text: &str) -> Result<Self, ManifestParseError> {
        let mut entries = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let (package, version) = match line.split_once("==") {
                Some((package, version)) => (package.trim(), Some(version.trim())),
                None => (line, None),
            };

            let malformed = package.is_empty()
                || package.chars().any(char::is_whitespace)
                || version.is_some_and(|v| v.is_empty() || v.contains("=="));
            if malformed {
                return Err(ManifestParseError {
                    line: idx + 1,
                    content: raw.to_owned(),
                });
            }

            entries.push(ManifestEntry {
                package: package.to_owned(),
                version: version.map(str::to_owned),
            });
        }
        Ok(Self { entries })
    }
}

/// Manifest plus the unresolved imports that were tolerated.
#[derive(Debug, Clone)]
pub struct ManifestOutcome {
    pub manifest: Manifest,
    pub warnings: Vec<ResolutionWarning>,
}

/// Turns resolved dependencies into a [`Manifest`] under the caller's
/// partial-manifest and pinning policy.
pub struct ManifestWriter<'a> {
    config: &'a ResolveConfig,
}

impl<'a> ManifestWriter<'a> {
    pub fn new(config: &'a ResolveConfig) -> Self {
        Self { config }
    }

    /// Build the manifest in input order.
    ///
    /// Unresolved imports listed in `optional` never block. Any other
    /// unresolved import blocks unless `allow_partial_manifest` is set, and
    /// even then more than `max_unresolved` of them still blocks.
    pub fn write(
        &self,
        deps: &[ResolvedDependency],
    ) -> Result<ManifestOutcome, ManifestIncompleteError> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        let mut warnings = Vec::new();
        let mut blocking = Vec::new();

        for dep in deps {
            let Some(package) = dep.package_name() else {
                let warning = ResolutionWarning {
                    import_name: dep.import_name.clone(),
                    reason: dep
                        .unresolved_reason()
                        .cloned()
                        .unwrap_or(airseal_resolve::UnresolvedReason::NotFound),
                };
                if !self.config.optional.contains(&dep.import_name) {
                    blocking.push(warning.clone());
                }
                warnings.push(warning);
                continue;
            };

            // Two imports can map to one distribution (`PIL` and `Image`).
            if !seen.insert(normalize_name(package)) {
                tracing::debug!(import = %dep.import_name, package, "duplicate package skipped");
                continue;
            }

            entries.push(ManifestEntry {
                package: package.to_owned(),
                version: self.pinned_version(package, dep.version()),
            });
        }

        if !blocking.is_empty() {
            if !self.config.allow_partial_manifest {
                return Err(ManifestIncompleteError::Unresolved {
                    unresolved: blocking,
                });
            }
            if let Some(limit) = self.config.max_unresolved
                && blocking.len() > limit
            {
                return Err(ManifestIncompleteError::TooManyUnresolved {
                    unresolved: blocking,
                    limit,
                });
            }
        }

        for warning in &warnings {
            tracing::warn!(%warning, "import left out of manifest");
        }

        Ok(ManifestOutcome {
            manifest: Manifest { entries },
            warnings,
        })
    }

    /// Pins match on the normalized name, so `pyyaml` pins `PyYAML`.
    fn pinned_version(&self, package: &str, resolved: Option<&str>) -> Option<String> {
        let wanted = normalize_name(package);
        if let Some(pinned) = self
            .config
            .pins
            .iter()
            .find_map(|(name, version)| (normalize_name(name) == wanted).then_some(version))
        {
            return Some(pinned.clone());
        }
        match self.config.pin {
            PinStrategy::Latest => resolved.map(str::to_owned),
            PinStrategy::Unpinned => None,
        }
    }
}

/// PEP 503 normalized form: lowercase, runs of `-_.` collapsed to `-`.
fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            separator = true;
        } else {
            if separator && !out.is_empty() {
                out.push('-');
            }
            separator = false;
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestIncompleteError {
    #[error(
        "unresolved imports block the manifest: {}; allow a partial manifest or mark them optional",
        format_unresolved(unresolved)
    )]
    Unresolved { unresolved: Vec<ResolutionWarning> },

    #[error(
        "{} unresolved imports exceed the limit of {limit}: {}",
        unresolved.len(),
        format_unresolved(unresolved)
    )]
    TooManyUnresolved {
        unresolved: Vec<ResolutionWarning>,
        limit: usize,
    },
}

impl ManifestIncompleteError {
    pub fn unresolved(&self) -> &[ResolutionWarning] {
        match self {
            ManifestIncompleteError::Unresolved { unresolved }
            | ManifestIncompleteError::TooManyUnresolved { unresolved, .. } => unresolved,
        }
    }
}

fn format_unresolved(unresolved: &[ResolutionWarning]) -> String {
    unresolved
        .iter()
        .map(|w| format!("`{}` ({})", w.import_name, w.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
#[error("malformed manifest line {line}: {content:?}")]
pub struct ManifestParseError {
    pub line: usize,
    pub content: String,
}
