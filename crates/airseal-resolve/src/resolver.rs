use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use airseal_core::ResolveConfig;

use crate::alias::builtin_alias;
use crate::extract::ImportSet;
use crate::index::{ClientBuildError, IndexError, PackageIndex, PackageInfo, PypiIndex};

/// Why an import could not be mapped to a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The index answered and has no such package (nor alias).
    NotFound,
    /// The lookup did not finish within the configured timeout.
    LookupTimeout,
    /// Transport, HTTP, or decoding failure.
    LookupFailed(String),
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::NotFound => f.write_str("not found"),
            UnresolvedReason::LookupTimeout => f.write_str("lookup timeout"),
            UnresolvedReason::LookupFailed(detail) => write!(f, "lookup failed: {detail}"),
        }
    }
}

/// Outcome of resolving one import name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The import name is itself a published package.
    Resolved {
        package: String,
        version: Option<String>,
    },
    /// Found through an alias (`yaml` → `PyYAML`).
    AliasResolved {
        package: String,
        version: Option<String>,
    },
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub import_name: String,
    pub resolution: Resolution,
}

impl ResolvedDependency {
    pub fn package_name(&self) -> Option<&str> {
        match &self.resolution {
            Resolution::Resolved { package, .. } | Resolution::AliasResolved { package, .. } => {
                Some(package)
            }
            Resolution::Unresolved(_) => None,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match &self.resolution {
            Resolution::Resolved { version, .. } | Resolution::AliasResolved { version, .. } => {
                version.as_deref()
            }
            Resolution::Unresolved(_) => None,
        }
    }

    pub fn unresolved_reason(&self) -> Option<&UnresolvedReason> {
        match &self.resolution {
            Resolution::Unresolved(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.resolution, Resolution::Unresolved(_))
    }
}

/// Non-fatal, per-dependency problem surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionWarning {
    pub import_name: String,
    pub reason: UnresolvedReason,
}

impl ResolutionWarning {
    /// One warning per unresolved entry, in input order.
    pub fn collect(deps: &[ResolvedDependency]) -> Vec<Self> {
        deps.iter()
            .filter_map(|d| {
                d.unresolved_reason().map(|reason| Self {
                    import_name: d.import_name.clone(),
                    reason: reason.clone(),
                })
            })
            .collect()
    }
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not resolve import `{}`: {}",
            self.import_name, self.reason
        )
    }
}

/// Maps third-party import names to installable packages,
/// parameterized over the index for testability.
pub struct Resolver<I: PackageIndex = PypiIndex> {
    index: I,
    timeout: Duration,
    aliases: BTreeMap<String, String>,
}

impl Resolver<PypiIndex> {
    pub fn new(config: &ResolveConfig) -> Result<Self, ClientBuildError> {
        let index = PypiIndex::new(&config.index_url, config.lookup_timeout())?;
        Ok(Self::with_index(index, config))
    }
}

impl<I: PackageIndex> Resolver<I> {
    pub fn with_index(index: I, config: &ResolveConfig) -> Self {
        Self {
            index,
            timeout: config.lookup_timeout(),
            aliases: config.aliases.clone(),
        }
    }

    /// Resolve every candidate, one lookup at a time, in set order.
    ///
    /// Never fails: each candidate ends up in exactly one [`Resolution`].
    pub async fn resolve(&self, candidates: &ImportSet) -> Vec<ResolvedDependency> {
        let mut resolved = Vec::with_capacity(candidates.len());
        for name in candidates.iter() {
            let resolution = self.resolve_one(name).await;
            match &resolution {
                Resolution::Resolved { package, version } => {
                    tracing::info!(import = name, %package, version = ?version, "resolved");
                }
                Resolution::AliasResolved { package, version } => {
                    tracing::info!(import = name, %package, version = ?version, "resolved via alias");
                }
                Resolution::Unresolved(reason) => {
                    tracing::warn!(import = name, %reason, "unresolved");
                }
            }
            resolved.push(ResolvedDependency {
                import_name: name.to_owned(),
                resolution,
            });
        }
        resolved
    }

    async fn resolve_one(&self, name: &str) -> Resolution {
        // Caller-supplied aliases are explicit intent and win over the index.
        if let Some(package) = self.aliases.get(name) {
            return match self.lookup(package).await {
                Ok(info) => alias_resolved(info),
                Err(e) => Resolution::Unresolved(reason_for(e)),
            };
        }

        match self.lookup(name).await {
            Ok(info) => Resolution::Resolved {
                package: info.name,
                version: info.version,
            },
            Err(IndexError::NotFound { .. }) => match builtin_alias(name) {
                Some(package) => {
                    tracing::debug!(import = name, package, "trying built-in alias");
                    match self.lookup(package).await {
                        Ok(info) => alias_resolved(info),
                        Err(e) => Resolution::Unresolved(reason_for(e)),
                    }
                }
                None => Resolution::Unresolved(UnresolvedReason::NotFound),
            },
            Err(e) => Resolution::Unresolved(reason_for(e)),
        }
    }

    /// Index lookup bounded by the configured timeout, whatever the index
    /// implementation does internally.
    async fn lookup(&self, name: &str) -> Result<PackageInfo, IndexError> {
        match tokio::time::timeout(self.timeout, self.index.lookup(name)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(IndexError::Timeout {
                name: name.to_owned(),
            }),
        }
    }
}

fn alias_resolved(info: PackageInfo) -> Resolution {
    Resolution::AliasResolved {
        package: info.name,
        version: info.version,
    }
}

fn reason_for(error: IndexError) -> UnresolvedReason {
    match error {
        IndexError::NotFound { .. } => UnresolvedReason::NotFound,
        IndexError::Timeout { .. } => UnresolvedReason::LookupTimeout,
        IndexError::Failed { detail, .. } => UnresolvedReason::LookupFailed(detail),
    }
}
