use std::time::Duration;

use serde::Deserialize;

/// A package as served by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Canonical distribution name as the index spells it.
    pub name: String,
    /// Latest release, when the index reports one.
    pub version: Option<String>,
}

/// Abstraction over package index lookups for testability.
///
/// Production code uses [`PypiIndex`], tests use fakes and mockall mocks.
#[allow(async_fn_in_trait)]
pub trait PackageIndex: Send + Sync {
    /// Look up a distribution by name.
    async fn lookup(&self, name: &str) -> Result<PackageInfo, IndexError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("package `{name}` not found on the index")]
    NotFound { name: String },

    #[error("lookup of `{name}` timed out")]
    Timeout { name: String },

    #[error("lookup of `{name}` failed: {detail}")]
    Failed { name: String, detail: String },
}

#[derive(Debug, thiserror::Error)]
#[error("failed to build HTTP client for package index")]
pub struct ClientBuildError {
    source: reqwest::Error,
}

/// PyPI JSON API client (`GET {index_url}/pypi/{name}/json`).
#[derive(Debug, Clone)]
pub struct PypiIndex {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,
}

#[derive(Deserialize)]
struct ProjectInfo {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

impl PypiIndex {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(index_url: &str, timeout: Duration) -> Result<Self, ClientBuildError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("airseal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientBuildError { source: e })?;

        Ok(Self {
            client,
            base_url: index_url.trim_end_matches('/').to_owned(),
        })
    }

    fn project_url(&self, name: &str) -> String {
        format!("{}/pypi/{name}/json", self.base_url)
    }
}

impl PackageIndex for PypiIndex {
    async fn lookup(&self, name: &str) -> Result<PackageInfo, IndexError> {
        let url = self.project_url(name);
        tracing::debug!(%url, "querying package index");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(name, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexError::NotFound {
                name: name.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(IndexError::Failed {
                name: name.to_owned(),
                detail: format!("index returned HTTP {status}"),
            });
        }

        let body: ProjectResponse = response
            .json()
            .await
            .map_err(|e| transport_error(name, e))?;

        Ok(PackageInfo {
            name: body.info.name,
            version: body.info.version.filter(|v| !v.trim().is_empty()),
        })
    }
}

fn transport_error(name: &str, e: reqwest::Error) -> IndexError {
    if e.is_timeout() {
        IndexError::Timeout {
            name: name.to_owned(),
        }
    } else {
        IndexError::Failed {
            name: name.to_owned(),
            detail: e.to_string(),
        }
    }
}
