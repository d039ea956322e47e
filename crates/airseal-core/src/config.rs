use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File name looked up by [`AirsealConfig::load`].
pub const CONFIG_FILE_NAME: &str = "airseal.toml";

/// airseal.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirsealConfig {
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub resolve: ResolveConfig,
}

/// Target runtime of the uploaded source. Selects the default base image
/// and the entrypoint interpreter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    #[default]
    Python,
}

impl Runtime {
    pub fn default_base_image(self) -> &'static str {
        match self {
            Runtime::Python => "python:3.12-slim",
        }
    }

    /// Interpreter placed in front of the source file in the entrypoint.
    pub fn interpreter(self) -> &'static str {
        match self {
            Runtime::Python => "python",
        }
    }

    /// File extensions accepted as source for this runtime.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Runtime::Python => &["py"],
        }
    }
}

/// Container engine CLI used to build and export images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Docker,
    Podman,
}

impl EngineKind {
    pub fn binary(self) -> &'static str {
        match self {
            EngineKind::Docker => "docker",
            EngineKind::Podman => "podman",
        }
    }
}

/// How resolved packages are pinned in the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinStrategy {
    /// `package==<latest version served by the index>`
    #[default]
    Latest,
    /// `package` with no version; pip picks at build time.
    Unpinned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub runtime: Runtime,
    /// Base image for the generated definition.
    /// Defaults to the runtime's base image.
    #[serde(default)]
    pub base_image: Option<String>,
    /// Root under which every run gets its own build-context directory.
    #[serde(default = "default_build_directory_root")]
    pub build_directory_root: PathBuf,
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default = "default_build_timeout_seconds")]
    pub build_timeout_seconds: u64,
    /// Limit for short engine commands: `version`, `save` and `rmi`.
    #[serde(default = "default_engine_command_timeout_seconds")]
    pub engine_command_timeout_seconds: u64,
    /// Keep the run directory after the run finishes.
    #[serde(default)]
    pub keep_context: bool,
    /// Additional system packages to install via apt-get
    #[serde(default)]
    pub system_packages: Vec<String>,
    /// Static environment variables baked into the image.
    /// These become ENV directives in the Dockerfile.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Base URL of a PyPI-compatible JSON API.
    #[serde(default = "default_index_url")]
    pub index_url: String,
    #[serde(default = "default_lookup_timeout_seconds")]
    pub lookup_timeout_seconds: u64,
    /// Write a manifest even when some imports stay unresolved.
    #[serde(default)]
    pub allow_partial_manifest: bool,
    /// With partial manifests allowed, abort anyway once more than this
    /// many imports are unresolved.
    #[serde(default)]
    pub max_unresolved: Option<usize>,
    /// Import names that may stay unresolved without blocking the manifest.
    #[serde(default)]
    pub optional: BTreeSet<String>,
    #[serde(default)]
    pub pin: PinStrategy,
    /// Explicit versions per package name, overriding `pin`.
    #[serde(default)]
    pub pins: BTreeMap<String, String>,
    /// Import-name → package-name mappings. Consulted before the index
    /// lookup and before the built-in alias table.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            runtime: Runtime::default(),
            base_image: None,
            build_directory_root: default_build_directory_root(),
            engine: EngineKind::default(),
            build_timeout_seconds: default_build_timeout_seconds(),
            engine_command_timeout_seconds: default_engine_command_timeout_seconds(),
            keep_context: false,
            system_packages: Vec::new(),
            env: BTreeMap::new(),
        }
    }
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            lookup_timeout_seconds: default_lookup_timeout_seconds(),
            allow_partial_manifest: false,
            max_unresolved: None,
            optional: BTreeSet::new(),
            pin: PinStrategy::default(),
            pins: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    pub fn effective_base_image(&self) -> &str {
        self.base_image
            .as_deref()
            .unwrap_or_else(|| self.runtime.default_base_image())
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_seconds)
    }

    pub fn engine_command_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_command_timeout_seconds)
    }
}

impl ResolveConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_seconds)
    }
}

impl AirsealConfig {
    /// Load from airseal.toml in the given directory, or return defaults if not found.
    ///
    /// A relative `build_directory_root` is interpreted relative to `config_dir`.
    pub fn load(config_dir: &Path) -> crate::Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str::<Self>(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path.clone(),
                source: e,
            })?
        } else {
            tracing::debug!(path = %config_path.display(), "no config file; using defaults");
            Self::default()
        };

        if config.build.build_directory_root.is_relative() {
            config.build.build_directory_root = config_dir.join(&config.build.build_directory_root);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot honor.
    pub fn validate(&self) -> crate::Result<()> {
        if self.resolve.lookup_timeout_seconds == 0 {
            return Err(crate::Error::ConfigInvalid {
                key: "resolve.lookup_timeout_seconds",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.build.build_timeout_seconds == 0 {
            return Err(crate::Error::ConfigInvalid {
                key: "build.build_timeout_seconds",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.build.engine_command_timeout_seconds == 0 {
            return Err(crate::Error::ConfigInvalid {
                key: "build.engine_command_timeout_seconds",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.resolve.index_url.trim().is_empty() {
            return Err(crate::Error::ConfigInvalid {
                key: "resolve.index_url",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.build.build_directory_root.as_os_str().is_empty() {
            return Err(crate::Error::ConfigInvalid {
                key: "build.build_directory_root",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

fn default_build_directory_root() -> PathBuf {
    PathBuf::from(".airseal/runs")
}

fn default_build_timeout_seconds() -> u64 {
    1800
}

fn default_engine_command_timeout_seconds() -> u64 {
    600
}

fn default_index_url() -> String {
    "https://pypi.org".to_owned()
}

fn default_lookup_timeout_seconds() -> u64 {
    10
}
