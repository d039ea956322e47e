use std::sync::LazyLock;

use airseal_core::{BuildConfig, SourceFile};
use regex::Regex;

use crate::manifest::Manifest;

/// Directory inside the image holding the manifest and the source.
pub const APP_DIR: &str = "/app";

// registry[:port]/path[:tag][@digest]
static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/:-]*(@sha256:[a-f0-9]{64})?$").expect("valid regex")
});
// PEP 508 distribution name.
static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9._-]*[A-Za-z0-9])$").expect("valid regex")
});
static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.+!_-]*$").expect("valid regex"));
static SYSTEM_PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9+.:=~_-]*$").expect("valid regex"));
static ENV_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));
// COPY globs `*?[` and expands `$`; keep source names to a plain set.
static SOURCE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._ -]*$").expect("valid regex"));

/// Rendered Dockerfile plus the values it was instantiated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDefinition {
    base_image: String,
    manifest_path: Option<String>,
    source_path: String,
    entrypoint: Vec<String>,
    text: String,
}

impl ImageDefinition {
    pub const FILE_NAME: &'static str = "Dockerfile";

    pub fn base_image(&self) -> &str {
        &self.base_image
    }

    /// In-image path of the manifest; `None` when nothing is installed.
    pub fn manifest_path(&self) -> Option<&str> {
        self.manifest_path.as_deref()
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn entrypoint(&self) -> &[String] {
        &self.entrypoint
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Generates a single-stage Dockerfile that installs the manifest and runs
/// the source file with the runtime's interpreter.
pub struct DockerfileGenerator<'a> {
    config: &'a BuildConfig,
    manifest: &'a Manifest,
    source: &'a SourceFile,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(config: &'a BuildConfig, manifest: &'a Manifest, source: &'a SourceFile) -> Self {
        Self {
            config,
            manifest,
            source,
        }
    }

    /// Validate every interpolated value, then render.
    ///
    /// Output depends only on the inputs: env vars are emitted in key order
    /// and manifest entries are never reordered.
    pub fn render(&self) -> Result<ImageDefinition, DefinitionError> {
        self.validate()?;

        let base_image = self.config.effective_base_image().to_owned();
        let filename = self.source.filename();
        let source_path = format!("{APP_DIR}/{filename}");
        let entrypoint = vec![
            self.config.runtime.interpreter().to_owned(),
            filename.to_owned(),
        ];

        let mut text = format!("FROM {base_image}\nWORKDIR {APP_DIR}\n");

        if !self.config.env.is_empty() {
            let vars: Vec<String> = self
                .config
                .env
                .iter()
                .map(|(k, v)| format!("{k}={}", quote_env_value(v)))
                .collect();
            text.push_str(&format!("ENV {}\n", vars.join(" \\\n    ")));
        }

        if !self.config.system_packages.is_empty() {
            text.push_str(&format!(
                "RUN apt-get update \\\n    && apt-get install -y --no-install-recommends {} \\\n    && rm -rf /var/lib/apt/lists/*\n",
                self.config.system_packages.join(" ")
            ));
        }

        let manifest_path = if self.manifest.is_empty() {
            None
        } else {
            let path = format!("{APP_DIR}/{}", Manifest::FILE_NAME);
            text.push_str(&format!(
                "COPY {}\nRUN pip install --no-cache-dir -r {path}\n",
                exec_form(&[Manifest::FILE_NAME, &path])
            ));
            Some(path)
        };

        text.push_str("ENV PIP_NO_INDEX=1\n");
        text.push_str(&format!(
            "COPY {}\n",
            exec_form(&[filename, &source_path])
        ));
        let entry_refs: Vec<&str> = entrypoint.iter().map(String::as_str).collect();
        text.push_str(&format!("ENTRYPOINT {}\n", exec_form(&entry_refs)));

        Ok(ImageDefinition {
            base_image,
            manifest_path,
            source_path,
            entrypoint,
            text,
        })
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        let base = self.config.effective_base_image();
        if !IMAGE_REF.is_match(base) {
            return Err(DefinitionError::InvalidBaseImage(base.to_owned()));
        }

        let filename = self.source.filename();
        if !SOURCE_NAME.is_match(filename) {
            return Err(DefinitionError::UnsafeSourceName(filename.to_owned()));
        }
        if is_generated_name(filename) {
            return Err(DefinitionError::ReservedSourceName(filename.to_owned()));
        }

        for entry in self.manifest.entries() {
            if !PACKAGE_NAME.is_match(&entry.package) {
                return Err(DefinitionError::InvalidPackageName(entry.package.clone()));
            }
            if let Some(version) = &entry.version
                && !VERSION.is_match(version)
            {
                return Err(DefinitionError::InvalidVersion {
                    package: entry.package.clone(),
                    version: version.clone(),
                });
            }
        }

        if let Some(pkg) = self
            .config
            .system_packages
            .iter()
            .find(|p| !SYSTEM_PACKAGE.is_match(p))
        {
            return Err(DefinitionError::InvalidSystemPackage(pkg.clone()));
        }

        for (key, value) in &self.config.env {
            if !ENV_KEY.is_match(key) {
                return Err(DefinitionError::InvalidEnvKey(key.clone()));
            }
            if value.chars().any(char::is_control) {
                return Err(DefinitionError::InvalidEnvValue { key: key.clone() });
            }
        }

        Ok(())
    }
}

/// Whether `name` would collide with a file the build context generates.
/// Case-insensitive, since the context may live on a case-folding filesystem.
pub(crate) fn is_generated_name(name: &str) -> bool {
    [Manifest::FILE_NAME, ImageDefinition::FILE_NAME]
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// `["a", "b"]` with JSON string escaping.
fn exec_form(items: &[&str]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|s| serde_json::Value::from(*s).to_string())
        .collect();
    format!("[{}]", quoted.join(", "))
}

/// Double-quoted ENV value; `$` is escaped so no substitution happens.
fn quote_env_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("base image {0:?} is not a valid image reference")]
    InvalidBaseImage(String),

    #[error("source file name {0:?} cannot be used safely in a Dockerfile")]
    UnsafeSourceName(String),

    #[error("source file name {0:?} collides with a generated build file")]
    ReservedSourceName(String),

    #[error("package name {0:?} is not a valid distribution name")]
    InvalidPackageName(String),

    #[error("version {version:?} of package {package} is not a valid version string")]
    InvalidVersion { package: String, version: String },

    #[error("system package {0:?} is not a valid apt package name")]
    InvalidSystemPackage(String),

    #[error("environment variable name {0:?} is invalid")]
    InvalidEnvKey(String),

    #[error("environment variable {key} contains control characters")]
    InvalidEnvValue { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_form_escapes_json() {
        assert_eq!(exec_form(&["a", "b"]), r#"["a", "b"]"#);
        assert_eq!(exec_form(&[r#"x"y"#]), r#"["x\"y"]"#);
    }

    #[test]
    fn env_value_escapes_quote_backslash_dollar() {
        assert_eq!(quote_env_value("plain"), r#""plain""#);
        assert_eq!(quote_env_value(r#"a"b\c$HOME"#), r#""a\"b\\c\$HOME""#);
    }

    #[test]
    fn image_refs() {
        for ok in [
            "python:3.12-slim",
            "ghcr.io/org/python:3.12",
            "localhost:5000/py",
            "python@sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
        ] {
            assert!(IMAGE_REF.is_match(ok), "{ok}");
        }
        for bad in ["", "python 3", "python\nRUN rm -rf /", "-python"] {
            assert!(!IMAGE_REF.is_match(bad), "{bad:?}");
        }
    }

    #[test]
    fn package_names_follow_pep508() {
        for ok in ["numpy", "PyYAML", "scikit-learn", "zope.interface", "a"] {
            assert!(PACKAGE_NAME.is_match(ok), "{ok}");
        }
        for bad in ["-r", "--index-url", "numpy ", "a/b", "pkg-", ""] {
            assert!(!PACKAGE_NAME.is_match(bad), "{bad:?}");
        }
    }

    #[test]
    fn source_names_reject_glob_and_substitution() {
        for bad in ["*.py", "a?.py", "[x].py", "$HOME.py", "../x.py", "a\nb.py", "-x.py"] {
            assert!(!SOURCE_NAME.is_match(bad), "{bad:?}");
        }
        assert!(SOURCE_NAME.is_match("my tool.py"));
    }

    #[test]
    fn generated_names_are_reserved_in_any_case() {
        for name in ["requirements.txt", "Requirements.TXT", "Dockerfile", "dockerfile"] {
            assert!(is_generated_name(name), "{name}");
        }
        assert!(!is_generated_name("requirements.py"));
        assert!(!is_generated_name("Dockerfile.py"));
    }
}
