use airseal_core::{AirsealConfig, EngineKind, PinStrategy, Runtime};
use tempfile::TempDir;

#[test]
fn load_returns_defaults_when_no_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = AirsealConfig::load(tmp.path()).unwrap();

    assert_eq!(config.build.runtime, Runtime::Python);
    assert_eq!(config.build.effective_base_image(), "python:3.12-slim");
    assert_eq!(
        config.build.build_directory_root,
        tmp.path().join(".airseal/runs")
    );
    assert_eq!(config.build.engine, EngineKind::Docker);
    assert_eq!(config.build.build_timeout_seconds, 1800);
    assert_eq!(config.build.engine_command_timeout().as_secs(), 600);
    assert!(!config.build.keep_context);
    assert!(config.build.system_packages.is_empty());
    assert!(config.build.env.is_empty());

    assert_eq!(config.resolve.index_url, "https://pypi.org");
    assert_eq!(config.resolve.lookup_timeout_seconds, 10);
    assert!(!config.resolve.allow_partial_manifest);
    assert!(config.resolve.max_unresolved.is_none());
    assert!(config.resolve.optional.is_empty());
    assert_eq!(config.resolve.pin, PinStrategy::Latest);
    assert!(config.resolve.pins.is_empty());
    assert!(config.resolve.aliases.is_empty());
}

#[test]
fn load_parses_full_config() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[build]
runtime = "python"
base_image = "python:3.11-slim-bookworm"
build_directory_root = "/var/tmp/airseal"
engine = "podman"
build_timeout_seconds = 600
keep_context = true
system_packages = ["libgomp1"]

[build.env]
TZ = "UTC"

[resolve]
index_url = "https://mirror.internal"
lookup_timeout_seconds = 3
allow_partial_manifest = true
max_unresolved = 2
optional = ["win32api"]
pin = "unpinned"

[resolve.pins]
numpy = "1.26.4"

[resolve.aliases]
mylib = "my-lib-dist"
"#;
    std::fs::write(tmp.path().join("airseal.toml"), toml).unwrap();

    let config = AirsealConfig::load(tmp.path()).unwrap();

    assert_eq!(
        config.build.effective_base_image(),
        "python:3.11-slim-bookworm"
    );
    assert_eq!(
        config.build.build_directory_root,
        std::path::PathBuf::from("/var/tmp/airseal")
    );
    assert_eq!(config.build.engine, EngineKind::Podman);
    assert_eq!(config.build.engine.binary(), "podman");
    assert_eq!(config.build.build_timeout().as_secs(), 600);
    assert!(config.build.keep_context);
    assert_eq!(config.build.system_packages, vec!["libgomp1"]);
    assert_eq!(config.build.env["TZ"], "UTC");

    assert_eq!(config.resolve.index_url, "https://mirror.internal");
    assert_eq!(config.resolve.lookup_timeout().as_secs(), 3);
    assert!(config.resolve.allow_partial_manifest);
    assert_eq!(config.resolve.max_unresolved, Some(2));
    assert!(config.resolve.optional.contains("win32api"));
    assert_eq!(config.resolve.pin, PinStrategy::Unpinned);
    assert_eq!(config.resolve.pins["numpy"], "1.26.4");
    assert_eq!(config.resolve.aliases["mylib"], "my-lib-dist");
}

#[test]
fn load_partial_config_fills_defaults() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[resolve]
allow_partial_manifest = true
"#;
    std::fs::write(tmp.path().join("airseal.toml"), toml).unwrap();

    let config = AirsealConfig::load(tmp.path()).unwrap();

    assert!(config.resolve.allow_partial_manifest);
    // Defaults preserved
    assert_eq!(config.resolve.lookup_timeout_seconds, 10);
    assert_eq!(config.build.effective_base_image(), "python:3.12-slim");
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("airseal.toml"), "not valid {{{{ toml").unwrap();

    let result = AirsealConfig::load(tmp.path());
    assert!(result.is_err());

    let err = result.unwrap_err().to_string();
    assert!(err.contains("parse"));
}

#[test]
fn load_unknown_pin_strategy_is_parse_error() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("airseal.toml"),
        "[resolve]\npin = \"lockfile\"\n",
    )
    .unwrap();

    let err = AirsealConfig::load(tmp.path()).unwrap_err().to_string();
    assert!(err.contains("parse"), "got: {err}");
}

#[test]
fn load_empty_config_returns_defaults() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("airseal.toml"), "").unwrap();

    let config = AirsealConfig::load(tmp.path()).unwrap();
    assert_eq!(config.resolve.lookup_timeout_seconds, 10);
}

#[test]
fn zero_lookup_timeout_is_rejected() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("airseal.toml"),
        "[resolve]\nlookup_timeout_seconds = 0\n",
    )
    .unwrap();

    let err = AirsealConfig::load(tmp.path()).unwrap_err().to_string();
    assert!(err.contains("resolve.lookup_timeout_seconds"), "got: {err}");
}

#[test]
fn zero_build_timeout_is_rejected() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("airseal.toml"),
        "[build]\nbuild_timeout_seconds = 0\n",
    )
    .unwrap();

    let err = AirsealConfig::load(tmp.path()).unwrap_err().to_string();
    assert!(err.contains("build.build_timeout_seconds"), "got: {err}");
}

#[test]
fn zero_engine_command_timeout_is_rejected() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("airseal.toml"),
        "[build]\nengine_command_timeout_seconds = 0\n",
    )
    .unwrap();

    let err = AirsealConfig::load(tmp.path()).unwrap_err().to_string();
    assert!(err.contains("build.engine_command_timeout_seconds"), "got: {err}");
}
