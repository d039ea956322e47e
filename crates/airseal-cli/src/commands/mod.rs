mod analyze;
mod build;
mod doctor;
mod generate;
mod init;

use std::path::Path;

use airseal::{AirsealConfig, SourceFile};

pub use analyze::analyze;
pub use build::{BuildOptions, build};
pub use doctor::doctor;
pub use generate::generate;
pub use init::init;

/// Command-line overrides of `[resolve]` manifest policy.
pub struct ManifestPolicy {
    pub allow_partial: bool,
    pub optional: Vec<String>,
}

impl ManifestPolicy {
    fn apply(self, config: &mut AirsealConfig) {
        if self.allow_partial {
            config.resolve.allow_partial_manifest = true;
        }
        config.resolve.optional.extend(self.optional);
    }
}

fn load_config(config_dir: &Path) -> anyhow::Result<AirsealConfig> {
    let config = AirsealConfig::load(config_dir)?;
    tracing::debug!(
        engine = config.build.engine.binary(),
        index = %config.resolve.index_url,
        build_root = %config.build.build_directory_root.display(),
        "config loaded"
    );
    Ok(config)
}

fn read_source(file: &Path, config: &AirsealConfig) -> anyhow::Result<SourceFile> {
    let source = SourceFile::read(file)?;
    source.check_runtime(config.build.runtime)?;
    Ok(source)
}

fn print_warnings(warnings: &[airseal::resolve::ResolutionWarning]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}
