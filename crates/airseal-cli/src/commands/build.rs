use std::path::{Path, PathBuf};

use airseal::pipeline::{Pipeline, RunOptions, RunOutcome};

use super::ManifestPolicy;

pub struct BuildOptions {
    pub export: Option<PathBuf>,
    pub keep_context: bool,
    pub remove_after_export: bool,
}

/// Run the full pipeline: analyze → manifest → Dockerfile → build → export.
pub async fn build(
    config_dir: &Path,
    file: &Path,
    options: BuildOptions,
    policy: ManifestPolicy,
) -> anyhow::Result<()> {
    let mut config = super::load_config(config_dir)?;
    policy.apply(&mut config);
    if options.keep_context {
        config.build.keep_context = true;
    }
    let source = super::read_source(file, &config)?;
    let engine = config.build.engine.binary();
    let pipeline = Pipeline::new(config)?;

    let run_options = RunOptions {
        export: options.export,
        remove_after_export: options.remove_after_export,
    };
    let report = pipeline
        .run(source, &run_options, |line| println!("  {line}"))
        .await;

    super::print_warnings(&report.warnings);

    println!();
    let stages: Vec<&str> = report.history.iter().map(|s| s.name()).collect();
    println!("Run {}: {}", report.run_id, stages.join(" -> "));
    if let Some(dir) = &report.context_dir {
        println!("Build context kept at {}", dir.display());
    }

    match &report.outcome {
        RunOutcome::Succeeded { image_tag, archive } => {
            println!("Image: {image_tag}");
            if let Some(archive) = archive {
                println!("Archive: {}", archive.display());
                println!();
                println!("Load it on the airgapped host with:");
                println!("  {engine} load -i {}", archive.display());
            }
            Ok(())
        }
        RunOutcome::Failed { .. } => anyhow::bail!("{}", report.outcome),
    }
}
