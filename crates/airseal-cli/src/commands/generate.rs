use std::path::Path;

use airseal::pipeline::Pipeline;

use super::ManifestPolicy;

pub async fn generate(
    config_dir: &Path,
    file: &Path,
    out: &Path,
    force: bool,
    policy: ManifestPolicy,
) -> anyhow::Result<()> {
    let mut config = super::load_config(config_dir)?;
    policy.apply(&mut config);
    let source = super::read_source(file, &config)?;
    let engine = config.build.engine.binary();
    let pipeline = Pipeline::new(config)?;

    let generated = pipeline.generate(&source, out, force).await?;

    super::print_warnings(&generated.prepared.warnings);
    let ctx = &generated.context;
    println!("Wrote {}", ctx.manifest.display());
    println!("Wrote {}", ctx.source.display());
    println!("Wrote {}", ctx.dockerfile.display());
    println!();
    println!(
        "{} package(s) pinned; build with: {engine} build -t airseal/{}:latest {}",
        generated.prepared.manifest.len(),
        source.slug(),
        ctx.dir.display()
    );
    Ok(())
}
