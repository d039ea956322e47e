use std::path::Path;

use airseal::pipeline::{Analysis, Pipeline};
use airseal::resolve::{Resolution, ResolvedDependency};
use serde::Serialize;

#[derive(Serialize)]
struct AnalyzeReport<'a> {
    source: &'a str,
    imports: Vec<&'a str>,
    stdlib: Vec<&'a str>,
    dependencies: Vec<DependencyReport<'a>>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct DependencyReport<'a> {
    import: &'a str,
    package: Option<&'a str>,
    version: Option<&'a str>,
    alias: bool,
    unresolved: Option<String>,
}

impl<'a> From<&'a ResolvedDependency> for DependencyReport<'a> {
    fn from(dep: &'a ResolvedDependency) -> Self {
        Self {
            import: &dep.import_name,
            package: dep.package_name(),
            version: dep.version(),
            alias: matches!(dep.resolution, Resolution::AliasResolved { .. }),
            unresolved: dep.unresolved_reason().map(ToString::to_string),
        }
    }
}

pub async fn analyze(config_dir: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_dir)?;
    let source = super::read_source(file, &config)?;
    let pipeline = Pipeline::new(config)?;

    let analysis = pipeline.analyze(&source).await;

    if json {
        let report = AnalyzeReport {
            source: source.filename(),
            imports: analysis.imports.iter().collect(),
            stdlib: analysis.excluded.iter().collect(),
            dependencies: analysis.dependencies.iter().map(Into::into).collect(),
            warnings: analysis.warnings().iter().map(ToString::to_string).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human(source.filename(), &analysis);
    }

    Ok(())
}

fn print_human(filename: &str, analysis: &Analysis) {
    let join = |names: Vec<&str>| {
        if names.is_empty() {
            "(none)".to_owned()
        } else {
            names.join(", ")
        }
    };

    println!("{filename}");
    println!("  imports:  {}", join(analysis.imports.iter().collect()));
    println!("  stdlib:   {}", join(analysis.excluded.iter().collect()));

    if analysis.dependencies.is_empty() {
        println!("  packages: (none)");
        return;
    }

    println!("  packages:");
    for dep in &analysis.dependencies {
        match &dep.resolution {
            Resolution::Resolved { package, version } => {
                println!("    {:<20} {}", dep.import_name, spec(package, version.as_deref()));
            }
            Resolution::AliasResolved { package, version } => {
                println!(
                    "    {:<20} {} (alias)",
                    dep.import_name,
                    spec(package, version.as_deref())
                );
            }
            Resolution::Unresolved(reason) => {
                println!("    {:<20} UNRESOLVED ({reason})", dep.import_name);
            }
        }
    }

    super::print_warnings(&analysis.warnings());
}

fn spec(package: &str, version: Option<&str>) -> String {
    match version {
        Some(v) => format!("{package}=={v}"),
        None => package.to_owned(),
    }
}
