mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "airseal",
    about = "Build airgapped container images from a single Python source file"
)]
#[command(version)]
struct Cli {
    /// Directory containing airseal.toml
    #[arg(long, global = true, default_value = ".")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a commented airseal.toml
    Init,
    /// Show imports, stdlib exclusions and resolved packages
    Analyze {
        /// Python source file
        file: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write requirements.txt, the source and a Dockerfile without building
    Generate {
        /// Python source file
        file: PathBuf,
        /// Output directory
        #[arg(long, default_value = "airseal-out")]
        out: PathBuf,
        /// Overwrite an existing Dockerfile in the output directory
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        manifest: ManifestArgs,
    },
    /// Build the image (and optionally export it)
    Build {
        /// Python source file
        file: PathBuf,
        /// Save the built image to this archive
        #[arg(long)]
        export: Option<PathBuf>,
        /// Keep the run's build directory
        #[arg(long)]
        keep_context: bool,
        /// Remove the local image after exporting it
        #[arg(long, requires = "export")]
        rm: bool,
        #[command(flatten)]
        manifest: ManifestArgs,
    },
    /// Check configuration and container engine readiness
    Doctor,
}

/// Manifest policy overrides shared by `generate` and `build`.
#[derive(Args)]
struct ManifestArgs {
    /// Write the manifest even if some imports stay unresolved
    #[arg(long)]
    allow_partial: bool,
    /// Import that may stay unresolved (repeatable)
    #[arg(long = "optional", value_name = "IMPORT")]
    optional: Vec<String>,
}

impl From<ManifestArgs> for commands::ManifestPolicy {
    fn from(args: ManifestArgs) -> Self {
        commands::ManifestPolicy {
            allow_partial: args.allow_partial,
            optional: args.optional,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config;

    match cli.command {
        Commands::Init => commands::init(&config_dir)?,
        Commands::Analyze { file, json } => commands::analyze(&config_dir, &file, json).await?,
        Commands::Generate {
            file,
            out,
            force,
            manifest,
        } => commands::generate(&config_dir, &file, &out, force, manifest.into()).await?,
        Commands::Build {
            file,
            export,
            keep_context,
            rm,
            manifest,
        } => {
            let options = commands::BuildOptions {
                export,
                keep_context,
                remove_after_export: rm,
            };
            commands::build(&config_dir, &file, options, manifest.into()).await?
        }
        Commands::Doctor => commands::doctor(&config_dir).await?,
    }

    Ok(())
}
