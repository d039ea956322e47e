use std::path::Path;

use airseal::config::CONFIG_FILE_NAME;

const TEMPLATE: &str = r#"[build]
# runtime = "python"
# base_image = "python:3.12-slim"
# build_directory_root = ".airseal/runs"
# engine = "docker"                # or "podman"
# build_timeout_seconds = 1800
# engine_command_timeout_seconds = 600   # version, save, rmi
# keep_context = false
# system_packages = ["libgomp1"]

# [build.env]
# APP_ENV = "production"

[resolve]
# index_url = "https://pypi.org"
# lookup_timeout_seconds = 10
# allow_partial_manifest = false
# max_unresolved = 3
# optional = ["ujson"]
# pin = "latest"                   # or "unpinned"

# [resolve.pins]
# numpy = "1.26.4"

# [resolve.aliases]
# internal_tools = "acme-internal-tools"
"#;

/// Write a commented airseal.toml into `config_dir`.
pub fn init(config_dir: &Path) -> anyhow::Result<()> {
    let path = config_dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        eprintln!("{} already exists, skipping", path.display());
        return Ok(());
    }

    std::fs::create_dir_all(config_dir)?;
    std::fs::write(&path, TEMPLATE)?;
    println!("Created {}", path.display());
    println!();
    println!("Next steps:");
    println!("  airseal analyze app.py     # see what will be installed");
    println!("  airseal build app.py --export app.tar");
    Ok(())
}
