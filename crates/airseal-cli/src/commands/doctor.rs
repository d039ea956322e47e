use std::path::Path;

use airseal::AirsealConfig;
use airseal::config::CONFIG_FILE_NAME;
use airseal::engine::{CheckResult, EngineClient};

pub async fn doctor(config_dir: &Path) -> anyhow::Result<()> {
    let config_path = config_dir.join(CONFIG_FILE_NAME);
    let loaded = AirsealConfig::load(config_dir);

    let config_check = match &loaded {
        Ok(_) if config_path.exists() => CheckResult::ok(&config_path.display().to_string()),
        Ok(_) => CheckResult::ok("not found, using defaults"),
        Err(e) => CheckResult::fail(&e.to_string()),
    };

    let engine_kind = loaded
        .as_ref()
        // arch-lint: allow(no-silent-result-drop) reason="doctor must report engine diagnostics even when airseal.toml is invalid"
        .ok()
        .map(|c| c.build.engine)
        .unwrap_or_default();
    let report = EngineClient::new(engine_kind).doctor().await;

    println!();
    println!("airseal doctor");
    println!("------------------------------");
    print_check("Config file", &config_check);
    print_check(&format!("{} CLI", engine_kind.binary()), &report.cli);
    print_check(&format!("{} daemon", engine_kind.binary()), &report.daemon);

    if !(config_check.passed && report.all_passed()) {
        anyhow::bail!("some checks failed, see above for details");
    }

    Ok(())
}

fn print_check(label: &str, check: &CheckResult) {
    println!("{label:<16} {}  {}", check.icon(), check.detail);
}
