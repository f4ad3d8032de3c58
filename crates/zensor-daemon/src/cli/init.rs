use std::path::Path;
use zensor_daemon::DaemonConfig;
use zensor_types::{ZensorError, ZensorResult};

pub fn init_daemon(
    config_path: &Path,
    data_dir: &Path,
    force: bool,
    group: Option<String>,
    directory_url: Option<String>,
) -> ZensorResult<()> {
    println!("\x1b[38;5;39mInitializing zensor...\x1b[0m");
    println!();

    if config_path.exists() && !force {
        println!("\x1b[38;5;226mConfiguration already exists at {:?}\x1b[0m", config_path);
        println!("Use --force to overwrite");
        return Ok(());
    }

    std::fs::create_dir_all(data_dir)
        .map_err(|e| ZensorError::Config(format!("Failed to create data directory: {}", e)))?;

    let mut config = DaemonConfig {
        data_dir: data_dir.to_path_buf(),
        ..DaemonConfig::default()
    };
    if let Some(group) = group {
        config.groups.default_group = group;
    }
    if let Some(url) = directory_url {
        config.directory.url = Some(url);
    }
    config.validate()?;
    config.save(config_path)?;

    println!("\x1b[38;5;46m[+]\x1b[0m Configuration written to {:?}", config_path);
    println!("\x1b[38;5;46m[+]\x1b[0m Default group: {}", config.groups.default_group);
    println!();
    println!("Next steps:");
    println!("  1. Create a device identity: \x1b[38;5;51mzensor identity create --sensor-log <log>\x1b[0m");
    println!("  2. Start the daemon:         \x1b[38;5;51mzensor run\x1b[0m");
    println!();
    println!("Proving keys are generated on first start unless prover.keys_dir points at existing ones.");
    Ok(())
}
