use super::commands::ConfigAction;
use std::path::Path;
use zensor_daemon::DaemonConfig;
use zensor_types::{ZensorError, ZensorResult};

pub fn handle_config(config_path: &Path, action: Option<ConfigAction>) -> ZensorResult<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .map_err(|e| ZensorError::Config(format!("Failed to read config: {}", e)))?;
                println!("{}", content);
            } else {
                println!("\x1b[38;5;245mNo configuration file found at {:?}\x1b[0m", config_path);
                println!("Run '\x1b[38;5;51mzensor init\x1b[0m' to create one");
            }
        }
        Some(ConfigAction::Validate) => match DaemonConfig::load(config_path) {
            Ok(config) => {
                println!("\x1b[38;5;46m[+]\x1b[0m Configuration is valid");
                println!("    default group: {}", config.groups.default_group);
                println!("    tree depth:    {}", config.groups.tree_depth);
                println!("    root history:  {}", config.verifier.root_history_size);
                println!("    prover:        {}", config.prover.backend);
            }
            Err(e) => {
                println!("\x1b[38;5;196m[-]\x1b[0m Configuration error: {}", e);
                return Err(e);
            }
        },
    }
    Ok(())
}
