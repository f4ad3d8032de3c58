use super::commands::{Cli, OutputFormat};
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zensor_daemon::config::LoggingConfig;
use zensor_daemon::DaemonConfig;
use zensor_types::{ZensorError, ZensorResult};

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `RUST_LOG` wins over the `-v` count, which wins over `logging.level`.
pub fn init_logging(cli: &Cli, logging: &LoggingConfig) -> ZensorResult<()> {
    let level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => logging.level.as_filter(),
            1 => "info,zensor_daemon=debug,zensor_crypto=debug",
            2 => "debug",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let log_file = cli.log_file.as_ref().or(logging.file.as_ref());
    match (log_file, logging.json) {
        (Some(path), json) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ZensorError::Config(format!("Failed to open log file {:?}: {}", path, e)))?;
            let writer = std::sync::Mutex::new(file);
            if json {
                registry.with(fmt::layer().json().with_writer(writer)).init();
            } else {
                registry.with(fmt::layer().with_writer(writer).with_ansi(false)).init();
            }
        }
        (None, true) => registry.with(fmt::layer().json()).init(),
        (None, false) => registry.with(fmt::layer().with_target(cli.verbose >= 2)).init(),
    }
    Ok(())
}

/// Config file (or defaults) with env overrides. An explicit `--data-dir`
/// wins over the file's `data_dir`.
pub fn load_config(config_path: &Path, data_dir: Option<&Path>) -> ZensorResult<DaemonConfig> {
    let mut config = DaemonConfig::load(config_path)?;
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    Ok(config)
}

pub fn print_banner() {
    println!("\x1b[38;5;39m");
    println!(
        r#"
    ███████╗███████╗███╗   ██╗███████╗ ██████╗ ██████╗
    ╚══███╔╝██╔════╝████╗  ██║██╔════╝██╔═══██╗██╔══██╗
      ███╔╝ █████╗  ██╔██╗ ██║███████╗██║   ██║██████╔╝
     ███╔╝  ██╔══╝  ██║╚██╗██║╚════██║██║   ██║██╔══██╗
    ███████╗███████╗██║ ╚████║███████║╚██████╔╝██║  ██║
    ╚══════╝╚══════╝╚═╝  ╚═══╝╚══════╝ ╚═════╝ ╚═╝  ╚═╝"#
    );
    println!("\x1b[0m");
    println!("        \x1b[38;5;245mAnonymous sensor attestations - v{}\x1b[0m", BUILD_VERSION);
    println!();
}

pub fn print_json<T: Serialize>(value: &T) -> ZensorResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ZensorError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

pub fn print_ok(format: &OutputFormat, message: &str) {
    if let OutputFormat::Text = format {
        println!("\x1b[38;5;46m[+]\x1b[0m {}", message);
    }
}

pub fn read_file(path: &Path) -> ZensorResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| ZensorError::Config(format!("Failed to read {:?}: {}", path, e)))
}
