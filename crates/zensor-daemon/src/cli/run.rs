use super::utils::print_banner;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{error, info};
use zensor_daemon::{DaemonConfig, ZensorNode};
use zensor_types::{ZensorError, ZensorResult};

pub async fn run_daemon(config: DaemonConfig, pid_file: Option<&Path>) -> ZensorResult<()> {
    print_banner();
    info!("Starting zensor daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", config.data_dir);

    if let Some(pid_path) = pid_file {
        std::fs::write(pid_path, std::process::id().to_string())
            .map_err(|e| ZensorError::Config(format!("Failed to write PID file: {}", e)))?;
        info!("PID file written: {:?}", pid_path);
    }

    let mut node = ZensorNode::build(config).await?;
    let api_addr = node.start().await?;

    print_ready_message(&node, api_addr).await;

    wait_for_shutdown().await?;

    info!("Shutting down...");
    if let Err(e) = node.stop().await {
        error!("Shutdown error: {}", e);
    }

    if let Some(pid_path) = pid_file {
        let _ = std::fs::remove_file(pid_path);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn print_ready_message(node: &ZensorNode, api_addr: Option<SocketAddr>) {
    let config = node.config();
    let groups = node.registry().group_ids().await;

    println!();
    println!("\x1b[38;5;39m╔══════════════════════════════════════════════════════════════╗\x1b[0m");
    println!("\x1b[38;5;39m║\x1b[0m  \x1b[1;38;5;39mzensor daemon is now running\x1b[0m                                \x1b[38;5;39m║\x1b[0m");
    println!("\x1b[38;5;39m╠══════════════════════════════════════════════════════════════╣\x1b[0m");
    match api_addr {
        Some(addr) => println!("\x1b[38;5;39m║\x1b[0m  API:     \x1b[38;5;51mhttp://{:<44}\x1b[0m \x1b[38;5;39m║\x1b[0m", addr),
        None => println!("\x1b[38;5;39m║\x1b[0m  API:     \x1b[38;5;245m{:<51}\x1b[0m \x1b[38;5;39m║\x1b[0m", "disabled"),
    }
    println!("\x1b[38;5;39m║\x1b[0m  Prover:  \x1b[38;5;226m{:<51}\x1b[0m \x1b[38;5;39m║\x1b[0m", node.engine().backend_name());
    println!("\x1b[38;5;39m║\x1b[0m  Default: \x1b[38;5;226m{:<51}\x1b[0m \x1b[38;5;39m║\x1b[0m", config.groups.default_group);
    println!("\x1b[38;5;39m║\x1b[0m  Groups:  \x1b[38;5;226m{:<51}\x1b[0m \x1b[38;5;39m║\x1b[0m", groups.len());
    println!("\x1b[38;5;39m║\x1b[0m  Root K:  \x1b[38;5;226m{:<51}\x1b[0m \x1b[38;5;39m║\x1b[0m", config.verifier.root_history_size);
    println!("\x1b[38;5;39m╠══════════════════════════════════════════════════════════════╣\x1b[0m");
    println!("\x1b[38;5;39m║\x1b[0m  \x1b[38;5;245mPress Ctrl+C to stop\x1b[0m                                        \x1b[38;5;39m║\x1b[0m");
    println!("\x1b[38;5;39m╚══════════════════════════════════════════════════════════════╝\x1b[0m");
    println!();
}

async fn wait_for_shutdown() -> ZensorResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let install = |kind: SignalKind| {
            signal(kind).map_err(|e| ZensorError::Internal(format!("Failed to install signal handler: {}", e)))
        };
        let mut sigterm = install(SignalKind::terminate())?;
        let mut sigint = install(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => { info!("Received SIGTERM"); }
            _ = sigint.recv() => { info!("Received SIGINT"); }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| ZensorError::Internal(format!("Failed to install Ctrl+C handler: {}", e)))?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
