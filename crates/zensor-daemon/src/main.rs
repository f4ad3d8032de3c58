mod cli;

use clap::Parser;
use cli::{
    handle_config, handle_identity, init_daemon, init_logging, load_config, prove_signal,
    run_daemon, show_signal, verify_proof, Cli, Commands, ProveArgs,
};
use zensor_daemon::config::default_data_dir;
use zensor_types::ZensorResult;

#[tokio::main]
async fn main() -> ZensorResult<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join("config.toml"));

    match cli.command {
        Commands::Init {
            force,
            ref group,
            ref directory_url,
        } => {
            return init_daemon(
                &config_path,
                &data_dir,
                force,
                group.clone(),
                directory_url.clone(),
            );
        }
        Commands::Config { action } => return handle_config(&config_path, action),
        Commands::Signal { ref file, readings } => {
            return show_signal(file, readings, &cli.format);
        }
        _ => {}
    }

    let config = load_config(&config_path, cli.data_dir.as_deref())?;
    init_logging(&cli, &config.logging)?;

    match cli.command {
        Commands::Run { pid_file } => {
            run_daemon(config, pid_file.as_deref()).await?;
        }
        Commands::Identity { action } => {
            handle_identity(action, &config, &cli.format).await?;
        }
        Commands::Prove {
            tag,
            group,
            signal,
            file,
            daemon,
            from_directory,
            output,
            submit,
        } => {
            let args = ProveArgs {
                tag,
                group,
                signal,
                file,
                daemon,
                from_directory,
                output,
                submit,
            };
            prove_signal(&config, args, &cli.format).await?;
        }
        Commands::Verify { proof, group } => {
            verify_proof(&config, &proof, group, &cli.format)?;
        }
        Commands::Init { .. } | Commands::Config { .. } | Commands::Signal { .. } => {}
    }

    Ok(())
}
