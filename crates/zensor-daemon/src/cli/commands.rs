use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "zensor")]
#[command(version = BUILD_VERSION)]
#[command(about = "zensor - Anonymous, unlinkable attestations for sensor data")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, global = true, value_name = "FILE", help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'd', long, global = true, value_name = "DIR", env = "ZENSOR_DATA_DIR", help = "Data directory path")]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text", help = "Output format")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the daemon")]
    #[command(long_about = "Start the zensor daemon.\n\nThe daemon serves the configured groups, verifies submitted proofs and records accepted signals.")]
    Run {
        #[arg(long, value_name = "FILE", help = "Write PID to file")]
        pid_file: Option<PathBuf>,
    },

    #[command(about = "Write the default configuration")]
    Init {
        #[arg(short, long, help = "Overwrite existing configuration")]
        force: bool,
        #[arg(long, value_name = "ID", help = "Default group id")]
        group: Option<String>,
        #[arg(long, value_name = "URL", help = "Group directory base URL")]
        directory_url: Option<String>,
    },

    #[command(about = "Manage device identities")]
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },

    #[command(about = "Print the signal for a sensor data file")]
    Signal {
        #[arg(help = "Sensor data file")]
        file: PathBuf,
        #[arg(long, help = "Also parse and print the sensor readings")]
        readings: bool,
    },

    #[command(about = "Generate a membership proof for a signal")]
    Prove {
        #[arg(long, default_value = "default", help = "Identity tag")]
        tag: String,
        #[arg(long, help = "Group id (defaults to groups.default_group)")]
        group: Option<String>,
        #[arg(long, conflicts_with = "file", help = "Signal to attest")]
        signal: Option<String>,
        #[arg(long, help = "Sensor data file; the signal is its SHA-256")]
        file: Option<PathBuf>,
        #[arg(long, value_name = "URL", help = "Daemon to read the group from (default: the local API)")]
        daemon: Option<String>,
        #[arg(long, help = "Read the group from the directory instead of a daemon")]
        from_directory: bool,
        #[arg(short, long, help = "Write the proof to a file")]
        output: Option<PathBuf>,
        #[arg(long, help = "Submit the proof to the daemon")]
        submit: bool,
    },

    #[command(about = "Verify a proof file offline")]
    Verify {
        #[arg(help = "Proof JSON file")]
        proof: PathBuf,
        #[arg(long, help = "Group id (defaults to groups.default_group)")]
        group: Option<String>,
    },

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Validate configuration")]
    Validate,
}

#[derive(Subcommand)]
pub enum IdentityAction {
    #[command(about = "Create and store a new identity")]
    Create {
        #[arg(long, default_value = "default", help = "Identity tag")]
        tag: String,
        #[arg(long, conflicts_with = "sensor_log", help = "Seed string for a deterministic identity")]
        seed: Option<String>,
        #[arg(long, help = "Sensor log to take the PUF seed from")]
        sensor_log: Option<PathBuf>,
        #[arg(short, long, help = "Overwrite an existing identity")]
        force: bool,
    },
    #[command(about = "Show identity details")]
    Show {
        #[arg(long, default_value = "default", help = "Identity tag")]
        tag: String,
    },
    #[command(about = "Print the identity commitment")]
    Commitment {
        #[arg(long, default_value = "default", help = "Identity tag")]
        tag: String,
        #[arg(long, help = "Print as a decimal integer")]
        decimal: bool,
    },
    #[command(about = "List stored identities")]
    List,
    #[command(about = "Print the directory link that adds this identity to a group")]
    JoinUrl {
        #[arg(long, default_value = "default", help = "Identity tag")]
        tag: String,
        #[arg(long, help = "Group id (defaults to groups.default_group)")]
        group: Option<String>,
        #[arg(long, default_value = "http://localhost:3000/proofs", help = "Where the directory sends the user afterwards")]
        redirect_uri: String,
    },
}
