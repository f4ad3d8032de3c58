mod commands;
mod config_cmd;
mod identity;
mod init;
mod proof;
mod run;
mod signal;
mod utils;

pub use commands::{Cli, Commands};
pub use config_cmd::handle_config;
pub use identity::handle_identity;
pub use init::init_daemon;
pub use proof::{prove_signal, verify_proof, ProveArgs};
pub use run::run_daemon;
pub use signal::show_signal;
pub use utils::{init_logging, load_config};
