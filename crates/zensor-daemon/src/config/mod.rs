mod api;
mod constants;
mod daemon;
mod directory;
mod groups;
mod logging;
mod prover;
mod types;
mod verifier;

pub use api::ApiConfig;
pub use constants::*;
pub use daemon::{default_data_dir, DaemonConfig};
pub use directory::DirectoryConfig;
pub use groups::GroupsConfig;
pub use logging::LoggingConfig;
pub use prover::ProverConfig;
pub use types::*;
pub use verifier::VerifierConfig;
