#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod group;
pub mod node;
pub mod prover;
pub mod storage;
pub mod vault;
pub mod verification;

pub use api::{ApiServer, AppState};
pub use config::{DaemonConfig, ProverBackendKind};
pub use group::{endpoint_url, GroupDirectoryClient, GroupInfo, GroupRegistry, GroupSummary};
pub use node::ZensorNode;
pub use prover::{
    backend_from_config, load_or_generate_keys, LocalBackend, ProofEngine, ProofJob,
    ProvingBackend, RemoteBackend, RetryPolicy,
};
pub use storage::{SignalLedger, SignalRecord, StorageConfig};
pub use vault::IdentityVault;
pub use verification::{RejectReason, Verdict, VerificationService, VerificationStatsSnapshot};
