//! Proof generation: pre-flight membership checks, backend selection and retries.

mod engine;
mod local;
mod remote;

pub use engine::{ProofEngine, ProofJob, RetryPolicy};
pub use local::{load_or_generate_keys, LocalBackend};
pub use remote::RemoteBackend;

use async_trait::async_trait;
use std::sync::Arc;
use zensor_crypto::{MembershipKeys, MembershipWitness, ZkProof};
use zensor_types::ZensorResult;

use crate::config::{ProverBackendKind, ProverConfig};

/// Something that turns a witness into a Groth16 proof.
#[async_trait]
pub trait ProvingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn prove(&self, witness: MembershipWitness) -> ZensorResult<ZkProof>;
}

/// Backend selected by `prover.backend`. `keys` is required for the local backend.
pub fn backend_from_config(
    config: &ProverConfig,
    keys: Option<Arc<MembershipKeys>>,
) -> ZensorResult<Arc<dyn ProvingBackend>> {
    match config.backend {
        ProverBackendKind::Local => {
            let keys = keys.ok_or_else(|| {
                zensor_types::ZensorError::Config("Local prover requires proving keys".into())
            })?;
            Ok(Arc::new(LocalBackend::new(keys)))
        }
        ProverBackendKind::Remote => {
            let url = config.remote_url.as_deref().ok_or_else(|| {
                zensor_types::ZensorError::Config("prover.remote_url is not set".into())
            })?;
            Ok(Arc::new(RemoteBackend::new(url, config.request_timeout())?))
        }
    }
}
