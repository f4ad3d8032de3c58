use backoff::ExponentialBackoffBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zensor_crypto::{Identity, MembershipTree, MembershipWitness, ZkProof};
use zensor_types::{ZensorError, ZensorResult};

use super::ProvingBackend;
use crate::config::ProverConfig;
use crate::group::GroupRegistry;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_elapsed: Duration,
}

impl From<&ProverConfig> for RetryPolicy {
    fn from(config: &ProverConfig) -> Self {
        Self {
            initial_interval: config.retry_initial_interval(),
            max_elapsed: config.retry_max_elapsed(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ProverConfig::default())
    }
}

#[derive(Clone)]
pub struct ProofEngine {
    backend: Arc<dyn ProvingBackend>,
    retry: RetryPolicy,
}

impl ProofEngine {
    pub fn new(backend: Arc<dyn ProvingBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Builds the witness for `identity` in `tree`. Fails with `NotAMember`
    /// when the identity's commitment is not a leaf.
    pub fn prepare(
        &self,
        identity: &Identity,
        tree: &MembershipTree,
        group_id: &str,
        signal: &str,
    ) -> ZensorResult<MembershipWitness> {
        let index = tree
            .index_of(&identity.commitment())
            .ok_or_else(|| ZensorError::NotAMember(group_id.to_string()))?;
        let path = tree.proof_path(index)?;
        Ok(MembershipWitness::new(identity, path, group_id, signal))
    }

    /// Proves `witness`, retrying while the backend is unavailable.
    pub async fn prove(&self, witness: MembershipWitness) -> ZensorResult<ZkProof> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry.initial_interval)
            .with_max_elapsed_time(Some(self.retry.max_elapsed))
            .build();

        debug!(
            group = %witness.group_id,
            root = %witness.path.root.short(),
            backend = self.backend.name(),
            "Generating membership proof"
        );

        backoff::future::retry(policy, || {
            let backend = self.backend.clone();
            let witness = witness.clone();
            async move {
                backend.prove(witness).await.map_err(|e| match e {
                    ZensorError::BackendUnavailable(_) => {
                        warn!("Proving backend unavailable, retrying: {}", e);
                        backoff::Error::transient(e)
                    }
                    e => backoff::Error::permanent(e),
                })
            }
        })
        .await
    }

    pub async fn generate(
        &self,
        identity: &Identity,
        tree: &MembershipTree,
        group_id: &str,
        signal: &str,
    ) -> ZensorResult<ZkProof> {
        let witness = self.prepare(identity, tree, group_id, signal)?;
        self.prove(witness).await
    }

    /// Like [`generate`](Self::generate), reading the tree from `registry`.
    /// The read lock is released before proving starts.
    pub async fn generate_for_group(
        &self,
        registry: &GroupRegistry,
        identity: &Identity,
        group_id: &str,
        signal: &str,
    ) -> ZensorResult<ZkProof> {
        let witness = registry
            .with_tree(group_id, |tree| self.prepare(identity, tree, group_id, signal))
            .await??;
        self.prove(witness).await
    }

    /// Starts proof generation in the background.
    pub fn spawn(
        &self,
        identity: &Identity,
        tree: &MembershipTree,
        group_id: &str,
        signal: &str,
    ) -> ProofJob {
        let prepared = self.prepare(identity, tree, group_id, signal);
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            match prepared {
                Ok(witness) => engine.prove(witness).await,
                Err(e) => Err(e),
            }
        });
        ProofJob { handle }
    }
}

/// A proof being generated on the runtime.
pub struct ProofJob {
    handle: JoinHandle<ZensorResult<ZkProof>>,
}

impl ProofJob {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    pub async fn wait(self) -> ZensorResult<ZkProof> {
        self.handle
            .await
            .map_err(|e| ZensorError::Internal(format!("Proof job failed: {}", e)))?
    }
}
