use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use zensor_crypto::{parse_field_hash, MembershipKeys};
use zensor_types::{ZensorError, ZensorResult};

use crate::api::{ApiServer, AppState};
use crate::config::DaemonConfig;
use crate::group::{GroupDirectoryClient, GroupRegistry};
use crate::prover::{backend_from_config, load_or_generate_keys, LocalBackend, ProofEngine, RetryPolicy};
use crate::storage::SignalLedger;
use crate::verification::VerificationService;

/// A running daemon: keys, groups, ledger, verifier, prover and the API server.
pub struct ZensorNode {
    config: DaemonConfig,
    keys: Arc<MembershipKeys>,
    registry: Arc<GroupRegistry>,
    verifier: Arc<VerificationService>,
    engine: ProofEngine,
    api: Option<ApiServer>,
    started_at: Instant,
}

impl ZensorNode {
    /// Opens storage, loads (or generates) keys and populates the configured groups.
    pub async fn build(config: DaemonConfig) -> ZensorResult<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            ZensorError::Config(format!("Failed to create data directory: {}", e))
        })?;

        let keys_dir = config.keys_dir();
        let depth = config.groups.tree_depth;
        let generate = config.prover.generate_missing_keys;
        let keys = tokio::task::spawn_blocking(move || {
            load_or_generate_keys(&keys_dir, depth, generate)
        })
        .await
        .map_err(|e| ZensorError::Internal(format!("Key loading task failed: {}", e)))??;
        let keys = Arc::new(keys);

        let mut registry = GroupRegistry::new(depth, config.verifier.root_history_size)?;
        if let Some(directory) = GroupDirectoryClient::from_config(&config.directory)? {
            info!("Group directory: {}", directory.base_url());
            registry = registry.with_directory(directory);
        }
        let registry = Arc::new(registry);
        Self::populate_groups(&config, &registry).await?;

        let ledger_path = config.ledger_path();
        let ledger = Arc::new(SignalLedger::open(&ledger_path, &config.storage)?);
        info!("Signal ledger at {:?} ({} signals)", ledger_path, ledger.len());

        let verifier = Arc::new(VerificationService::new(
            keys.clone(),
            registry.clone(),
            ledger,
        ));

        let backend = backend_from_config(&config.prover, Some(keys.clone()))?;
        let engine = ProofEngine::new(backend, RetryPolicy::from(&config.prover));
        info!("Proving backend: {}", engine.backend_name());

        Ok(Self {
            config,
            keys,
            registry,
            verifier,
            engine,
            api: None,
            started_at: Instant::now(),
        })
    }

    async fn populate_groups(config: &DaemonConfig, registry: &GroupRegistry) -> ZensorResult<()> {
        for group_id in config.groups.group_ids() {
            registry.create_group(&group_id).await?;
        }

        for (group_id, members) in &config.groups.members {
            let commitments = members
                .iter()
                .map(|m| parse_field_hash(m))
                .collect::<ZensorResult<Vec<_>>>()?;
            let count = commitments.len();
            registry.replace_members(group_id, commitments).await?;
            info!("Loaded {} configured members into {}", count, group_id);
        }

        if config.groups.sync_on_start {
            for group_id in config.groups.group_ids() {
                if let Err(e) = registry.sync_from_directory(&group_id).await {
                    warn!("Initial sync of {} failed: {}", group_id, e);
                }
            }
        }
        Ok(())
    }

    pub fn app_state(&self) -> AppState {
        let mut state = AppState::new(self.verifier.clone(), self.config.groups.default_group.clone())
            .with_prover_backend(self.engine.backend_name())
            .with_registration(self.config.groups.allow_registration);
        if self.config.prover.serve_remote {
            state = state.serving_proofs(Arc::new(LocalBackend::new(self.keys.clone())));
        }
        state
    }

    /// Starts the API server when enabled. Returns its bound address.
    pub async fn start(&mut self) -> ZensorResult<Option<SocketAddr>> {
        if !self.config.api.enabled {
            info!("HTTP API disabled");
            return Ok(None);
        }

        let server = ApiServer::new(
            self.config.api_socket_addr(),
            self.config.api.clone(),
            self.app_state(),
        );
        let addr = server.start().await?;
        self.api = Some(server);
        Ok(Some(addr))
    }

    pub async fn stop(&mut self) -> ZensorResult<()> {
        if let Some(api) = self.api.take() {
            api.stop().await;
        }
        if let Err(e) = self.verifier.ledger().flush() {
            error!("Failed to flush ledger: {}", e);
            return Err(e);
        }
        info!("Node stopped after {}s", self.uptime_secs());
        Ok(())
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn keys(&self) -> &Arc<MembershipKeys> {
        &self.keys
    }

    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    pub fn verifier(&self) -> &Arc<VerificationService> {
        &self.verifier
    }

    pub fn engine(&self) -> &ProofEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use zensor_crypto::Identity;

    fn config(dir: &std::path::Path) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.data_dir = dir.to_path_buf();
        config.api.port = 0;
        config.groups.tree_depth = 4;
        config.verifier.root_history_size = 4;
        config
    }

    #[tokio::test]
    async fn test_node_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let identity = Identity::create(Some(b"node-device")).unwrap();

        let mut config = config(dir.path());
        config.groups.members.insert(
            config.groups.default_group.clone(),
            vec![identity.commitment().to_hex()],
        );
        let group = config.groups.default_group.clone();

        let mut node = ZensorNode::build(config.clone()).await.unwrap();
        assert_eq!(node.engine().backend_name(), "local");
        assert_eq!(node.registry().summary(&group).await.unwrap().size, 1);

        let addr = node.start().await.unwrap().unwrap();
        let proof = node
            .engine()
            .generate_for_group(node.registry(), &identity, &group, "0xabc")
            .await
            .unwrap();

        {
            let client = reqwest::Client::new();
            let response = client
                .post(format!("http://{}/api/send-feedback", addr))
                .json(&proof)
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::OK);

            let feedback: Value = client
                .get(format!("http://{}/api/get-feedback", addr))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(feedback[0]["signal"], "0xabc");
        }

        node.stop().await.unwrap();
        drop(node);

        // Keys and ledger come back from disk; the nullifier stays spent.
        let node = ZensorNode::build(config).await.unwrap();
        assert_eq!(node.verifier().ledger().len(), 1);
        assert!(matches!(
            node.verifier().submit(&proof, &group).await,
            Err(ZensorError::DuplicateNullifier { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_keys_without_generation() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.prover.generate_missing_keys = false;

        assert!(matches!(
            ZensorNode::build(config).await,
            Err(ZensorError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_api_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.api.enabled = false;

        let mut node = ZensorNode::build(config).await.unwrap();
        assert_eq!(node.start().await.unwrap(), None);
        let state = node.app_state();
        assert!(state.prover.is_none());
        assert_eq!(state.prover_backend, "local");
        node.stop().await.unwrap();
    }
}
