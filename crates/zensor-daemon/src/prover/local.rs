use async_trait::async_trait;
use rand::rngs::OsRng;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use zensor_crypto::groth16::KEY_METADATA_FILE;
use zensor_crypto::{MembershipKeys, MembershipWitness, ZkProof};
use zensor_types::{ZensorError, ZensorResult};

use super::ProvingBackend;

/// Groth16 proving in-process, on the blocking thread pool.
pub struct LocalBackend {
    keys: Arc<MembershipKeys>,
}

impl LocalBackend {
    pub fn new(keys: Arc<MembershipKeys>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &Arc<MembershipKeys> {
        &self.keys
    }
}

#[async_trait]
impl ProvingBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn prove(&self, witness: MembershipWitness) -> ZensorResult<ZkProof> {
        let keys = self.keys.clone();
        tokio::task::spawn_blocking(move || keys.prove(&witness, &mut OsRng))
            .await
            .map_err(|e| ZensorError::Internal(format!("Proving task failed: {}", e)))?
    }
}

/// Loads keys from `dir`, or runs a fresh setup and saves it when allowed.
///
/// Blocking and slow on first run; call it from `spawn_blocking`.
pub fn load_or_generate_keys(
    dir: &Path,
    depth: usize,
    generate_missing: bool,
) -> ZensorResult<MembershipKeys> {
    if dir.join(KEY_METADATA_FILE).exists() {
        let keys = MembershipKeys::load(dir)?;
        if keys.depth() != depth {
            return Err(ZensorError::Config(format!(
                "Keys in {:?} are for depth {}, groups.tree_depth is {}",
                dir,
                keys.depth(),
                depth
            )));
        }
        info!("Loaded membership keys from {:?} (vk {})", dir, keys.fingerprint()?);
        return Ok(keys);
    }

    if !generate_missing {
        return Err(ZensorError::Config(format!(
            "No membership keys in {:?}. Run zk-keygen generate first.",
            dir
        )));
    }

    warn!("No membership keys in {:?}, running trusted setup for depth {}", dir, depth);
    let keys = MembershipKeys::setup(depth, &mut OsRng)?;
    keys.save(dir)?;
    info!("Membership keys written to {:?} (vk {})", dir, keys.fingerprint()?);
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zensor_crypto::{Identity, MembershipTree};

    #[tokio::test]
    async fn test_local_backend_proves() {
        let keys = Arc::new(MembershipKeys::from_seed(4, 11).unwrap());
        let backend = LocalBackend::new(keys.clone());

        let identity = Identity::create(Some(b"local-backend")).unwrap();
        let mut tree = MembershipTree::new(4).unwrap();
        let index = tree.insert(identity.commitment()).unwrap();
        let witness =
            MembershipWitness::new(&identity, tree.proof_path(index).unwrap(), "g", "0x01");

        let proof = backend.prove(witness).await.unwrap();
        assert!(keys.verify(&proof, "g").unwrap());
        assert_eq!(backend.name(), "local");
    }

    #[test]
    fn test_missing_keys_without_generation() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_or_generate_keys(dir.path(), 4, false),
            Err(ZensorError::Config(_))
        ));
    }

    #[test]
    fn test_generate_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let generated = load_or_generate_keys(dir.path(), 3, true).unwrap();
        let loaded = load_or_generate_keys(dir.path(), 3, false).unwrap();
        assert_eq!(generated.fingerprint().unwrap(), loaded.fingerprint().unwrap());

        assert!(matches!(
            load_or_generate_keys(dir.path(), 4, false),
            Err(ZensorError::Config(_))
        ));
    }
}
