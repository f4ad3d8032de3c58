//! Groth16 (BN254) keys, witnesses and proofs for [`MembershipCircuit`].

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use zeroize::Zeroize;
use zensor_types::{FieldHash, ZensorError, ZensorResult};

use crate::circuit::MembershipCircuit;
use crate::identity::Identity;
use crate::membership_tree::MembershipProof;
use crate::poseidon::{
    external_nullifier, field_hash_to_fr, fr_to_field_hash, identity_commitment, nullifier_hash,
    signal_hash,
};

pub const CIRCUIT_VERSION: &str = "1.0.0";
pub const PROVING_KEY_FILE: &str = "membership.pk.bin";
pub const VERIFYING_KEY_FILE: &str = "membership.vk.bin";
pub const KEY_METADATA_FILE: &str = "membership.json";

/// A submitted attestation. `proof` is the compressed Groth16 proof, opaque
/// until a verifier decodes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkProof {
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
    #[serde(alias = "feedback")]
    pub signal: String,
    pub merkle_tree_root: FieldHash,
    pub nullifier_hash: FieldHash,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

/// Everything a prover needs. Carries identity secrets: it is zeroized on
/// drop and its `Debug` output is redacted.
#[derive(Clone, Serialize, Deserialize)]
pub struct MembershipWitness {
    pub trapdoor: FieldHash,
    pub nullifier: FieldHash,
    pub path: MembershipProof,
    pub group_id: String,
    pub signal: String,
}

impl MembershipWitness {
    pub fn new(identity: &Identity, path: MembershipProof, group_id: &str, signal: &str) -> Self {
        Self {
            trapdoor: identity.trapdoor(),
            nullifier: identity.nullifier(),
            path,
            group_id: group_id.to_string(),
            signal: signal.to_string(),
        }
    }

    pub fn commitment(&self) -> ZensorResult<FieldHash> {
        Ok(fr_to_field_hash(&identity_commitment(
            field_hash_to_fr(&self.trapdoor)?,
            field_hash_to_fr(&self.nullifier)?,
        )))
    }

    /// Whether the path actually leads from this identity's commitment to `path.root`.
    pub fn is_consistent(&self) -> ZensorResult<bool> {
        Ok(self.path.verify(&self.commitment()?))
    }

    pub fn nullifier_hash(&self) -> ZensorResult<FieldHash> {
        let nullifier = field_hash_to_fr(&self.nullifier)?;
        Ok(fr_to_field_hash(&nullifier_hash(
            nullifier,
            external_nullifier(&self.group_id),
        )))
    }

    fn circuit(&self) -> ZensorResult<MembershipCircuit> {
        let siblings = self
            .path
            .siblings
            .iter()
            .map(field_hash_to_fr)
            .collect::<ZensorResult<Vec<Fr>>>()?;

        Ok(MembershipCircuit::new(
            field_hash_to_fr(&self.trapdoor)?,
            field_hash_to_fr(&self.nullifier)?,
            siblings,
            self.path.path_indices.clone(),
            field_hash_to_fr(&self.path.root)?,
            signal_hash(&self.signal),
            external_nullifier(&self.group_id),
        ))
    }
}

impl Drop for MembershipWitness {
    fn drop(&mut self) {
        self.trapdoor.0.zeroize();
        self.nullifier.0.zeroize();
    }
}

impl fmt::Debug for MembershipWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MembershipWitness")
            .field("leaf_index", &self.path.leaf_index)
            .field("root", &self.path.root)
            .field("group_id", &self.group_id)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize)]
struct KeyMetadata {
    circuit_version: String,
    depth: usize,
    vk_sha256: String,
    created_at: String,
}

pub struct MembershipKeys {
    depth: usize,
    proving_key: ProvingKey<Bn254>,
    prepared_vk: PreparedVerifyingKey<Bn254>,
}

impl MembershipKeys {
    pub fn setup<R: RngCore + CryptoRng>(depth: usize, rng: &mut R) -> ZensorResult<Self> {
        let (pk, _vk) =
            Groth16::<Bn254>::circuit_specific_setup(MembershipCircuit::blank(depth), rng)
                .map_err(|e| ZensorError::Circuit(format!("Failed to generate keys: {}", e)))?;
        Self::from_proving_key(depth, pk)
    }

    /// Reproducible keys for development and tests. Anyone holding the seed
    /// can forge proofs, so production deployments load keys from disk.
    pub fn from_seed(depth: usize, seed: u64) -> ZensorResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::setup(depth, &mut rng)
    }

    fn from_proving_key(depth: usize, proving_key: ProvingKey<Bn254>) -> ZensorResult<Self> {
        let prepared_vk = Groth16::<Bn254>::process_vk(&proving_key.vk)
            .map_err(|e| ZensorError::Crypto(format!("Failed to prepare VK: {}", e)))?;
        Ok(Self {
            depth,
            proving_key,
            prepared_vk,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.proving_key.vk
    }

    pub fn verifying_key_bytes(&self) -> ZensorResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.proving_key
            .vk
            .serialize_compressed(&mut bytes)
            .map_err(|e| ZensorError::Serialization(format!("Failed to serialize VK: {}", e)))?;
        Ok(bytes)
    }

    /// SHA-256 of the compressed verifying key, hex encoded.
    pub fn fingerprint(&self) -> ZensorResult<String> {
        Ok(hex::encode(Sha256::digest(self.verifying_key_bytes()?)))
    }

    pub fn save(&self, dir: &Path) -> ZensorResult<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| ZensorError::Config(format!("Failed to create keys dir: {}", e)))?;

        let mut pk_bytes = Vec::new();
        self.proving_key
            .serialize_compressed(&mut pk_bytes)
            .map_err(|e| ZensorError::Serialization(format!("Failed to serialize PK: {}", e)))?;
        let vk_bytes = self.verifying_key_bytes()?;

        let metadata = KeyMetadata {
            circuit_version: CIRCUIT_VERSION.to_string(),
            depth: self.depth,
            vk_sha256: hex::encode(Sha256::digest(&vk_bytes)),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let metadata = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| ZensorError::Serialization(e.to_string()))?;

        write_file(&dir.join(PROVING_KEY_FILE), &pk_bytes)?;
        write_file(&dir.join(VERIFYING_KEY_FILE), &vk_bytes)?;
        write_file(&dir.join(KEY_METADATA_FILE), &metadata)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> ZensorResult<Self> {
        let metadata: KeyMetadata = serde_json::from_slice(&read_file(&dir.join(KEY_METADATA_FILE))?)
            .map_err(|e| ZensorError::Config(format!("Invalid key metadata: {}", e)))?;

        if metadata.circuit_version != CIRCUIT_VERSION {
            return Err(ZensorError::Config(format!(
                "Keys were generated for circuit {}, this build uses {}",
                metadata.circuit_version, CIRCUIT_VERSION
            )));
        }

        let pk_bytes = read_file(&dir.join(PROVING_KEY_FILE))?;
        let proving_key = ProvingKey::<Bn254>::deserialize_compressed_unchecked(&pk_bytes[..])
            .map_err(|e| ZensorError::Serialization(format!("Invalid proving key: {}", e)))?;

        let keys = Self::from_proving_key(metadata.depth, proving_key)?;
        if keys.fingerprint()? != metadata.vk_sha256 {
            return Err(ZensorError::Config(
                "Verifying key does not match key metadata".into(),
            ));
        }
        Ok(keys)
    }

    /// Proves membership for `witness`. CPU bound; async callers run it on a
    /// blocking thread.
    pub fn prove<R: RngCore + CryptoRng>(
        &self,
        witness: &MembershipWitness,
        rng: &mut R,
    ) -> ZensorResult<ZkProof> {
        if witness.path.depth() != self.depth {
            return Err(ZensorError::Circuit(format!(
                "Witness path has depth {}, keys expect {}",
                witness.path.depth(),
                self.depth
            )));
        }

        if !witness.is_consistent()? {
            return Err(ZensorError::NotAMember(witness.group_id.clone()));
        }

        let circuit = witness.circuit()?;
        let proof = Groth16::<Bn254>::prove(&self.proving_key, circuit, rng)
            .map_err(|e| ZensorError::Circuit(format!("Failed to generate proof: {}", e)))?;

        let mut proof_bytes = Vec::new();
        proof
            .serialize_compressed(&mut proof_bytes)
            .map_err(|e| ZensorError::Serialization(format!("Failed to serialize proof: {}", e)))?;

        Ok(ZkProof {
            proof: proof_bytes,
            signal: witness.signal.clone(),
            merkle_tree_root: witness.path.root,
            nullifier_hash: witness.nullifier_hash()?,
        })
    }

    /// Checks `proof` against its own root, nullifier hash and signal for
    /// `group_id`. Undecodable or non-canonical inputs are `InvalidProof`.
    pub fn verify(&self, proof: &ZkProof, group_id: &str) -> ZensorResult<bool> {
        let decoded = Proof::<Bn254>::deserialize_compressed(&proof.proof[..])
            .map_err(|e| ZensorError::InvalidProof(format!("Malformed proof bytes: {}", e)))?;

        let root = field_hash_to_fr(&proof.merkle_tree_root)
            .map_err(|_| ZensorError::InvalidProof("Non-canonical Merkle root".into()))?;
        let nullifier = field_hash_to_fr(&proof.nullifier_hash)
            .map_err(|_| ZensorError::InvalidProof("Non-canonical nullifier hash".into()))?;

        let public_inputs = [
            root,
            nullifier,
            signal_hash(&proof.signal),
            external_nullifier(group_id),
        ];

        Groth16::<Bn254>::verify_with_processed_vk(&self.prepared_vk, &public_inputs, &decoded)
            .map_err(|e| ZensorError::Crypto(format!("Proof verification error: {}", e)))
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> ZensorResult<()> {
    std::fs::write(path, bytes)
        .map_err(|e| ZensorError::Config(format!("Failed to write {}: {}", path.display(), e)))
}

fn read_file(path: &Path) -> ZensorResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| ZensorError::Config(format!("Failed to read {}: {}", path.display(), e)))
}
