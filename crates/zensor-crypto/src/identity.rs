//! Device identities: a private (trapdoor, nullifier) pair and its public commitment.

use ark_bn254::Fr;
use ark_std::UniformRand;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};
use zensor_types::{FieldHash, ZensorError, ZensorResult};

use crate::poseidon::{
    fr_from_canonical, fr_to_bytes, fr_to_field_hash, hash_to_field, identity_commitment,
};
use crate::sensor::extract_puf_seed;

const TRAPDOOR_DOMAIN: &[u8] = b"zensor.identity.trapdoor";
const NULLIFIER_DOMAIN: &[u8] = b"zensor.identity.nullifier";
const MAX_SEED_LEN: usize = 4096;

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Identity {
    trapdoor: [u8; 32],
    nullifier: [u8; 32],
    #[zeroize(skip)]
    commitment: FieldHash,
}

impl Identity {
    /// Creates an identity from `seed`, or from the OS CSPRNG when absent.
    ///
    /// Seeded identities are deterministic: the same seed always yields the
    /// same secrets and commitment.
    pub fn create(seed: Option<&[u8]>) -> ZensorResult<Self> {
        let (trapdoor, nullifier) = match seed {
            Some(seed) => {
                if seed.is_empty() {
                    return Err(ZensorError::InvalidSeed("seed is empty".into()));
                }
                if seed.len() > MAX_SEED_LEN {
                    return Err(ZensorError::InvalidSeed(format!(
                        "seed is {} bytes, limit is {}",
                        seed.len(),
                        MAX_SEED_LEN
                    )));
                }
                (derive(TRAPDOOR_DOMAIN, seed), derive(NULLIFIER_DOMAIN, seed))
            }
            None => {
                let mut rng = rand::thread_rng();
                (Fr::rand(&mut rng), Fr::rand(&mut rng))
            }
        };

        Ok(Self::from_secrets(trapdoor, nullifier))
    }

    /// Seeds an identity with the PUF string found in a device's serial log.
    pub fn from_sensor_log(log: &str) -> ZensorResult<Self> {
        let puf = extract_puf_seed(log)
            .ok_or_else(|| ZensorError::InvalidSeed("no PUF value found in sensor log".into()))?;
        Self::create(Some(puf.as_bytes()))
    }

    pub fn from_secrets(trapdoor: Fr, nullifier: Fr) -> Self {
        Self {
            trapdoor: fr_to_bytes(&trapdoor),
            nullifier: fr_to_bytes(&nullifier),
            commitment: fr_to_field_hash(&identity_commitment(trapdoor, nullifier)),
        }
    }

    pub fn commitment(&self) -> FieldHash {
        self.commitment
    }

    pub fn trapdoor(&self) -> FieldHash {
        FieldHash(self.trapdoor)
    }

    pub fn nullifier(&self) -> FieldHash {
        FieldHash(self.nullifier)
    }

    pub fn trapdoor_field(&self) -> Fr {
        crate::poseidon::bytes_to_fr(&self.trapdoor)
    }

    pub fn nullifier_field(&self) -> Fr {
        crate::poseidon::bytes_to_fr(&self.nullifier)
    }

    /// `["<trapdoor hex>","<nullifier hex>"]`.
    pub fn serialize(&self) -> String {
        serde_json::json!([hex::encode(self.trapdoor), hex::encode(self.nullifier)]).to_string()
    }

    pub fn deserialize(s: &str) -> ZensorResult<Self> {
        let parts: Vec<String> = serde_json::from_str(s)
            .map_err(|e| ZensorError::Serialization(format!("Invalid identity encoding: {}", e)))?;

        let [trapdoor, nullifier] = parts.as_slice() else {
            return Err(ZensorError::Serialization(format!(
                "Identity must have 2 components, found {}",
                parts.len()
            )));
        };

        Ok(Self::from_secrets(parse_secret(trapdoor)?, parse_secret(nullifier)?))
    }
}

fn derive(domain: &[u8], seed: &[u8]) -> Fr {
    let mut input = Vec::with_capacity(domain.len() + seed.len());
    input.extend_from_slice(domain);
    input.extend_from_slice(seed);
    let value = hash_to_field(&input);
    input.zeroize();
    value
}

fn parse_secret(s: &str) -> ZensorResult<Fr> {
    let hash = FieldHash::from_hex(s)?;
    fr_from_canonical(hash.as_bytes())
        .ok_or_else(|| ZensorError::Serialization("Identity secret is not a canonical field element".into()))
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        let t = self.trapdoor.ct_eq(&other.trapdoor);
        let n = self.nullifier.ct_eq(&other.nullifier);
        (t & n).into()
    }
}

impl Eq for Identity {}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_commitment_matches_hash() {
        let identity = Identity::create(None).unwrap();
        let expected = identity_commitment(identity.trapdoor_field(), identity.nullifier_field());
        assert_eq!(identity.commitment(), fr_to_field_hash(&expected));
    }

    #[test]
    fn test_random_identities_differ() {
        let a = Identity::create(None).unwrap();
        let b = Identity::create(None).unwrap();
        assert_ne!(a, b);
        assert_ne!(a.commitment(), b.commitment());
    }

    #[test]
    fn test_seeded_identity_deterministic() {
        let a = Identity::create(Some(b"device-42")).unwrap();
        let b = Identity::create(Some(b"device-42")).unwrap();
        let c = Identity::create(Some(b"device-43")).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.commitment(), b.commitment());
        assert_ne!(a.commitment(), c.commitment());
        assert_ne!(a.trapdoor(), a.nullifier());
    }

    #[test]
    fn test_invalid_seed() {
        assert!(matches!(Identity::create(Some(b"")), Err(ZensorError::InvalidSeed(_))));
        let huge = vec![1u8; MAX_SEED_LEN + 1];
        assert!(matches!(Identity::create(Some(&huge)), Err(ZensorError::InvalidSeed(_))));
    }

    #[test]
    fn test_from_sensor_log() {
        let puf = format!("D{}", "A1".repeat(31));
        let log = format!("PUF: {}\nTemperature: 22 Celsius\n", puf);

        let identity = Identity::from_sensor_log(&log).unwrap();
        let direct = Identity::create(Some(puf.as_bytes())).unwrap();
        assert_eq!(identity, direct);

        assert!(matches!(
            Identity::from_sensor_log("Temperature: 22 Celsius"),
            Err(ZensorError::InvalidSeed(_))
        ));
    }

    #[test]
    fn test_serialize_format() {
        let identity = Identity::create(Some(b"format")).unwrap();
        let encoded = identity.serialize();
        let parts: Vec<String> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], identity.trapdoor().to_hex());
        assert_eq!(parts[1], identity.nullifier().to_hex());
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(Identity::deserialize("not json").is_err());
        assert!(Identity::deserialize("[\"00\"]").is_err());
        let non_canonical = format!("[\"{}\",\"{}\"]", "ff".repeat(32), "00".repeat(32));
        assert!(matches!(
            Identity::deserialize(&non_canonical),
            Err(ZensorError::Serialization(_))
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let identity = Identity::create(Some(b"debug")).unwrap();
        let printed = format!("{:?}", identity);
        assert!(!printed.contains(&identity.trapdoor().to_hex()));
        assert!(printed.contains(&identity.commitment().to_hex()));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_serialize_roundtrip(seed in prop::collection::vec(any::<u8>(), 1..128)) {
            let identity = Identity::create(Some(&seed)).unwrap();
            let restored = Identity::deserialize(&identity.serialize()).unwrap();
            prop_assert_eq!(restored.commitment(), identity.commitment());
            prop_assert_eq!(restored, identity);
        }
    }
}
