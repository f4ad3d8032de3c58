//! Poseidon hashing over the BN254 scalar field.
//!
//! Every commitment, nullifier hash and Merkle node in zensor is produced by
//! the functions in this module. The in-circuit gadget in [`crate::circuit`]
//! uses the same [`canonical_config`], so native and constrained hashes agree.
//!
//! ## Parameters
//! - Field: BN254 Fr
//! - Width: 3 (rate=2, capacity=1)
//! - Full rounds: 8
//! - Partial rounds: 57
//! - S-box: x^5
//! - Round constants: Grain LFSR (arkworks `find_poseidon_ark_and_mds`)
//!
//! Outputs are the first element squeezed from the sponge.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge,
};
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::CanonicalDeserialize;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::sync::OnceLock;
use zensor_types::{FieldHash, ZensorError, ZensorResult};

static CANONICAL_CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Shared Poseidon configuration, built once per process.
pub fn canonical_config() -> &'static PoseidonConfig<Fr> {
    CANONICAL_CONFIG.get_or_init(|| {
        let rate = 2;
        let alpha = 5u64;
        let full_rounds = 8;
        let partial_rounds = 57;
        let field_bits = Fr::MODULUS_BIT_SIZE as u64;

        let (ark, mds) =
            find_poseidon_ark_and_mds::<Fr>(field_bits, rate, full_rounds, partial_rounds, 0);

        PoseidonConfig {
            full_rounds: full_rounds as usize,
            partial_rounds: partial_rounds as usize,
            alpha,
            ark,
            mds,
            rate,
            capacity: 1,
        }
    })
}

pub fn poseidon_hash_fields(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(canonical_config());
    for input in inputs {
        sponge.absorb(input);
    }
    let output: Vec<Fr> = sponge.squeeze_field_elements(1);
    output[0]
}

/// Two-to-one hash for Merkle nodes and commitments.
pub fn poseidon_hash2(left: Fr, right: Fr) -> Fr {
    poseidon_hash_fields(&[left, right])
}

pub fn poseidon_hash1(input: Fr) -> Fr {
    poseidon_hash_fields(&[input])
}

// ============================================================================
// Protocol hashes
// ============================================================================

/// `Poseidon(trapdoor, nullifier)`.
pub fn identity_commitment(trapdoor: Fr, nullifier: Fr) -> Fr {
    poseidon_hash2(trapdoor, nullifier)
}

/// `Poseidon(nullifier, external_nullifier)`. Independent of the signal.
pub fn nullifier_hash(nullifier: Fr, external_nullifier: Fr) -> Fr {
    poseidon_hash2(nullifier, external_nullifier)
}

/// Maps arbitrary bytes into the field: SHA-256, read big-endian, reduced mod r.
pub fn hash_to_field(data: &[u8]) -> Fr {
    let digest = Sha256::digest(data);
    Fr::from_be_bytes_mod_order(&digest)
}

/// Field element a group id is bound to inside the circuit.
pub fn external_nullifier(group_id: &str) -> Fr {
    hash_to_field(group_id.as_bytes())
}

pub fn signal_hash(signal: &str) -> Fr {
    hash_to_field(signal.as_bytes())
}

// ============================================================================
// Byte interface
// ============================================================================

pub fn fr_to_bytes(f: &Fr) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    let le = f.into_bigint().to_bytes_le();
    bytes[..le.len()].copy_from_slice(&le);
    bytes
}

pub fn fr_to_field_hash(f: &Fr) -> FieldHash {
    FieldHash(fr_to_bytes(f))
}

/// Lenient conversion, reduces mod r.
pub fn bytes_to_fr(bytes: &[u8; 32]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

/// Strict conversion: rejects encodings of values >= r so that a hash has
/// exactly one byte representation.
pub fn fr_from_canonical(bytes: &[u8; 32]) -> Option<Fr> {
    Fr::deserialize_compressed(&bytes[..]).ok()
}

pub fn field_hash_to_fr(hash: &FieldHash) -> ZensorResult<Fr> {
    fr_from_canonical(hash.as_bytes()).ok_or_else(|| {
        ZensorError::Serialization(format!("Non-canonical field element: {}", hash))
    })
}

/// Parses a member commitment as published by a group directory.
///
/// Accepts the 64-hex-digit canonical encoding (optionally `0x`-prefixed) or
/// a decimal integer below the field modulus.
pub fn parse_field_hash(s: &str) -> ZensorResult<FieldHash> {
    let trimmed = s.trim();
    let hex_body = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if trimmed.starts_with("0x") || hex_body.len() == 64 {
        let hash = FieldHash::from_hex(hex_body)?;
        field_hash_to_fr(&hash)?;
        return Ok(hash);
    }

    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ZensorError::Serialization(format!(
            "Not a field element: {:?}",
            s
        )));
    }

    let value = Fr::from_str(trimmed)
        .map_err(|_| ZensorError::Serialization(format!("Invalid decimal field element: {}", s)))?;

    // `from_str` reduces mod r; only values that survive the round trip are in range.
    let digits = trimmed.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    if value.into_bigint().to_string() != digits {
        return Err(ZensorError::Serialization(format!(
            "Decimal field element out of range: {}",
            s
        )));
    }
    Ok(fr_to_field_hash(&value))
}

/// Decimal rendering used when talking to group directories.
pub fn field_hash_to_decimal(hash: &FieldHash) -> ZensorResult<String> {
    Ok(field_hash_to_fr(hash)?.into_bigint().to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::{One, Zero};

    #[test]
    fn test_hash_deterministic() {
        let a = Fr::from(12345u64);
        let b = Fr::from(67890u64);

        let h1 = poseidon_hash2(a, b);
        let h2 = poseidon_hash2(a, b);
        assert_eq!(h1, h2);

        // Order matters
        let h3 = poseidon_hash2(b, a);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_hash_arity_matters() {
        let a = Fr::from(7u64);
        assert_ne!(poseidon_hash1(a), poseidon_hash2(a, Fr::zero()));
    }

    #[test]
    fn test_nullifier_hash_depends_on_group() {
        let nullifier = Fr::from(42u64);
        let n1 = nullifier_hash(nullifier, external_nullifier("group-a"));
        let n2 = nullifier_hash(nullifier, external_nullifier("group-b"));
        assert_ne!(n1, n2);
        assert_eq!(n1, nullifier_hash(nullifier, external_nullifier("group-a")));
    }

    #[test]
    fn test_hash_to_field_distinct() {
        assert_ne!(signal_hash("0xaa"), signal_hash("0xab"));
        assert_eq!(signal_hash("reading"), hash_to_field(b"reading"));
    }

    #[test]
    fn test_field_roundtrip() {
        let original = Fr::from(0xdeadbeefu64);
        let bytes = fr_to_bytes(&original);
        assert_eq!(bytes_to_fr(&bytes), original);
        assert_eq!(fr_from_canonical(&bytes), Some(original));
    }

    #[test]
    fn test_non_canonical_rejected() {
        // 2^256 - 1 is far above the BN254 scalar modulus.
        let bytes = [0xff; 32];
        assert!(fr_from_canonical(&bytes).is_none());
        assert!(field_hash_to_fr(&FieldHash(bytes)).is_err());
    }

    #[test]
    fn test_parse_field_hash_decimal_and_hex() {
        let from_dec = parse_field_hash("1").unwrap();
        assert_eq!(from_dec, fr_to_field_hash(&Fr::one()));

        let hex = from_dec.to_hex();
        assert_eq!(parse_field_hash(&hex).unwrap(), from_dec);
        assert_eq!(parse_field_hash(&format!("0x{}", hex)).unwrap(), from_dec);

        assert!(parse_field_hash("").is_err());
        assert!(parse_field_hash("12ab").is_err());
        assert!(parse_field_hash(&"ff".repeat(32)).is_err());
    }

    #[test]
    fn test_parse_field_hash_rejects_decimal_at_or_above_modulus() {
        let modulus = Fr::MODULUS.to_string();
        assert_eq!(modulus, "21888242871839275222246405745257275088548364400416034343698204186575808495617");

        assert!(parse_field_hash(&modulus).is_err());
        assert!(parse_field_hash("21888242871839275222246405745257275088548364400416034343698204186575808495618").is_err());
        assert!(parse_field_hash(&"9".repeat(80)).is_err());

        let max = parse_field_hash("21888242871839275222246405745257275088548364400416034343698204186575808495616").unwrap();
        assert_eq!(max, fr_to_field_hash(&-Fr::one()));
        assert_eq!(parse_field_hash("0").unwrap(), fr_to_field_hash(&Fr::zero()));
        assert_eq!(parse_field_hash("0042").unwrap(), fr_to_field_hash(&Fr::from(42u64)));
    }

    #[test]
    fn test_decimal_rendering_roundtrip() {
        let hash = fr_to_field_hash(&Fr::from(987654321u64));
        let decimal = field_hash_to_decimal(&hash).unwrap();
        assert_eq!(decimal, "987654321");
        assert_eq!(parse_field_hash(&decimal).unwrap(), hash);
    }

    #[test]
    fn test_config_is_shared() {
        let a = canonical_config() as *const _;
        let b = canonical_config() as *const _;
        assert_eq!(a, b);
        assert_eq!(canonical_config().rate, 2);
    }
}
