#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;

pub use error::{ZensorError, ZensorResult};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const FIELD_HASH_SIZE: usize = 32;

pub const DEFAULT_TREE_DEPTH: usize = 16;

pub const MAX_TREE_DEPTH: usize = 32;

/// Length of the PUF string a sensor prints: a `D` followed by 62 hex digits.
pub const PUF_SEED_LEN: usize = 63;

pub const DEFAULT_ROOT_HISTORY: usize = 8;

/// Canonical little-endian encoding of a BN254 scalar field element.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldHash(pub [u8; FIELD_HASH_SIZE]);

impl FieldHash {
    pub fn from_bytes(bytes: [u8; FIELD_HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FIELD_HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> ZensorResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| ZensorError::Serialization(e.to_string()))?;
        if bytes.len() != FIELD_HASH_SIZE {
            return Err(ZensorError::Serialization(format!(
                "Invalid field hash length: {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; FIELD_HASH_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn zero() -> Self {
        Self([0u8; FIELD_HASH_SIZE])
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for FieldHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldHash({})", self.to_hex())
    }
}

impl fmt::Display for FieldHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for FieldHash {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for FieldHash {
    type Err = ZensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for FieldHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for FieldHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            FieldHash::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <[u8; FIELD_HASH_SIZE]>::deserialize(deserializer)?;
            Ok(FieldHash(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_hash_hex() {
        let hash = FieldHash::from_bytes([0xab; 32]);
        assert_eq!(hash.to_hex().len(), 64);

        let parsed = FieldHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);

        let prefixed = FieldHash::from_hex(&format!("0x{}", hash.to_hex())).unwrap();
        assert_eq!(hash, prefixed);
    }

    #[test]
    fn test_field_hash_bad_length() {
        assert!(matches!(
            FieldHash::from_hex("abcd"),
            Err(ZensorError::Serialization(_))
        ));
        assert!(FieldHash::from_hex("zz").is_err());
    }

    #[test]
    fn test_field_hash_json_is_hex_string() {
        let hash = FieldHash::from_bytes([0x01; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));

        let back: FieldHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_error_classification() {
        assert!(ZensorError::BackendUnavailable("timeout".into()).is_transient());
        assert!(ZensorError::Network("reset".into()).is_transient());
        assert!(!ZensorError::InvalidProof("bad".into()).is_transient());
        assert!(!ZensorError::DuplicateNullifier {
            group_id: "g".into(),
            nullifier: "n".into()
        }
        .is_transient());

        assert_eq!(
            ZensorError::StaleRoot { group_id: "g".into(), root: "r".into() }.code(),
            "STALE_ROOT"
        );
    }
}
