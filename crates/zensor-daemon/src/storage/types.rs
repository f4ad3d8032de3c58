use serde::{Deserialize, Serialize};
use zensor_types::FieldHash;

/// An accepted signal. Append-only; `id` is assigned by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub id: u64,
    pub group_id: String,
    pub signal: String,
    pub root: FieldHash,
    pub nullifier_hash: FieldHash,
    pub proof: Vec<u8>,
    /// Unix seconds.
    pub timestamp: i64,
}

impl SignalRecord {
    pub fn new(
        group_id: impl Into<String>,
        signal: impl Into<String>,
        root: FieldHash,
        nullifier_hash: FieldHash,
        proof: Vec<u8>,
    ) -> Self {
        Self {
            id: 0,
            group_id: group_id.into(),
            signal: signal.into(),
            root,
            nullifier_hash,
            proof,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub version: u32,
    pub created_at: i64,
}
