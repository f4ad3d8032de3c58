use serde::{Deserialize, Serialize};
use zensor_types::FieldHash;

use crate::storage::SignalRecord;
use crate::verification::VerificationStatsSnapshot;

/// One accepted signal as returned by the feedback endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub id: u64,
    pub signal: String,
    pub merkle_tree_root: FieldHash,
    pub nullifier_hash: FieldHash,
    pub timestamp: i64,
}

impl From<SignalRecord> for FeedbackEntry {
    fn from(record: SignalRecord) -> Self {
        Self {
            id: record.id,
            signal: record.signal,
            merkle_tree_root: record.root,
            nullifier_hash: record.nullifier_hash,
            timestamp: record.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEntry {
    pub signal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberRequest {
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberResponse {
    pub group_id: String,
    pub index: usize,
    pub root: FieldHash,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub prover_backend: String,
    pub default_group: String,
    pub groups: Vec<String>,
    pub signals: usize,
    pub spent_nullifiers: usize,
    pub verification: VerificationStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: String,
    pub uptime_secs: u64,
}
