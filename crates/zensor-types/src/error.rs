use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZensorError {
    #[error("Invalid identity seed: {0}")]
    InvalidSeed(String),

    #[error("Membership tree full: capacity {capacity} leaves")]
    CapacityExceeded { capacity: u64 },

    #[error("Unknown leaf index {index} (tree has {len} leaves)")]
    UnknownLeaf { index: u64, len: u64 },

    #[error("Identity commitment is not a member of group {0}")]
    NotAMember(String),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Stale Merkle root for group {group_id}: {root}")]
    StaleRoot { group_id: String, root: String },

    #[error("Nullifier already used in group {group_id}: {nullifier}")]
    DuplicateNullifier { group_id: String, nullifier: String },

    #[error("Proving backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Circuit error: {0}")]
    Circuit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ZensorError {
    /// Failures worth retrying with identical inputs.
    pub fn is_transient(&self) -> bool {
        matches!(self, ZensorError::BackendUnavailable(_) | ZensorError::Network(_))
    }

    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ZensorError::InvalidSeed(_) => "INVALID_SEED",
            ZensorError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            ZensorError::UnknownLeaf { .. } => "UNKNOWN_LEAF",
            ZensorError::NotAMember(_) => "NOT_A_MEMBER",
            ZensorError::InvalidProof(_) => "INVALID_PROOF",
            ZensorError::StaleRoot { .. } => "STALE_ROOT",
            ZensorError::DuplicateNullifier { .. } => "DUPLICATE_NULLIFIER",
            ZensorError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            ZensorError::GroupNotFound(_) => "GROUP_NOT_FOUND",
            ZensorError::Crypto(_) => "CRYPTO_ERROR",
            ZensorError::Circuit(_) => "CIRCUIT_ERROR",
            ZensorError::Network(_) => "NETWORK_ERROR",
            ZensorError::Storage(_) => "STORAGE_ERROR",
            ZensorError::Serialization(_) => "SERIALIZATION_ERROR",
            ZensorError::Config(_) => "CONFIG_ERROR",
            ZensorError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type ZensorResult<T> = Result<T, ZensorError>;
