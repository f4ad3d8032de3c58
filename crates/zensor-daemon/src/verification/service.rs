use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use zensor_crypto::{MembershipKeys, ZkProof};
use zensor_types::{ZensorError, ZensorResult};

use crate::group::GroupRegistry;
use crate::storage::{SignalLedger, SignalRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidProof,
    StaleRoot,
    DuplicateNullifier,
}

#[derive(Debug)]
pub enum Verdict {
    Accept(SignalRecord),
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }
}

#[derive(Debug, Default)]
pub struct VerificationStats {
    accepted: AtomicU64,
    invalid_proof: AtomicU64,
    stale_root: AtomicU64,
    duplicate_nullifier: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatsSnapshot {
    pub accepted: u64,
    pub invalid_proof: u64,
    pub stale_root: u64,
    pub duplicate_nullifier: u64,
}

impl VerificationStats {
    fn record(&self, verdict: &Verdict) {
        let counter = match verdict {
            Verdict::Accept(_) => &self.accepted,
            Verdict::Reject(RejectReason::InvalidProof) => &self.invalid_proof,
            Verdict::Reject(RejectReason::StaleRoot) => &self.stale_root,
            Verdict::Reject(RejectReason::DuplicateNullifier) => &self.duplicate_nullifier,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> VerificationStatsSnapshot {
        VerificationStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            invalid_proof: self.invalid_proof.load(Ordering::Relaxed),
            stale_root: self.stale_root.load(Ordering::Relaxed),
            duplicate_nullifier: self.duplicate_nullifier.load(Ordering::Relaxed),
        }
    }
}

/// Checks submitted proofs and records accepted signals exactly once per nullifier.
pub struct VerificationService {
    keys: Arc<MembershipKeys>,
    registry: Arc<GroupRegistry>,
    ledger: Arc<SignalLedger>,
    stats: VerificationStats,
}

impl VerificationService {
    pub fn new(
        keys: Arc<MembershipKeys>,
        registry: Arc<GroupRegistry>,
        ledger: Arc<SignalLedger>,
    ) -> Self {
        Self {
            keys,
            registry,
            ledger,
            stats: VerificationStats::default(),
        }
    }

    pub fn ledger(&self) -> &Arc<SignalLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> VerificationStatsSnapshot {
        self.stats.snapshot()
    }

    /// Proof validity, then root freshness, then nullifier uniqueness.
    ///
    /// `Err` is reserved for failures of the service itself (storage, keys);
    /// anything wrong with the submission is a `Reject`.
    pub async fn verify(&self, proof: &ZkProof, group_id: &str) -> ZensorResult<Verdict> {
        let verdict = self.check(proof, group_id).await?;
        self.stats.record(&verdict);

        match &verdict {
            Verdict::Accept(record) => info!(
                id = record.id,
                group = group_id,
                nullifier = %record.nullifier_hash.short(),
                "Signal accepted"
            ),
            Verdict::Reject(reason) => warn!(
                group = group_id,
                nullifier = %proof.nullifier_hash.short(),
                root = %proof.merkle_tree_root.short(),
                "Signal rejected: {:?}",
                reason
            ),
        }
        Ok(verdict)
    }

    async fn check(&self, proof: &ZkProof, group_id: &str) -> ZensorResult<Verdict> {
        match self.keys.verify(proof, group_id) {
            Ok(true) => {}
            Ok(false) | Err(ZensorError::InvalidProof(_)) => {
                return Ok(Verdict::Reject(RejectReason::InvalidProof));
            }
            Err(e) => return Err(e),
        }

        if !self.registry.is_known_root(group_id, &proof.merkle_tree_root).await {
            return Ok(Verdict::Reject(RejectReason::StaleRoot));
        }

        if self
            .ledger
            .is_nullifier_spent(group_id, &proof.nullifier_hash)?
        {
            return Ok(Verdict::Reject(RejectReason::DuplicateNullifier));
        }

        let record = SignalRecord::new(
            group_id,
            proof.signal.clone(),
            proof.merkle_tree_root,
            proof.nullifier_hash,
            proof.proof.clone(),
        );

        match self.ledger.record_accepted(record).await {
            Ok(record) => Ok(Verdict::Accept(record)),
            Err(ZensorError::DuplicateNullifier { .. }) => {
                Ok(Verdict::Reject(RejectReason::DuplicateNullifier))
            }
            Err(e) => Err(e),
        }
    }

    /// [`verify`](Self::verify), with rejections turned into their error variants.
    pub async fn submit(&self, proof: &ZkProof, group_id: &str) -> ZensorResult<SignalRecord> {
        match self.verify(proof, group_id).await? {
            Verdict::Accept(record) => Ok(record),
            Verdict::Reject(RejectReason::InvalidProof) => Err(ZensorError::InvalidProof(
                "Proof does not verify for this group and signal".into(),
            )),
            Verdict::Reject(RejectReason::StaleRoot) => Err(ZensorError::StaleRoot {
                group_id: group_id.to_string(),
                root: proof.merkle_tree_root.to_hex(),
            }),
            Verdict::Reject(RejectReason::DuplicateNullifier) => {
                Err(ZensorError::DuplicateNullifier {
                    group_id: group_id.to_string(),
                    nullifier: proof.nullifier_hash.to_hex(),
                })
            }
        }
    }
}
