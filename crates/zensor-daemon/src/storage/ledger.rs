//! Append-only signal ledger and spent-nullifier set, both in one sled database.
//!
//! Trees:
//! - `schema`: version record
//! - `nullifiers`: `externalNullifier ‖ nullifierHash` -> record id (big endian)
//! - `signals`: record id (big endian) -> bincode [`SignalRecord`]

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};
use zensor_crypto::{external_nullifier, fr_to_field_hash};
use zensor_types::{FieldHash, ZensorError, ZensorResult};

use super::config::StorageConfig;
use super::types::{SchemaInfo, SignalRecord};

const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_KEY: &[u8] = b"__schema_version__";

pub struct SignalLedger {
    db: Db,
    schema: Tree,
    nullifiers: Tree,
    signals: Tree,
    /// Next record id. Advanced as soon as a write commits, before the flush.
    commit: Mutex<u64>,
}

impl SignalLedger {
    pub fn open(path: &Path, config: &StorageConfig) -> ZensorResult<Self> {
        info!("Opening signal ledger at {:?}", path);

        let db = sled::Config::new()
            .path(path)
            .cache_capacity(config.cache_capacity_bytes)
            .flush_every_ms(config.flush_every_ms)
            .open()
            .map_err(|e| ZensorError::Storage(format!("Failed to open database: {}", e)))?;

        let ledger = Self::create_from_db(db)?;
        info!(
            "Signal ledger opened ({} records, schema version {})",
            ledger.len(),
            CURRENT_SCHEMA_VERSION
        );
        Ok(ledger)
    }

    pub fn in_memory() -> ZensorResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| ZensorError::Storage(format!("Failed to open temp database: {}", e)))?;
        Self::create_from_db(db)
    }

    fn create_from_db(db: Db) -> ZensorResult<Self> {
        let schema = open_tree(&db, "schema")?;
        let nullifiers = open_tree(&db, "nullifiers")?;
        let signals = open_tree(&db, "signals")?;

        let next_id = match signals.last().map_err(storage_err)? {
            Some((key, _)) => decode_id(&key)? + 1,
            None => 0,
        };

        let ledger = Self {
            db,
            schema,
            nullifiers,
            signals,
            commit: Mutex::new(next_id),
        };
        ledger.ensure_schema()?;
        Ok(ledger)
    }

    fn ensure_schema(&self) -> ZensorResult<()> {
        match self.schema.get(SCHEMA_KEY).map_err(storage_err)? {
            Some(bytes) => {
                let info: SchemaInfo = bincode::deserialize(&bytes).map_err(|e| {
                    ZensorError::Storage(format!("Failed to deserialize schema: {}", e))
                })?;
                if info.version > CURRENT_SCHEMA_VERSION {
                    return Err(ZensorError::Storage(format!(
                        "Database schema version {} is newer than supported {}",
                        info.version, CURRENT_SCHEMA_VERSION
                    )));
                }
            }
            None => {
                info!("Initializing ledger schema version {}", CURRENT_SCHEMA_VERSION);
                let info = SchemaInfo {
                    version: CURRENT_SCHEMA_VERSION,
                    created_at: chrono::Utc::now().timestamp(),
                };
                let bytes = bincode::serialize(&info).map_err(|e| {
                    ZensorError::Storage(format!("Failed to serialize schema: {}", e))
                })?;
                self.schema.insert(SCHEMA_KEY, bytes).map_err(storage_err)?;
                self.db.flush().map_err(storage_err)?;
            }
        }
        Ok(())
    }

    /// Appends `record` without touching the nullifier set. The ledger assigns the id.
    pub async fn append(&self, mut record: SignalRecord) -> ZensorResult<SignalRecord> {
        let mut next_id = self.commit.lock().await;
        record.id = *next_id;

        let value = encode_record(&record)?;
        self.signals
            .insert(record.id.to_be_bytes(), value)
            .map_err(storage_err)?;
        *next_id += 1;
        drop(next_id);

        self.db.flush_async().await.map_err(storage_err)?;
        Ok(record)
    }

    /// Marks the record's nullifier spent and appends the record in one transaction.
    ///
    /// Fails with `DuplicateNullifier` when the nullifier was already recorded
    /// for this group; nothing is written in that case.
    pub async fn record_accepted(&self, mut record: SignalRecord) -> ZensorResult<SignalRecord> {
        let mut next_id = self.commit.lock().await;
        record.id = *next_id;

        let nullifier_key = nullifier_key(&record.group_id, &record.nullifier_hash);
        let id_key = record.id.to_be_bytes();
        let value = encode_record(&record)?;

        let result = (&self.nullifiers, &self.signals).transaction(|(nullifiers, signals)| {
            if nullifiers.get(nullifier_key.as_slice())?.is_some() {
                return Err(ConflictableTransactionError::Abort(()));
            }
            nullifiers.insert(nullifier_key.as_slice(), &id_key[..])?;
            signals.insert(&id_key[..], value.as_slice())?;
            Ok(())
        });

        match result {
            Ok(()) => *next_id += 1,
            Err(TransactionError::Abort(())) => {
                return Err(ZensorError::DuplicateNullifier {
                    group_id: record.group_id.clone(),
                    nullifier: record.nullifier_hash.to_hex(),
                });
            }
            Err(TransactionError::Storage(e)) => return Err(storage_err(e)),
        }

        drop(next_id);
        self.db.flush_async().await.map_err(storage_err)?;

        debug!(
            id = record.id,
            group = %record.group_id,
            nullifier = %record.nullifier_hash.short(),
            "Signal recorded"
        );
        Ok(record)
    }

    pub fn is_nullifier_spent(&self, group_id: &str, nullifier_hash: &FieldHash) -> ZensorResult<bool> {
        self.nullifiers
            .contains_key(nullifier_key(group_id, nullifier_hash))
            .map_err(storage_err)
    }

    /// All records in insertion order.
    pub fn list(&self) -> ZensorResult<Vec<SignalRecord>> {
        self.signals
            .iter()
            .values()
            .map(|value| decode_record(&value.map_err(storage_err)?))
            .collect()
    }

    pub fn list_group(&self, group_id: &str) -> ZensorResult<Vec<SignalRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|record| record.group_id == group_id)
            .collect())
    }

    pub fn get(&self, id: u64) -> ZensorResult<Option<SignalRecord>> {
        self.signals
            .get(id.to_be_bytes())
            .map_err(storage_err)?
            .map(|value| decode_record(&value))
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn spent_nullifiers(&self) -> usize {
        self.nullifiers.len()
    }

    pub fn flush(&self) -> ZensorResult<()> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}

fn nullifier_key(group_id: &str, nullifier_hash: &FieldHash) -> Vec<u8> {
    let scope = fr_to_field_hash(&external_nullifier(group_id));
    let mut key = Vec::with_capacity(64);
    key.extend_from_slice(scope.as_bytes());
    key.extend_from_slice(nullifier_hash.as_bytes());
    key
}

fn open_tree(db: &Db, name: &str) -> ZensorResult<Tree> {
    db.open_tree(name)
        .map_err(|e| ZensorError::Storage(format!("Failed to open {} tree: {}", name, e)))
}

fn encode_record(record: &SignalRecord) -> ZensorResult<Vec<u8>> {
    bincode::serialize(record)
        .map_err(|e| ZensorError::Storage(format!("Failed to serialize record: {}", e)))
}

fn decode_record(bytes: &[u8]) -> ZensorResult<SignalRecord> {
    bincode::deserialize(bytes)
        .map_err(|e| ZensorError::Storage(format!("Failed to deserialize record: {}", e)))
}

fn decode_id(key: &[u8]) -> ZensorResult<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| ZensorError::Storage(format!("Corrupt record key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn storage_err(e: sled::Error) -> ZensorError {
    ZensorError::Storage(e.to_string())
}
