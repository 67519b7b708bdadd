// crates/carbon-store/src/rocks.rs
//
// RocksDB-backed durable reservation store.
//
// Key format:
//   - `reservation:{system_identifier}:{window_end}` -> JSON-serialized Reservation
//
// Every mutation runs inside a pessimistic RocksDB transaction that takes an
// exclusive lock on the key with `get_for_update`, so "read existing record,
// write new record" is a single critical section within the process.
// Across processes, RocksDB's LOCK file admits one opener at a time; a second
// run waits in `open_with_retry` until the first releases the database.

use std::time::Duration;

use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, MultiThreaded, Options, TransactionDB, TransactionDBOptions};

use carbon_core::error::CarbonError;
use carbon_core::mint::{MintReceipt, MintRequest};
use carbon_core::reservation::{Reservation, ReservationKey, ReserveOutcome};
use carbon_core::traits::ReservationStore;

use crate::lifecycle;

const KEY_PREFIX: &str = "reservation:";

/// RocksDB `TransactionDB` wrapper implementing `ReservationStore`.
pub struct RocksReservationStore {
    db: TransactionDB<MultiThreaded>,
    path: String,
}

impl std::fmt::Debug for RocksReservationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksReservationStore")
            .field("path", &self.path)
            .finish()
    }
}

impl RocksReservationStore {
    /// Open a reservation database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, CarbonError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let txn_opts = TransactionDBOptions::default();

        let db = TransactionDB::<MultiThreaded>::open(&opts, &txn_opts, path).map_err(|e| {
            CarbonError::Storage(format!("Failed to open RocksDB at {}: {}", path, e))
        })?;

        Ok(Self {
            db,
            path: path.to_string(),
        })
    }

    /// Open, retrying while another process holds the database lock.
    ///
    /// Makes `attempts` tries in total, sleeping `delay` between them.
    pub fn open_with_retry(path: &str, attempts: u32, delay: Duration) -> Result<Self, CarbonError> {
        let attempts = attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match Self::open(path) {
                Ok(store) => return Ok(store),
                Err(e) if is_lock_contention(&e) && attempt < attempts => {
                    tracing::warn!(
                        "Reservation store at {} is locked by another run (attempt {}/{}), waiting {:?}",
                        path,
                        attempt,
                        attempts,
                        delay
                    );
                    last_err = Some(e);
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CarbonError::Storage(format!("Could not open reservation store at {}", path))
        }))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Build the storage key: `reservation:{key}`.
    fn storage_key(key: &ReservationKey) -> Vec<u8> {
        format!("{}{}", KEY_PREFIX, key).into_bytes()
    }

    fn decode(bytes: &[u8]) -> Result<Reservation, CarbonError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Run `f` on the current record under an exclusive key lock and commit
    /// whatever it asks to write (`Some(Some(r))` put, `Some(None)` delete).
    fn update<T>(
        &self,
        key: &ReservationKey,
        f: impl FnOnce(Option<Reservation>) -> Result<(T, Option<Option<Reservation>>), CarbonError>,
    ) -> Result<T, CarbonError> {
        let storage_key = Self::storage_key(key);
        let txn = self.db.transaction();

        let current = txn
            .get_for_update(&storage_key, true)
            .map_err(|e| CarbonError::Storage(format!("RocksDB get_for_update failed: {}", e)))?
            .map(|bytes| Self::decode(&bytes))
            .transpose()?;

        let (result, write) = f(current)?;

        match write {
            Some(Some(record)) => {
                let json = serde_json::to_vec(&record)?;
                txn.put(&storage_key, json)
                    .map_err(|e| CarbonError::Storage(format!("RocksDB put failed: {}", e)))?;
            }
            Some(None) => {
                txn.delete(&storage_key)
                    .map_err(|e| CarbonError::Storage(format!("RocksDB delete failed: {}", e)))?;
            }
            None => {}
        }

        txn.commit()
            .map_err(|e| CarbonError::Storage(format!("RocksDB commit failed: {}", e)))?;
        Ok(result)
    }

    pub fn get_sync(&self, key: &ReservationKey) -> Result<Option<Reservation>, CarbonError> {
        self.db
            .get(Self::storage_key(key))
            .map_err(|e| CarbonError::Storage(format!("RocksDB get failed: {}", e)))?
            .map(|bytes| Self::decode(&bytes))
            .transpose()
    }

    pub fn list_sync(&self) -> Result<Vec<Reservation>, CarbonError> {
        let prefix = KEY_PREFIX.as_bytes();
        let mut records = Vec::new();

        let iter = self.db.iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item
                .map_err(|e| CarbonError::Storage(format!("RocksDB iteration error: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            records.push(Self::decode(&value)?);
        }

        Ok(records)
    }
}

#[async_trait]
impl ReservationStore for RocksReservationStore {
    async fn check_and_reserve(
        &self,
        key: &ReservationKey,
        request: &MintRequest,
        from_block: u64,
    ) -> Result<ReserveOutcome, CarbonError> {
        self.update(key, |current| {
            let (outcome, write) = lifecycle::check(current, key, request, from_block);
            Ok((outcome, write.map(Some)))
        })
    }

    async fn mark_submitted(
        &self,
        key: &ReservationKey,
        transaction_hash: &str,
    ) -> Result<(), CarbonError> {
        self.update(key, |current| {
            let write = lifecycle::submitted(current, key, transaction_hash)?;
            Ok(((), write.map(Some)))
        })
    }

    async fn confirm(&self, key: &ReservationKey, receipt: &MintReceipt) -> Result<(), CarbonError> {
        self.update(key, |current| {
            let write = lifecycle::confirmed(current, key, receipt)?;
            Ok(((), write.map(Some)))
        })
    }

    async fn release(&self, key: &ReservationKey) -> Result<(), CarbonError> {
        self.update(key, |current| {
            let delete = lifecycle::released(current.as_ref(), key)?;
            Ok(((), if delete { Some(None) } else { None }))
        })
    }

    async fn get(&self, key: &ReservationKey) -> Result<Option<Reservation>, CarbonError> {
        self.get_sync(key)
    }

    async fn list(&self) -> Result<Vec<Reservation>, CarbonError> {
        self.list_sync()
    }
}

/// RocksDB reports a held LOCK file as an IO error mentioning the lock.
fn is_lock_contention(err: &CarbonError) -> bool {
    match err {
        CarbonError::Storage(msg) => {
            let lower = msg.to_ascii_lowercase();
            lower.contains("lock") && (lower.contains("unavailable") || lower.contains("hold"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_format() {
        let key = ReservationKey::from_raw("AC:XX0001:day:2025-03-15T00:00:00Z");
        assert_eq!(
            RocksReservationStore::storage_key(&key),
            b"reservation:AC:XX0001:day:2025-03-15T00:00:00Z".to_vec()
        );
    }

    #[test]
    fn test_lock_contention_detection() {
        let held = CarbonError::Storage(
            "Failed to open RocksDB at /tmp/x: IO error: While lock file: /tmp/x/LOCK: Resource temporarily unavailable"
                .to_string(),
        );
        assert!(is_lock_contention(&held));
        assert!(!is_lock_contention(&CarbonError::Storage("Corruption".to_string())));
    }
}
