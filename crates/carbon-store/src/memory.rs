// crates/carbon-store/src/memory.rs
//
// In-memory ReservationStore for tests and dry runs.
//
// A single tokio Mutex around the map makes every operation, including
// check-and-reserve, a critical section.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use carbon_core::error::CarbonError;
use carbon_core::mint::{MintReceipt, MintRequest};
use carbon_core::reservation::{Reservation, ReservationKey, ReserveOutcome};
use carbon_core::traits::ReservationStore;

use crate::lifecycle;

/// Non-durable reservation store. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    records: Mutex<BTreeMap<ReservationKey, Reservation>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn check_and_reserve(
        &self,
        key: &ReservationKey,
        request: &MintRequest,
        from_block: u64,
    ) -> Result<ReserveOutcome, CarbonError> {
        let mut records = self.records.lock().await;
        let (outcome, write) = lifecycle::check(records.get(key).cloned(), key, request, from_block);
        if let Some(record) = write {
            records.insert(key.clone(), record);
        }
        Ok(outcome)
    }

    async fn mark_submitted(
        &self,
        key: &ReservationKey,
        transaction_hash: &str,
    ) -> Result<(), CarbonError> {
        let mut records = self.records.lock().await;
        if let Some(record) = lifecycle::submitted(records.get(key).cloned(), key, transaction_hash)? {
            records.insert(key.clone(), record);
        }
        Ok(())
    }

    async fn confirm(&self, key: &ReservationKey, receipt: &MintReceipt) -> Result<(), CarbonError> {
        let mut records = self.records.lock().await;
        if let Some(record) = lifecycle::confirmed(records.get(key).cloned(), key, receipt)? {
            records.insert(key.clone(), record);
        }
        Ok(())
    }

    async fn release(&self, key: &ReservationKey) -> Result<(), CarbonError> {
        let mut records = self.records.lock().await;
        if lifecycle::released(records.get(key), key)? {
            records.remove(key);
        }
        Ok(())
    }

    async fn get(&self, key: &ReservationKey) -> Result<Option<Reservation>, CarbonError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<Reservation>, CarbonError> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}
