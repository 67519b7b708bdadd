// crates/carbon-store/src/lib.rs
//
// carbon-store: Reservation storage for the minter's duplicate guard.
//
// Provides a RocksDB-backed durable store (transactional check-and-reserve,
// cross-process exclusion through the database lock) and an in-memory
// store with the same semantics for tests and dry runs.

mod lifecycle;
pub mod memory;
pub mod rocks;

// Re-export key types for ergonomic access from downstream crates.
pub use memory::InMemoryReservationStore;
pub use rocks::RocksReservationStore;
