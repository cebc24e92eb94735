//! Unit-of-work storage boundary for the stock ledger.
//!
//! Every ledger operation runs as one serializable unit of work against one
//! tenant. The trait makes no storage assumptions; the in-memory engine is the
//! implementation used by tests, benches and the dev server.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{LedgerStore, LedgerTx, StoreError};
