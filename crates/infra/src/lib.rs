//! Infrastructure layer: unit-of-work storage, configuration and the stock
//! ledger service that ties the pure domain to a store.

pub mod config;
pub mod ledger;
pub mod store;


pub use config::LedgerConfig;
pub use ledger::{
    DispatchOutcome, ProductStock, StockLedger, WorkerDispatches, WorkerStatusCounts,
};
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerTx, StoreError};
