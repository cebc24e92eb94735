//! Infrastructure wiring shared by every handler.

use std::sync::Arc;

use jobwork_core::{DomainError, DomainResult};
use jobwork_infra::{InMemoryLedgerStore, LedgerConfig, StockLedger};

pub type Ledger = StockLedger<Arc<InMemoryLedgerStore>>;

pub struct AppServices {
    ledger: Ledger,
}

impl AppServices {
    /// Run one ledger operation on the blocking pool.
    ///
    /// The store holds std locks while a unit runs and sleeps between commit
    /// attempts, neither of which may happen on an async worker thread.
    pub async fn run<T, F>(self: &Arc<Self>, op: F) -> DomainResult<T>
    where
        F: FnOnce(&Ledger) -> DomainResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let services = Arc::clone(self);
        tokio::task::spawn_blocking(move || op(&services.ledger))
            .await
            .map_err(|e| DomainError::invariant(format!("ledger task did not finish: {e}")))?
    }
}

pub fn build_services(config: LedgerConfig) -> AppServices {
    let store = Arc::new(InMemoryLedgerStore::with_config(config));
    AppServices {
        ledger: StockLedger::new(store),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jobwork_core::TenantId;

    #[tokio::test]
    async fn ledger_calls_run_off_the_async_workers() {
        let services = Arc::new(build_services(LedgerConfig::default()));
        let tenant_id = TenantId::new();

        let rows = services
            .run(move |ledger| ledger.product_stock_summary(tenant_id))
            .await
            .unwrap();
        assert!(rows.is_empty());

        let err = services
            .run(|_| Err::<(), _>(DomainError::contention("busy")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "contention");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn panicking_operation_becomes_an_invariant_error() {
        let services = Arc::new(build_services(LedgerConfig::default()));
        let err = services
            .run(|_| -> DomainResult<()> { panic!("ledger bug") })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
    }
}
