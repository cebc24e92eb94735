use std::sync::Arc;

use thiserror::Error;

use jobwork_core::{DomainError, DomainResult, TenantId};
use jobwork_stock::{
    AssignmentId, AuditLedgerEntry, BatchId, Dispatch, DispatchId, DispatchNumber, InventoryBatch,
    Product, ProductId, ReturnRequest, ReturnRequestId, SaleOrder, SaleOrderId, WorkAssignment,
};

/// Store-level failure, before it is folded into a [`DomainError`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Something this unit of work read changed before it could commit.
    #[error("read set invalidated: {0}")]
    Conflict(String),

    /// A writer panicked while holding the tenant lock.
    #[error("ledger lock poisoned")]
    Poisoned,
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        DomainError::contention(value.to_string())
    }
}

/// One unit of work against a single tenant's ledger.
///
/// Reads always observe the unit's own staged writes. Nothing written through
/// this handle is visible to anyone else until the unit commits, and if the
/// unit returns an error every staged write is discarded.
///
/// Scans return records in a deterministic order:
/// batches by (challan date, creation time, id), everything else by
/// (creation time, id), audit entries in append order.
pub trait LedgerTx {
    fn tenant_id(&self) -> TenantId;

    fn product(&mut self, id: ProductId) -> DomainResult<Option<Product>>;
    fn products(&mut self) -> DomainResult<Vec<Product>>;

    fn batch(&mut self, id: BatchId) -> DomainResult<Option<InventoryBatch>>;
    fn batches(&mut self) -> DomainResult<Vec<InventoryBatch>>;
    fn batches_for_product(&mut self, product_id: ProductId)
    -> DomainResult<Vec<InventoryBatch>>;

    fn assignment(&mut self, id: AssignmentId) -> DomainResult<Option<WorkAssignment>>;
    fn assignments_for_product(
        &mut self,
        product_id: ProductId,
    ) -> DomainResult<Vec<WorkAssignment>>;

    fn return_request(&mut self, id: ReturnRequestId) -> DomainResult<Option<ReturnRequest>>;
    fn return_requests_for_assignment(
        &mut self,
        assignment_id: AssignmentId,
    ) -> DomainResult<Vec<ReturnRequest>>;
    fn return_requests(&mut self) -> DomainResult<Vec<ReturnRequest>>;

    fn dispatch(&mut self, id: DispatchId) -> DomainResult<Option<Dispatch>>;
    fn dispatches(&mut self) -> DomainResult<Vec<Dispatch>>;

    fn sale_order(&mut self, id: SaleOrderId) -> DomainResult<Option<SaleOrder>>;
    fn sale_orders(&mut self) -> DomainResult<Vec<SaleOrder>>;

    fn audit_entries(&mut self, product_id: ProductId) -> DomainResult<Vec<AuditLedgerEntry>>;

    fn save_product(&mut self, product: Product) -> DomainResult<()>;
    fn save_batch(&mut self, batch: InventoryBatch) -> DomainResult<()>;
    fn save_assignment(&mut self, assignment: WorkAssignment) -> DomainResult<()>;
    fn save_return_request(&mut self, request: ReturnRequest) -> DomainResult<()>;
    fn save_dispatch(&mut self, dispatch: Dispatch) -> DomainResult<()>;
    fn save_sale_order(&mut self, order: SaleOrder) -> DomainResult<()>;
    fn append_audit(&mut self, entry: AuditLedgerEntry) -> DomainResult<()>;

    /// Remove a batch. Deleting a batch that does not exist is a no-op.
    fn delete_batch(&mut self, id: BatchId) -> DomainResult<()>;

    /// Reserve the tenant's next dispatch number.
    fn next_dispatch_number(&mut self) -> DomainResult<DispatchNumber>;
}

/// Serializable unit-of-work runner, tenant-scoped.
///
/// `execute` may call `work` more than once: when the commit finds that
/// something the unit read has since changed, the staged writes are thrown
/// away and the unit re-runs against fresh state. `work` must therefore keep
/// all of its effects inside the transaction handle.
pub trait LedgerStore: Send + Sync {
    fn execute<T, F>(&self, tenant_id: TenantId, work: F) -> DomainResult<T>
    where
        F: FnMut(&mut dyn LedgerTx) -> DomainResult<T>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore,
{
    fn execute<T, F>(&self, tenant_id: TenantId, work: F) -> DomainResult<T>
    where
        F: FnMut(&mut dyn LedgerTx) -> DomainResult<T>,
    {
        (**self).execute(tenant_id, work)
    }
}
