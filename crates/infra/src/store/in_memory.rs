use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, warn};

use jobwork_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion, TenantId};
use jobwork_stock::{
    AssignmentId, AuditLedgerEntry, BatchId, Dispatch, DispatchId, DispatchNumber, InventoryBatch,
    Product, ProductId, ReturnRequest, ReturnRequestId, SaleOrder, SaleOrderId, WorkAssignment,
};

use super::r#trait::{LedgerStore, LedgerTx, StoreError};
use crate::config::LedgerConfig;

/// Versioned thing a unit of work can read: a single row or a whole scan.
///
/// Scan keys are bumped whenever any member of the scan is written, so a unit
/// that planned from a scan conflicts with any concurrent change to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Product(ProductId),
    Batch(BatchId),
    Assignment(AssignmentId),
    ReturnRequest(ReturnRequestId),
    Dispatch(DispatchId),
    SaleOrder(SaleOrderId),
    Products,
    Batches,
    BatchesOf(ProductId),
    AssignmentsOf(ProductId),
    RequestsOf(AssignmentId),
    ReturnRequests,
    Dispatches,
    SaleOrders,
    AuditOf(ProductId),
    DispatchSequence,
}

#[derive(Debug, Default)]
struct TenantLedger {
    products: HashMap<ProductId, Product>,
    batches: HashMap<BatchId, InventoryBatch>,
    assignments: HashMap<AssignmentId, WorkAssignment>,
    return_requests: HashMap<ReturnRequestId, ReturnRequest>,
    dispatches: HashMap<DispatchId, Dispatch>,
    sale_orders: HashMap<SaleOrderId, SaleOrder>,
    audit: Vec<AuditLedgerEntry>,
    dispatch_seq: u64,
    versions: HashMap<RowKey, u64>,
}

impl TenantLedger {
    fn version(&self, key: RowKey) -> u64 {
        self.versions.get(&key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: RowKey) -> u64 {
        let v = self.versions.entry(key).or_insert(0);
        *v += 1;
        *v
    }

    fn validate(&self, reads: &HashMap<RowKey, u64>) -> Result<(), StoreError> {
        for (key, seen) in reads {
            let current = self.version(*key);
            if !ExpectedVersion::Exact(*seen).matches(current) {
                return Err(StoreError::Conflict(format!(
                    "{key:?} moved from version {seen} to {current}"
                )));
            }
        }
        Ok(())
    }

    fn apply(&mut self, staged: Staged) {
        for (id, mut product) in staged.products {
            let v = self.bump(RowKey::Product(id));
            self.bump(RowKey::Products);
            product.record_commit(v);
            self.products.insert(id, product);
        }
        for (id, mut batch) in staged.batches {
            let v = self.bump(RowKey::Batch(id));
            let products: Vec<ProductId> = batch.product_ids().collect();
            for product_id in products {
                self.bump(RowKey::BatchesOf(product_id));
            }
            self.bump(RowKey::Batches);
            batch.record_commit(v);
            self.batches.insert(id, batch);
        }
        for id in staged.deleted_batches {
            if let Some(batch) = self.batches.remove(&id) {
                self.bump(RowKey::Batch(id));
                self.bump(RowKey::Batches);
                for product_id in batch.product_ids() {
                    self.bump(RowKey::BatchesOf(product_id));
                }
            }
        }
        for (id, mut assignment) in staged.assignments {
            let v = self.bump(RowKey::Assignment(id));
            self.bump(RowKey::AssignmentsOf(assignment.product_id()));
            assignment.record_commit(v);
            self.assignments.insert(id, assignment);
        }
        for (id, mut request) in staged.return_requests {
            let v = self.bump(RowKey::ReturnRequest(id));
            self.bump(RowKey::RequestsOf(request.assignment_id()));
            self.bump(RowKey::ReturnRequests);
            request.record_commit(v);
            self.return_requests.insert(id, request);
        }
        for (id, mut dispatch) in staged.dispatches {
            let v = self.bump(RowKey::Dispatch(id));
            self.bump(RowKey::Dispatches);
            dispatch.record_commit(v);
            self.dispatches.insert(id, dispatch);
        }
        for (id, mut order) in staged.sale_orders {
            let v = self.bump(RowKey::SaleOrder(id));
            self.bump(RowKey::SaleOrders);
            order.record_commit(v);
            self.sale_orders.insert(id, order);
        }
        for entry in staged.audit {
            self.bump(RowKey::AuditOf(entry.product_id));
            self.audit.push(entry);
        }
        if let Some(seq) = staged.dispatch_seq {
            self.dispatch_seq = seq;
            self.bump(RowKey::DispatchSequence);
        }
    }
}

/// Writes buffered by a unit of work until commit.
#[derive(Debug, Default)]
struct Staged {
    products: HashMap<ProductId, Product>,
    batches: HashMap<BatchId, InventoryBatch>,
    deleted_batches: HashSet<BatchId>,
    assignments: HashMap<AssignmentId, WorkAssignment>,
    return_requests: HashMap<ReturnRequestId, ReturnRequest>,
    dispatches: HashMap<DispatchId, Dispatch>,
    sale_orders: HashMap<SaleOrderId, SaleOrder>,
    audit: Vec<AuditLedgerEntry>,
    dispatch_seq: Option<u64>,
}

impl Staged {
    fn is_empty(&self) -> bool {
        self.products.is_empty()
            && self.batches.is_empty()
            && self.deleted_batches.is_empty()
            && self.assignments.is_empty()
            && self.return_requests.is_empty()
            && self.dispatches.is_empty()
            && self.sale_orders.is_empty()
            && self.audit.is_empty()
            && self.dispatch_seq.is_none()
    }
}

fn row<K, V>(staged: &HashMap<K, V>, committed: &HashMap<K, V>, id: K) -> Option<V>
where
    K: Eq + Hash,
    V: Clone,
{
    staged.get(&id).or_else(|| committed.get(&id)).cloned()
}

fn scan<K, V>(
    staged: &HashMap<K, V>,
    committed: &HashMap<K, V>,
    keep: impl Fn(&V) -> bool,
) -> Vec<V>
where
    K: Eq + Hash,
    V: Clone,
{
    committed
        .iter()
        .filter(|(k, _)| !staged.contains_key(k))
        .map(|(_, v)| v)
        .chain(staged.values())
        .filter(|v| keep(v))
        .cloned()
        .collect()
}

struct MemoryTx<'a> {
    tenant_id: TenantId,
    ledger: &'a TenantLedger,
    reads: HashMap<RowKey, u64>,
    staged: Staged,
}

impl<'a> MemoryTx<'a> {
    fn new(tenant_id: TenantId, ledger: &'a TenantLedger) -> Self {
        Self {
            tenant_id,
            ledger,
            reads: HashMap::new(),
            staged: Staged::default(),
        }
    }

    /// Remember the first version seen; later reads of the same key are
    /// served from the same snapshot.
    fn observe(&mut self, key: RowKey) {
        let v = self.ledger.version(key);
        self.reads.entry(key).or_insert(v);
    }

    fn ensure_tenant(&self, owner: TenantId, what: &str) -> DomainResult<()> {
        if owner != self.tenant_id {
            return Err(DomainError::invariant(format!(
                "{what} belongs to another tenant"
            )));
        }
        Ok(())
    }
}

impl LedgerTx for MemoryTx<'_> {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn product(&mut self, id: ProductId) -> DomainResult<Option<Product>> {
        self.observe(RowKey::Product(id));
        Ok(row(&self.staged.products, &self.ledger.products, id))
    }

    fn products(&mut self) -> DomainResult<Vec<Product>> {
        self.observe(RowKey::Products);
        let mut out = scan(&self.staged.products, &self.ledger.products, |_| true);
        out.sort_by(|a, b| a.title().cmp(b.title()).then(a.id_typed().cmp(&b.id_typed())));
        Ok(out)
    }

    fn batch(&mut self, id: BatchId) -> DomainResult<Option<InventoryBatch>> {
        self.observe(RowKey::Batch(id));
        if self.staged.deleted_batches.contains(&id) {
            return Ok(None);
        }
        Ok(row(&self.staged.batches, &self.ledger.batches, id))
    }

    fn batches(&mut self) -> DomainResult<Vec<InventoryBatch>> {
        self.observe(RowKey::Batches);
        let deleted = &self.staged.deleted_batches;
        let mut out = scan(&self.staged.batches, &self.ledger.batches, |b| {
            !deleted.contains(&b.id_typed())
        });
        out.sort_by_key(|b| (b.challan_date(), b.created_at(), b.id_typed()));
        Ok(out)
    }

    fn batches_for_product(
        &mut self,
        product_id: ProductId,
    ) -> DomainResult<Vec<InventoryBatch>> {
        self.observe(RowKey::BatchesOf(product_id));
        let deleted = &self.staged.deleted_batches;
        let mut out = scan(&self.staged.batches, &self.ledger.batches, |b| {
            b.line(product_id).is_some() && !deleted.contains(&b.id_typed())
        });
        out.sort_by_key(|b| (b.challan_date(), b.created_at(), b.id_typed()));
        Ok(out)
    }

    fn assignment(&mut self, id: AssignmentId) -> DomainResult<Option<WorkAssignment>> {
        self.observe(RowKey::Assignment(id));
        Ok(row(&self.staged.assignments, &self.ledger.assignments, id))
    }

    fn assignments_for_product(
        &mut self,
        product_id: ProductId,
    ) -> DomainResult<Vec<WorkAssignment>> {
        self.observe(RowKey::AssignmentsOf(product_id));
        let mut out = scan(&self.staged.assignments, &self.ledger.assignments, |a| {
            a.product_id() == product_id
        });
        out.sort_by_key(|a| (a.created_at(), a.id_typed()));
        Ok(out)
    }

    fn return_request(&mut self, id: ReturnRequestId) -> DomainResult<Option<ReturnRequest>> {
        self.observe(RowKey::ReturnRequest(id));
        Ok(row(&self.staged.return_requests, &self.ledger.return_requests, id))
    }

    fn return_requests_for_assignment(
        &mut self,
        assignment_id: AssignmentId,
    ) -> DomainResult<Vec<ReturnRequest>> {
        self.observe(RowKey::RequestsOf(assignment_id));
        let mut out = scan(&self.staged.return_requests, &self.ledger.return_requests, |r| {
            r.assignment_id() == assignment_id
        });
        out.sort_by_key(|r| (r.submitted_at(), r.id_typed()));
        Ok(out)
    }

    fn return_requests(&mut self) -> DomainResult<Vec<ReturnRequest>> {
        self.observe(RowKey::ReturnRequests);
        let mut out = scan(&self.staged.return_requests, &self.ledger.return_requests, |_| true);
        out.sort_by_key(|r| (r.submitted_at(), r.id_typed()));
        Ok(out)
    }

    fn dispatch(&mut self, id: DispatchId) -> DomainResult<Option<Dispatch>> {
        self.observe(RowKey::Dispatch(id));
        Ok(row(&self.staged.dispatches, &self.ledger.dispatches, id))
    }

    fn dispatches(&mut self) -> DomainResult<Vec<Dispatch>> {
        self.observe(RowKey::Dispatches);
        let mut out = scan(&self.staged.dispatches, &self.ledger.dispatches, |_| true);
        out.sort_by_key(|d| (d.dispatched_at(), d.id_typed()));
        Ok(out)
    }

    fn sale_order(&mut self, id: SaleOrderId) -> DomainResult<Option<SaleOrder>> {
        self.observe(RowKey::SaleOrder(id));
        Ok(row(&self.staged.sale_orders, &self.ledger.sale_orders, id))
    }

    fn sale_orders(&mut self) -> DomainResult<Vec<SaleOrder>> {
        self.observe(RowKey::SaleOrders);
        let mut out = scan(&self.staged.sale_orders, &self.ledger.sale_orders, |_| true);
        out.sort_by_key(|o| (o.created_at(), o.id_typed()));
        Ok(out)
    }

    fn audit_entries(&mut self, product_id: ProductId) -> DomainResult<Vec<AuditLedgerEntry>> {
        self.observe(RowKey::AuditOf(product_id));
        Ok(self
            .ledger
            .audit
            .iter()
            .chain(self.staged.audit.iter())
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect())
    }

    fn save_product(&mut self, product: Product) -> DomainResult<()> {
        self.ensure_tenant(product.tenant_id(), "product")?;
        self.staged.products.insert(product.id_typed(), product);
        Ok(())
    }

    fn save_batch(&mut self, batch: InventoryBatch) -> DomainResult<()> {
        self.ensure_tenant(batch.tenant_id(), "batch")?;
        self.staged.deleted_batches.remove(&batch.id_typed());
        self.staged.batches.insert(batch.id_typed(), batch);
        Ok(())
    }

    fn save_assignment(&mut self, assignment: WorkAssignment) -> DomainResult<()> {
        self.ensure_tenant(assignment.tenant_id(), "assignment")?;
        self.staged.assignments.insert(assignment.id_typed(), assignment);
        Ok(())
    }

    fn save_return_request(&mut self, request: ReturnRequest) -> DomainResult<()> {
        self.ensure_tenant(request.tenant_id(), "return request")?;
        self.staged.return_requests.insert(request.id_typed(), request);
        Ok(())
    }

    fn save_dispatch(&mut self, dispatch: Dispatch) -> DomainResult<()> {
        self.ensure_tenant(dispatch.tenant_id(), "dispatch")?;
        self.staged.dispatches.insert(dispatch.id_typed(), dispatch);
        Ok(())
    }

    fn save_sale_order(&mut self, order: SaleOrder) -> DomainResult<()> {
        self.ensure_tenant(order.tenant_id(), "sale order")?;
        self.staged.sale_orders.insert(order.id_typed(), order);
        Ok(())
    }

    fn append_audit(&mut self, entry: AuditLedgerEntry) -> DomainResult<()> {
        self.ensure_tenant(entry.tenant_id, "audit entry")?;
        self.staged.audit.push(entry);
        Ok(())
    }

    fn delete_batch(&mut self, id: BatchId) -> DomainResult<()> {
        self.observe(RowKey::Batch(id));
        self.staged.batches.remove(&id);
        if self.ledger.batches.contains_key(&id) {
            self.staged.deleted_batches.insert(id);
        }
        Ok(())
    }

    fn next_dispatch_number(&mut self) -> DomainResult<DispatchNumber> {
        self.observe(RowKey::DispatchSequence);
        let next = self.staged.dispatch_seq.unwrap_or(self.ledger.dispatch_seq) + 1;
        self.staged.dispatch_seq = Some(next);
        Ok(DispatchNumber::from_sequence(next))
    }
}

enum Attempt<T> {
    Committed(T),
    Conflict(StoreError),
}

/// In-memory, tenant-partitioned ledger with optimistic commits.
///
/// Intended for tests/dev. A unit of work runs against a consistent snapshot
/// (the tenant's read lock is held while it runs), recording the version of
/// every row and scan it reads. Commit takes the write lock, re-checks those
/// versions and either applies all staged writes or retries the unit.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tenants: RwLock<HashMap<TenantId, Arc<RwLock<TenantLedger>>>>,
    config: LedgerConfig,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            tenants: RwLock::default(),
            config,
        }
    }

    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    fn ledger(&self, tenant_id: TenantId) -> Result<Arc<RwLock<TenantLedger>>, StoreError> {
        {
            let tenants = self.tenants.read().map_err(|_| StoreError::Poisoned)?;
            if let Some(ledger) = tenants.get(&tenant_id) {
                return Ok(ledger.clone());
            }
        }
        let mut tenants = self.tenants.write().map_err(|_| StoreError::Poisoned)?;
        Ok(tenants.entry(tenant_id).or_default().clone())
    }

    fn attempt<T, F>(
        &self,
        tenant_id: TenantId,
        ledger: &RwLock<TenantLedger>,
        work: &mut F,
    ) -> DomainResult<Attempt<T>>
    where
        F: FnMut(&mut dyn LedgerTx) -> DomainResult<T>,
    {
        let (value, reads, staged) = {
            let snapshot = ledger.read().map_err(|_| StoreError::Poisoned)?;
            let mut tx = MemoryTx::new(tenant_id, &snapshot);
            let value = work(&mut tx)?;
            let MemoryTx { reads, staged, .. } = tx;
            (value, reads, staged)
        };

        if staged.is_empty() {
            return Ok(Attempt::Committed(value));
        }

        let mut ledger = ledger.write().map_err(|_| StoreError::Poisoned)?;
        if let Err(conflict) = ledger.validate(&reads) {
            return Ok(Attempt::Conflict(conflict));
        }
        ledger.apply(staged);
        Ok(Attempt::Committed(value))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn execute<T, F>(&self, tenant_id: TenantId, mut work: F) -> DomainResult<T>
    where
        F: FnMut(&mut dyn LedgerTx) -> DomainResult<T>,
    {
        let ledger = self.ledger(tenant_id)?;
        let started = Instant::now();
        let mut attempt: u32 = 1;
        loop {
            match self.attempt(tenant_id, &ledger, &mut work)? {
                Attempt::Committed(value) => return Ok(value),
                Attempt::Conflict(conflict) => {
                    if attempt >= self.config.max_attempts
                        || started.elapsed() >= self.config.contention_timeout
                    {
                        warn!(
                            tenant_id = %tenant_id,
                            attempts = attempt,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "unit of work abandoned under contention"
                        );
                        return Err(DomainError::contention(format!(
                            "ledger busy, gave up after {attempt} attempts"
                        )));
                    }
                    debug!(
                        tenant_id = %tenant_id,
                        attempt,
                        %conflict,
                        "commit conflict, retrying"
                    );
                    std::thread::sleep(self.config.retry_backoff * attempt);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jobwork_core::UserId;
    use jobwork_stock::{BatchMeta, ReceiveBatch, ReceivedLine, VendorId};

    fn product(tenant_id: TenantId, title: &str) -> Product {
        Product::register(tenant_id, ProductId::new(), title, None).unwrap()
    }

    #[test]
    fn reads_see_own_staged_writes() {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantId::new();
        let p = product(tenant, "Dupatta");
        let id = p.id_typed();

        let seen = store
            .execute(tenant, |tx| {
                tx.save_product(p.clone())?;
                Ok(tx.product(id)?.map(|p| p.title().to_string()))
            })
            .unwrap();
        assert_eq!(seen.as_deref(), Some("Dupatta"));

        let committed = store.execute(tenant, |tx| tx.product(id)).unwrap().unwrap();
        assert_eq!(committed.version(), 1);
    }

    #[test]
    fn error_discards_every_staged_write() {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantId::new();
        let p = product(tenant, "Lehenga");
        let id = p.id_typed();

        let err = store
            .execute(tenant, |tx| {
                tx.save_product(p.clone())?;
                tx.next_dispatch_number()?;
                Err::<(), _>(DomainError::validation("boom"))
            })
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        assert!(store.execute(tenant, |tx| tx.product(id)).unwrap().is_none());
        let first = store.execute(tenant, |tx| tx.next_dispatch_number()).unwrap();
        assert_eq!(first.as_str(), "CH-00001");
    }

    #[test]
    fn tenants_never_share_rows() {
        let store = InMemoryLedgerStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        let p = product(a, "Shawl");
        let id = p.id_typed();
        store.execute(a, |tx| tx.save_product(p.clone())).unwrap();

        assert!(store.execute(b, |tx| tx.product(id)).unwrap().is_none());
        let first = store.execute(b, |tx| tx.next_dispatch_number()).unwrap();
        assert_eq!(first.as_str(), "CH-00001");

        let err = store.execute(b, |tx| tx.save_product(p.clone())).unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
    }

    fn batch(tenant_id: TenantId, product_id: ProductId) -> InventoryBatch {
        let cmd = ReceiveBatch {
            tenant_id,
            batch_id: BatchId::new(),
            vendor_id: VendorId::new(),
            issued_by: UserId::new(),
            lines: vec![ReceivedLine {
                product_id,
                quantity: 6,
                unit_price: 100,
                discount: 0,
            }],
            meta: BatchMeta {
                challan_no: "V-7".to_string(),
                challan_date: Utc::now(),
                notes: None,
            },
            occurred_at: Utc::now(),
        };
        InventoryBatch::receive(&cmd).unwrap()
    }

    #[test]
    fn deleted_batch_vanishes_from_rows_and_scans() {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantId::new();
        let p = product(tenant, "Kurta");
        let (keep, drop) = (batch(tenant, p.id_typed()), batch(tenant, p.id_typed()));
        let drop_id = drop.id_typed();
        store
            .execute(tenant, |tx| {
                tx.save_batch(keep.clone())?;
                tx.save_batch(drop.clone())
            })
            .unwrap();

        let inside = store
            .execute(tenant, |tx| {
                tx.delete_batch(drop_id)?;
                Ok((tx.batch(drop_id)?.is_none(), tx.batches()?.len()))
            })
            .unwrap();
        assert_eq!(inside, (true, 1));

        let (row, all, of_product) = store
            .execute(tenant, |tx| {
                Ok((tx.batch(drop_id)?, tx.batches()?, tx.batches_for_product(p.id_typed())?))
            })
            .unwrap();
        assert!(row.is_none());
        assert_eq!(all.len(), 1);
        assert_eq!(of_product[0].id_typed(), keep.id_typed());
    }

    #[test]
    fn failed_unit_keeps_the_batch() {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantId::new();
        let b = batch(tenant, ProductId::new());
        let id = b.id_typed();
        store.execute(tenant, |tx| tx.save_batch(b.clone())).unwrap();

        let err = store
            .execute(tenant, |tx| {
                tx.delete_batch(id)?;
                Err::<(), _>(DomainError::validation("changed my mind"))
            })
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert!(store.execute(tenant, |tx| tx.batch(id)).unwrap().is_some());
    }

    #[test]
    fn stale_read_set_fails_validation() {
        let mut ledger = TenantLedger::default();
        let id = ProductId::new();
        let reads = HashMap::from([(RowKey::Product(id), ledger.version(RowKey::Product(id)))]);
        assert!(ledger.validate(&reads).is_ok());

        ledger.bump(RowKey::Product(id));
        match ledger.validate(&reads) {
            Err(StoreError::Conflict(_)) => {}
            other => panic!("expected conflict, got: {other:?}"),
        }
    }
}
