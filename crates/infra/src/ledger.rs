//! Stock ledger service (application-level orchestration).
//!
//! Every public operation here is exactly one unit of work on the injected
//! [`LedgerStore`]: it reads what it needs, lets the pure `jobwork-stock`
//! domain decide, stages the resulting writes and either commits all of them
//! or none. Identifiers and timestamps are fixed before the unit starts, and
//! audit entry ids are handed out by an [`AuditIds`] that lives outside the
//! unit, so a retried unit produces the same records.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use jobwork_core::{AggregateRoot, DomainError, DomainResult, TenantId, UserId};
use jobwork_stock::{
    AssignToWorker, AssignmentId, AssignmentStatus, AuditEntryId, AuditKind, AuditLedgerEntry,
    BatchAvailability, BatchId, CreateSaleOrder, Dispatch, DispatchId, InventoryBatch,
    JobWorkerId, NewAssignment, Product, ProductId, ReceiveBatch, ReturnRequest, ReturnRequestId,
    ReturnSplit, ReviewAction, SaleOrder, SellableStock, WorkAssignment, plan_allocation,
    plan_sale_deduction,
};

use crate::store::{LedgerStore, LedgerTx};

/// Registry row as reported by the stock summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStock {
    pub product_id: ProductId,
    pub title: String,
    pub sku: Option<String>,
    pub total_available_stock: i64,
}

/// A dispatch together with the assignments it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub dispatch: Dispatch,
    pub assignments: Vec<WorkAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerDispatches {
    pub jobworker_id: JobWorkerId,
    pub dispatches: Vec<DispatchOutcome>,
}

/// Assigned quantity of one job worker, summed per assignment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatusCounts {
    pub jobworker_id: JobWorkerId,
    pub pending: i64,
    pub in_progress: i64,
    pub cleared: i64,
}

/// Audit entry ids handed out in order. Rewound at the top of every attempt,
/// a retried unit gets back the ids its earlier attempt used.
#[derive(Debug, Default)]
struct AuditIds {
    issued: Vec<AuditEntryId>,
    cursor: usize,
}

impl AuditIds {
    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn stamp(&mut self, entry: AuditLedgerEntry) -> AuditLedgerEntry {
        let id = match self.issued.get(self.cursor) {
            Some(id) => *id,
            None => {
                let id = AuditEntryId::new();
                self.issued.push(id);
                id
            }
        };
        self.cursor += 1;
        entry.with_id(id)
    }
}

/// The stock ledger: receipt, allocation, returns, sales and their reads.
#[derive(Debug, Clone)]
pub struct StockLedger<S> {
    store: S,
}

impl<S> StockLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> StockLedger<S>
where
    S: LedgerStore,
{
    /// Seed a product in the registry with zero stock.
    #[instrument(
        skip(self, title, sku),
        fields(tenant_id = %tenant_id, product_id = %product_id),
        err
    )]
    pub fn register_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        title: &str,
        sku: Option<String>,
    ) -> DomainResult<Product> {
        let product = Product::register(tenant_id, product_id, title, sku)?;
        let product = self.store.execute(tenant_id, |tx| {
            if tx.product(product_id)?.is_some() {
                return Err(DomainError::validation(format!(
                    "product {product_id} is already registered"
                )));
            }
            tx.save_product(product.clone())?;
            Ok(committed(product.clone()))
        })?;
        info!(title = product.title(), "product registered");
        Ok(product)
    }

    /// Receive a batch: persist it and credit every line to the registry.
    #[instrument(
        skip(self, cmd),
        fields(tenant_id = %cmd.tenant_id, batch_id = %cmd.batch_id, lines = cmd.lines.len()),
        err
    )]
    pub fn receive_batch(&self, cmd: &ReceiveBatch) -> DomainResult<InventoryBatch> {
        cmd.validate()?;
        let mut audit_ids = AuditIds::default();
        let batch = self.store.execute(cmd.tenant_id, |tx| {
            audit_ids.rewind();
            if tx.batch(cmd.batch_id)?.is_some() {
                return Err(DomainError::validation(format!(
                    "batch {} already exists",
                    cmd.batch_id
                )));
            }
            let batch = InventoryBatch::receive(cmd)?;
            for line in batch.lines() {
                let mut product = load_product(tx, line.product_id)?;
                product.credit(line.quantity_received)?;
                tx.append_audit(audit_ids.stamp(AuditLedgerEntry::batch_received(
                    cmd.tenant_id,
                    cmd.issued_by,
                    line.product_id,
                    product.title(),
                    line.quantity_received,
                    batch.id_typed(),
                    batch.challan_no(),
                    cmd.occurred_at,
                )))?;
                tx.save_product(product)?;
            }
            tx.save_batch(batch.clone())?;
            Ok(committed(batch))
        })?;
        info!(challan_no = batch.challan_no(), "batch received");
        Ok(batch)
    }

    /// Assign stock to a job worker: one dispatch, one assignment per item,
    /// FIFO batch draws and registry debits, all in one unit.
    #[instrument(
        skip(self, cmd),
        fields(
            tenant_id = %cmd.tenant_id,
            dispatch_id = %cmd.dispatch_id,
            jobworker_id = %cmd.jobworker_id,
            items = cmd.items.len()
        ),
        err
    )]
    pub fn assign_to_workers(&self, cmd: &AssignToWorker) -> DomainResult<DispatchOutcome> {
        cmd.validate()?;
        let assignment_ids: Vec<AssignmentId> =
            cmd.items.iter().map(|_| AssignmentId::new()).collect();
        let mut audit_ids = AuditIds::default();

        let outcome = self.store.execute(cmd.tenant_id, |tx| {
            audit_ids.rewind();
            let number = tx.next_dispatch_number()?;
            let mut dispatch = Dispatch::open(cmd, number);
            let mut assignments = Vec::with_capacity(cmd.items.len());

            for (item, assignment_id) in cmd.items.iter().zip(&assignment_ids) {
                let mut product = load_product(tx, item.product_id)?;
                product.ensure_available(item.quantity)?;

                let mut batches = tx.batches_for_product(item.product_id)?;
                let availability: Vec<BatchAvailability> = batches
                    .iter()
                    .filter_map(|b| b.availability(item.product_id))
                    .collect();
                let plan = plan_allocation(&availability, item.quantity)?;
                for draw in &plan.draws {
                    let batch = batches
                        .iter_mut()
                        .find(|b| b.id_typed() == draw.batch_id)
                        .ok_or_else(|| {
                            DomainError::invariant(format!(
                                "planned batch {} vanished",
                                draw.batch_id
                            ))
                        })?;
                    batch.draw(item.product_id, draw.quantity)?;
                    tx.save_batch(batch.clone())?;
                }
                if plan.from_returned_stock > 0 {
                    debug!(
                        product_id = %item.product_id,
                        from_returned_stock = plan.from_returned_stock,
                        "allocation partly covered by returned stock"
                    );
                }
                product.debit(item.quantity)?;

                let assignment = WorkAssignment::assign(NewAssignment {
                    id: *assignment_id,
                    tenant_id: cmd.tenant_id,
                    product_id: item.product_id,
                    jobworker_id: cmd.jobworker_id,
                    dispatch_id: cmd.dispatch_id,
                    assigned_by: cmd.assigned_by,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    notes: cmd.notes.clone(),
                    source_batches: plan.draws.clone(),
                    from_returned_stock: plan.from_returned_stock,
                    created_at: cmd.occurred_at,
                })?;
                dispatch.attach(assignment.id_typed())?;
                tx.append_audit(audit_ids.stamp(AuditLedgerEntry::stock_assigned(
                    cmd.tenant_id,
                    cmd.assigned_by,
                    item.product_id,
                    product.title(),
                    item.quantity,
                    cmd.dispatch_id,
                    dispatch.number().as_str(),
                    assignment.id_typed(),
                    cmd.occurred_at,
                )))?;
                tx.save_product(product)?;
                tx.save_assignment(assignment.clone())?;
                assignments.push(committed(assignment));
            }

            tx.save_dispatch(dispatch.clone())?;
            Ok(DispatchOutcome {
                dispatch: committed(dispatch),
                assignments,
            })
        })?;
        info!(number = %outcome.dispatch.number(), "stock assigned");
        Ok(outcome)
    }

    /// Stage a return proposal and lock the assignment until it is reviewed.
    #[instrument(
        skip(self, split),
        fields(tenant_id = %tenant_id, assignment_id = %assignment_id),
        err
    )]
    pub fn submit_return(
        &self,
        tenant_id: TenantId,
        assignment_id: AssignmentId,
        submitted_by: UserId,
        split: ReturnSplit,
    ) -> DomainResult<ReturnRequest> {
        let request_id = ReturnRequestId::new();
        let at = Utc::now();
        let mut audit_ids = AuditIds::default();
        let request = self.store.execute(tenant_id, |tx| {
            audit_ids.rewind();
            let mut assignment = load_assignment(tx, assignment_id)?;
            assignment.stage_return(request_id, split)?;
            let product = load_product(tx, assignment.product_id())?;

            let request = ReturnRequest::submit(
                tenant_id,
                request_id,
                assignment_id,
                split,
                submitted_by,
                at,
            );
            tx.append_audit(audit_ids.stamp(AuditLedgerEntry::return_submitted(
                tenant_id,
                submitted_by,
                assignment.product_id(),
                product.title(),
                split.total(),
                assignment_id,
                request_id,
                at,
            )))?;
            tx.save_assignment(assignment)?;
            tx.save_return_request(request.clone())?;
            Ok(committed(request))
        })?;
        info!(request_id = %request.id_typed(), total = split.total(), "return submitted");
        Ok(request)
    }

    /// Approve or reject a pending return request.
    #[instrument(
        skip(self, rejection_reason),
        fields(tenant_id = %tenant_id, request_id = %request_id, action = ?action),
        err
    )]
    pub fn review_return(
        &self,
        tenant_id: TenantId,
        request_id: ReturnRequestId,
        action: ReviewAction,
        reviewer: UserId,
        rejection_reason: Option<String>,
    ) -> DomainResult<WorkAssignment> {
        let at = Utc::now();
        let mut audit_ids = AuditIds::default();
        let assignment = self.store.execute(tenant_id, |tx| {
            audit_ids.rewind();
            let mut request = tx
                .return_request(request_id)?
                .ok_or_else(|| DomainError::not_found(format!("return request {request_id}")))?;
            match action {
                ReviewAction::Approve => request.approve(reviewer, at)?,
                ReviewAction::Reject => request.reject(reviewer, rejection_reason.clone(), at)?,
            }

            let mut assignment = load_assignment(tx, request.assignment_id())?;
            let product = load_product(tx, assignment.product_id())?;
            match action {
                ReviewAction::Reject => {
                    assignment.discard_staged(request_id)?;
                    tx.append_audit(audit_ids.stamp(AuditLedgerEntry::return_rejected(
                        tenant_id,
                        reviewer,
                        assignment.product_id(),
                        product.title(),
                        request.proposed().total(),
                        assignment.id_typed(),
                        request_id,
                        request.rejection_reason().unwrap_or_default(),
                        at,
                    )))?;
                }
                ReviewAction::Approve => {
                    let split = assignment.commit_staged(request_id)?;
                    if split != request.proposed() {
                        return Err(DomainError::invariant(format!(
                            "staged deltas on {} do not match request {request_id}",
                            assignment.id_typed()
                        )));
                    }
                    let committed_return = CommittedReturn {
                        reviewer,
                        split,
                        request_id,
                        at,
                    };
                    committed_return.record(tx, &mut audit_ids, &assignment, product)?;
                }
            }

            tx.save_return_request(request)?;
            tx.save_assignment(assignment.clone())?;
            Ok(committed(assignment))
        })?;
        info!(status = ?assignment.status(), "return reviewed");
        Ok(assignment)
    }

    /// Submit and approve in one step, bypassing the lock. Capacity excludes
    /// whatever outstanding requests on the assignment have staged.
    #[instrument(
        skip(self, split),
        fields(tenant_id = %tenant_id, assignment_id = %assignment_id),
        err
    )]
    pub fn direct_process_return(
        &self,
        tenant_id: TenantId,
        assignment_id: AssignmentId,
        reviewer: UserId,
        split: ReturnSplit,
    ) -> DomainResult<WorkAssignment> {
        let request_id = ReturnRequestId::new();
        let at = Utc::now();
        let mut audit_ids = AuditIds::default();
        let assignment = self.store.execute(tenant_id, |tx| {
            audit_ids.rewind();
            let mut assignment = load_assignment(tx, assignment_id)?;
            let pending_elsewhere: i64 = tx
                .return_requests_for_assignment(assignment_id)?
                .iter()
                .filter(|r| r.is_pending())
                .map(|r| r.proposed().total())
                .sum();
            assignment.apply_direct(split, pending_elsewhere)?;

            let product = load_product(tx, assignment.product_id())?;
            let committed_return = CommittedReturn {
                reviewer,
                split,
                request_id,
                at,
            };
            committed_return.record(tx, &mut audit_ids, &assignment, product)?;
            tx.save_return_request(ReturnRequest::recorded_direct(
                tenant_id,
                request_id,
                assignment_id,
                split,
                reviewer,
                at,
            ))?;
            tx.save_assignment(assignment.clone())?;
            Ok(committed(assignment))
        })?;
        info!(
            status = ?assignment.status(),
            total = split.total(),
            "return processed directly"
        );
        Ok(assignment)
    }

    /// Fulfil a sale from cleared, unsold assignment stock, oldest first.
    #[instrument(
        skip(self, cmd),
        fields(tenant_id = %cmd.tenant_id, order_id = %cmd.order_id, lines = cmd.lines.len()),
        err
    )]
    pub fn create_sale_order(&self, cmd: &CreateSaleOrder) -> DomainResult<SaleOrder> {
        cmd.validate()?;
        let mut audit_ids = AuditIds::default();
        let order = self.store.execute(cmd.tenant_id, |tx| {
            audit_ids.rewind();
            if tx.sale_order(cmd.order_id)?.is_some() {
                return Err(DomainError::validation(format!(
                    "sale order {} already exists",
                    cmd.order_id
                )));
            }
            let mut deductions = Vec::new();
            for line in &cmd.lines {
                let mut product = load_product(tx, line.product_id)?;
                let assignments = tx.assignments_for_product(line.product_id)?;
                let stock: Vec<SellableStock> = assignments
                    .iter()
                    .map(|a| SellableStock {
                        assignment_id: a.id_typed(),
                        created_at: a.created_at(),
                        sellable: a.sellable(),
                    })
                    .collect();
                let plan = plan_sale_deduction(line.product_id, &stock, line.quantity)?;

                for deduction in &plan {
                    let mut assignment = assignments
                        .iter()
                        .find(|a| a.id_typed() == deduction.assignment_id)
                        .cloned()
                        .ok_or_else(|| {
                            DomainError::invariant(format!(
                                "planned assignment {} vanished",
                                deduction.assignment_id
                            ))
                        })?;
                    assignment.record_sale(deduction.quantity)?;
                    tx.save_assignment(assignment)?;
                }
                product.debit(line.quantity)?;
                tx.append_audit(audit_ids.stamp(AuditLedgerEntry::sale_fulfilled(
                    cmd.tenant_id,
                    cmd.created_by,
                    line.product_id,
                    product.title(),
                    line.quantity,
                    cmd.order_id,
                    cmd.occurred_at,
                )))?;
                tx.save_product(product)?;
                deductions.extend(plan);
            }

            let order = SaleOrder::fulfilled(cmd, deductions)?;
            tx.save_sale_order(order.clone())?;
            Ok(committed(order))
        })?;
        info!(total = order.total(), "sale order fulfilled");
        Ok(order)
    }

    /// Withdraw a batch that was entered by mistake. Only a batch nobody has
    /// drawn from may go; its received quantities leave the registry with it.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, batch_id = %batch_id), err)]
    pub fn delete_batch(
        &self,
        tenant_id: TenantId,
        batch_id: BatchId,
        performed_by: UserId,
    ) -> DomainResult<InventoryBatch> {
        let at = Utc::now();
        let mut audit_ids = AuditIds::default();
        let batch = self.store.execute(tenant_id, |tx| {
            audit_ids.rewind();
            let batch = load_batch(tx, batch_id)?;
            batch.ensure_untouched()?;
            for line in batch.lines() {
                let mut product = load_product(tx, line.product_id)?;
                product.debit(line.quantity_received)?;
                tx.append_audit(audit_ids.stamp(AuditLedgerEntry::batch_deleted(
                    tenant_id,
                    performed_by,
                    line.product_id,
                    product.title(),
                    line.quantity_received,
                    batch_id,
                    batch.challan_no(),
                    at,
                )))?;
                tx.save_product(product)?;
            }
            tx.delete_batch(batch_id)?;
            Ok(batch)
        })?;
        info!(challan_no = batch.challan_no(), "batch deleted");
        Ok(batch)
    }

    /// Every batch of the tenant, in FIFO order.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn batches(&self, tenant_id: TenantId) -> DomainResult<Vec<InventoryBatch>> {
        self.store.execute(tenant_id, |tx| tx.batches())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, batch_id = %batch_id), err)]
    pub fn batch(&self, tenant_id: TenantId, batch_id: BatchId) -> DomainResult<InventoryBatch> {
        self.store.execute(tenant_id, |tx| load_batch(tx, batch_id))
    }

    /// Sale orders, newest first.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn sale_orders(&self, tenant_id: TenantId) -> DomainResult<Vec<SaleOrder>> {
        self.store.execute(tenant_id, |tx| {
            let mut orders = tx.sale_orders()?;
            orders.reverse();
            Ok(orders)
        })
    }

    /// Quantity assigned to one job worker, split by assignment status.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, jobworker_id = %jobworker_id), err)]
    pub fn worker_status_counts(
        &self,
        tenant_id: TenantId,
        jobworker_id: JobWorkerId,
    ) -> DomainResult<WorkerStatusCounts> {
        self.store.execute(tenant_id, |tx| {
            let mut counts = WorkerStatusCounts {
                jobworker_id,
                pending: 0,
                in_progress: 0,
                cleared: 0,
            };
            for dispatch in tx.dispatches()? {
                if dispatch.jobworker_id() != jobworker_id {
                    continue;
                }
                for id in dispatch.assignment_ids() {
                    let assignment = load_assignment(tx, *id)?;
                    let bucket = match assignment.status() {
                        AssignmentStatus::Pending => &mut counts.pending,
                        AssignmentStatus::InProgress => &mut counts.in_progress,
                        AssignmentStatus::Cleared => &mut counts.cleared,
                    };
                    *bucket = bucket.saturating_add(assignment.quantity());
                }
            }
            Ok(counts)
        })
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn product_stock_summary(&self, tenant_id: TenantId) -> DomainResult<Vec<ProductStock>> {
        self.store.execute(tenant_id, |tx| {
            Ok(tx
                .products()?
                .into_iter()
                .map(|p| ProductStock {
                    product_id: p.id_typed(),
                    title: p.title().to_string(),
                    sku: p.sku().map(str::to_string),
                    total_available_stock: p.total_available_stock(),
                })
                .collect())
        })
    }

    /// Requests awaiting review, oldest first.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn pending_return_requests(&self, tenant_id: TenantId) -> DomainResult<Vec<ReturnRequest>> {
        self.store.execute(tenant_id, |tx| {
            Ok(tx
                .return_requests()?
                .into_iter()
                .filter(ReturnRequest::is_pending)
                .collect())
        })
    }

    /// Requests filed by `submitter`, newest first.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, submitter = %submitter), err)]
    pub fn return_requests_by_submitter(
        &self,
        tenant_id: TenantId,
        submitter: UserId,
    ) -> DomainResult<Vec<ReturnRequest>> {
        self.store.execute(tenant_id, |tx| {
            let mut mine: Vec<ReturnRequest> = tx
                .return_requests()?
                .into_iter()
                .filter(|r| r.submitted_by() == submitter)
                .collect();
            mine.reverse();
            Ok(mine)
        })
    }

    /// Every dispatch with its assignments, grouped by job worker.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn dispatches_by_worker(&self, tenant_id: TenantId) -> DomainResult<Vec<WorkerDispatches>> {
        self.store.execute(tenant_id, |tx| {
            let mut grouped: BTreeMap<JobWorkerId, Vec<DispatchOutcome>> = BTreeMap::new();
            for dispatch in tx.dispatches()? {
                let outcome = expand_dispatch(tx, dispatch)?;
                grouped
                    .entry(outcome.dispatch.jobworker_id())
                    .or_default()
                    .push(outcome);
            }
            Ok(grouped
                .into_iter()
                .map(|(jobworker_id, dispatches)| WorkerDispatches {
                    jobworker_id,
                    dispatches,
                })
                .collect())
        })
    }

    /// Audit trail of one product, in append order.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    pub fn product_audit_trail(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> DomainResult<Vec<AuditLedgerEntry>> {
        self.store.execute(tenant_id, |tx| {
            load_product(tx, product_id)?;
            tx.audit_entries(product_id)
        })
    }

    #[instrument(
        skip(self),
        fields(tenant_id = %tenant_id, assignment_id = %assignment_id),
        err
    )]
    pub fn assignment(
        &self,
        tenant_id: TenantId,
        assignment_id: AssignmentId,
    ) -> DomainResult<WorkAssignment> {
        self.store
            .execute(tenant_id, |tx| load_assignment(tx, assignment_id))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, dispatch_id = %dispatch_id), err)]
    pub fn dispatch(
        &self,
        tenant_id: TenantId,
        dispatch_id: DispatchId,
    ) -> DomainResult<DispatchOutcome> {
        self.store.execute(tenant_id, |tx| {
            let dispatch = tx
                .dispatch(dispatch_id)?
                .ok_or_else(|| DomainError::not_found(format!("dispatch {dispatch_id}")))?;
            expand_dispatch(tx, dispatch)
        })
    }
}

/// The record as it will read once the unit commits. Every unit writes a
/// row at most once, and each committed write moves its version up by one.
fn committed<A: AggregateRoot>(mut record: A) -> A {
    let next = record.version() + 1;
    record.record_commit(next);
    record
}

fn load_product(tx: &mut dyn LedgerTx, id: ProductId) -> DomainResult<Product> {
    tx.product(id)?
        .ok_or_else(|| DomainError::not_found(format!("product {id}")))
}

fn load_batch(tx: &mut dyn LedgerTx, id: BatchId) -> DomainResult<InventoryBatch> {
    tx.batch(id)?
        .ok_or_else(|| DomainError::not_found(format!("batch {id}")))
}

fn load_assignment(tx: &mut dyn LedgerTx, id: AssignmentId) -> DomainResult<WorkAssignment> {
    tx.assignment(id)?
        .ok_or_else(|| DomainError::not_found(format!("assignment {id}")))
}

fn expand_dispatch(tx: &mut dyn LedgerTx, dispatch: Dispatch) -> DomainResult<DispatchOutcome> {
    let mut assignments = Vec::with_capacity(dispatch.assignment_ids().len());
    for id in dispatch.assignment_ids() {
        assignments.push(load_assignment(tx, *id)?);
    }
    Ok(DispatchOutcome {
        dispatch,
        assignments,
    })
}

/// An approved return, ready to hit the registry and the audit ledger.
struct CommittedReturn {
    reviewer: UserId,
    split: ReturnSplit,
    request_id: ReturnRequestId,
    at: chrono::DateTime<Utc>,
}

impl CommittedReturn {
    /// Registry credit for the cleared part plus one audit entry per non-zero bucket.
    fn record(
        &self,
        tx: &mut dyn LedgerTx,
        audit_ids: &mut AuditIds,
        assignment: &WorkAssignment,
        mut product: Product,
    ) -> DomainResult<()> {
        let buckets = [
            (AuditKind::ReturnCleared, self.split.cleared),
            (AuditKind::ReturnLost, self.split.lost),
            (AuditKind::ReturnDamaged, self.split.damaged),
        ];
        for (kind, quantity) in buckets {
            if quantity > 0 {
                tx.append_audit(audit_ids.stamp(AuditLedgerEntry::return_committed(
                    assignment.tenant_id(),
                    kind,
                    self.reviewer,
                    assignment.product_id(),
                    product.title(),
                    quantity,
                    assignment.id_typed(),
                    self.request_id,
                    self.at,
                )))?;
            }
        }
        if self.split.cleared > 0 {
            product.credit(self.split.cleared)?;
            tx.save_product(product)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AuditLedgerEntry {
        AuditLedgerEntry::batch_received(
            TenantId::new(),
            UserId::new(),
            ProductId::new(),
            "Saree",
            3,
            BatchId::new(),
            "V-1",
            Utc::now(),
        )
    }

    #[test]
    fn rewound_audit_ids_repeat_across_attempts() {
        let mut ids = AuditIds::default();
        let first: Vec<AuditEntryId> = (0..3).map(|_| ids.stamp(entry()).id).collect();

        ids.rewind();
        let retried: Vec<AuditEntryId> = (0..3).map(|_| ids.stamp(entry()).id).collect();
        assert_eq!(first, retried);

        let extra = ids.stamp(entry()).id;
        assert!(!first.contains(&extra));
    }
}
