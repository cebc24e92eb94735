use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobwork_core::{AggregateRoot, DomainError, DomainResult, TenantId, UserId};

use crate::allocation::BatchAvailability;
use crate::product::{ProductId, check_quantity};

/// Inventory batch (challan) identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

jobwork_core::impl_uuid_newtype!(BatchId, "BatchId");

/// Vendor reference. Vendors are managed outside the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(Uuid);

jobwork_core::impl_uuid_newtype!(VendorId, "VendorId");

/// One product line of a received batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLine {
    pub product_id: ProductId,
    pub quantity_received: i64,
    pub quantity_remaining: i64,
    pub unit_price: u64,
    pub discount: u64,
}

/// Incoming line as supplied at receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    pub discount: u64,
}

/// Paperwork that came with the delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMeta {
    pub challan_no: String,
    /// Receipt date. This is the FIFO key for allocation.
    pub challan_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Command: ReceiveBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBatch {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub vendor_id: VendorId,
    pub issued_by: UserId,
    pub lines: Vec<ReceivedLine>,
    pub meta: BatchMeta,
    pub occurred_at: DateTime<Utc>,
}

impl ReceiveBatch {
    pub fn validate(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("a batch needs at least one line"));
        }
        if self.meta.challan_no.trim().is_empty() {
            return Err(DomainError::validation("challan number cannot be empty"));
        }
        let mut seen = HashSet::new();
        for (idx, line) in self.lines.iter().enumerate() {
            check_quantity(&format!("line {idx}"), line.quantity)?;
            if line.discount > line.unit_price {
                return Err(DomainError::validation(format!(
                    "line {idx}: discount exceeds unit price"
                )));
            }
            if !seen.insert(line.product_id) {
                return Err(DomainError::validation(format!(
                    "line {idx}: product {} listed twice in one batch",
                    line.product_id
                )));
            }
        }
        Ok(())
    }
}

/// Aggregate root: InventoryBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryBatch {
    id: BatchId,
    tenant_id: TenantId,
    vendor_id: VendorId,
    issued_by: UserId,
    challan_no: String,
    challan_date: DateTime<Utc>,
    notes: Option<String>,
    lines: Vec<BatchLine>,
    created_at: DateTime<Utc>,
    version: u64,
}

impl InventoryBatch {
    /// Build a fresh batch; every line starts fully available.
    pub fn receive(cmd: &ReceiveBatch) -> DomainResult<Self> {
        cmd.validate()?;
        let lines = cmd
            .lines
            .iter()
            .map(|l| BatchLine {
                product_id: l.product_id,
                quantity_received: l.quantity,
                quantity_remaining: l.quantity,
                unit_price: l.unit_price,
                discount: l.discount,
            })
            .collect();
        Ok(Self {
            id: cmd.batch_id,
            tenant_id: cmd.tenant_id,
            vendor_id: cmd.vendor_id,
            issued_by: cmd.issued_by,
            challan_no: cmd.meta.challan_no.trim().to_string(),
            challan_date: cmd.meta.challan_date,
            notes: cmd.meta.notes.clone(),
            lines,
            created_at: cmd.occurred_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> BatchId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    pub fn issued_by(&self) -> UserId {
        self.issued_by
    }

    pub fn challan_no(&self) -> &str {
        &self.challan_no
    }

    pub fn challan_date(&self) -> DateTime<Utc> {
        self.challan_date
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn lines(&self) -> &[BatchLine] {
        &self.lines
    }

    pub fn line(&self, product_id: ProductId) -> Option<&BatchLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.lines.iter().map(|l| l.product_id)
    }

    /// Planner view of this batch for one product, if it carries that product.
    pub fn availability(&self, product_id: ProductId) -> Option<BatchAvailability> {
        self.line(product_id).map(|l| BatchAvailability {
            batch_id: self.id,
            received_at: self.challan_date,
            created_at: self.created_at,
            remaining: l.quantity_remaining,
        })
    }

    /// Take `quantity` units of `product_id` out of this batch.
    pub fn draw(&mut self, product_id: ProductId, quantity: i64) -> DomainResult<()> {
        let batch_id = self.id;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or_else(|| {
                DomainError::invariant(format!("batch {batch_id} has no line for {product_id}"))
            })?;
        if quantity <= 0 || quantity > line.quantity_remaining {
            return Err(DomainError::invariant(format!(
                "cannot draw {quantity} from batch {batch_id}: {} remaining",
                line.quantity_remaining
            )));
        }
        line.quantity_remaining -= quantity;
        self.check_invariants()
    }

    /// A batch may only be withdrawn while no unit has been drawn from any line.
    pub fn ensure_untouched(&self) -> DomainResult<()> {
        match self
            .lines
            .iter()
            .find(|l| l.quantity_remaining != l.quantity_received)
        {
            Some(line) => Err(DomainError::validation(format!(
                "batch {} cannot be deleted: {} of {} units of {} already issued",
                self.id,
                line.quantity_received - line.quantity_remaining,
                line.quantity_received,
                line.product_id
            ))),
            None => Ok(()),
        }
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        for line in &self.lines {
            if line.quantity_remaining < 0 || line.quantity_remaining > line.quantity_received {
                return Err(DomainError::invariant(format!(
                    "batch {} line {}: remaining {} outside 0..={}",
                    self.id, line.product_id, line.quantity_remaining, line.quantity_received
                )));
            }
        }
        Ok(())
    }
}

impl AggregateRoot for InventoryBatch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn record_commit(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receive_cmd(lines: Vec<ReceivedLine>) -> ReceiveBatch {
        ReceiveBatch {
            tenant_id: TenantId::new(),
            batch_id: BatchId::new(),
            vendor_id: VendorId::new(),
            issued_by: UserId::new(),
            lines,
            meta: BatchMeta {
                challan_no: "V-101".to_string(),
                challan_date: Utc::now(),
                notes: None,
            },
            occurred_at: Utc::now(),
        }
    }

    fn line(product_id: ProductId, quantity: i64) -> ReceivedLine {
        ReceivedLine {
            product_id,
            quantity,
            unit_price: 250,
            discount: 0,
        }
    }

    #[test]
    fn receive_starts_every_line_fully_available() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let batch = InventoryBatch::receive(&receive_cmd(vec![line(a, 10), line(b, 4)])).unwrap();
        assert_eq!(batch.line(a).unwrap().quantity_remaining, 10);
        assert_eq!(batch.line(b).unwrap().quantity_received, 4);
        assert_eq!(batch.availability(b).unwrap().remaining, 4);
    }

    #[test]
    fn receive_rejects_non_positive_quantity() {
        let cmd = receive_cmd(vec![line(ProductId::new(), 0)]);
        let err = InventoryBatch::receive(&cmd).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("positive") => {}
            _ => panic!("expected validation error, got: {err:?}"),
        }
    }

    #[test]
    fn receive_rejects_empty_and_duplicate_lines() {
        assert_eq!(
            InventoryBatch::receive(&receive_cmd(vec![])).unwrap_err().code(),
            "validation_error"
        );
        let p = ProductId::new();
        let err = InventoryBatch::receive(&receive_cmd(vec![line(p, 1), line(p, 2)])).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn draw_decrements_and_refuses_overdraw() {
        let p = ProductId::new();
        let mut batch = InventoryBatch::receive(&receive_cmd(vec![line(p, 5)])).unwrap();
        batch.draw(p, 3).unwrap();
        assert_eq!(batch.line(p).unwrap().quantity_remaining, 2);

        let err = batch.draw(p, 3).unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
        assert_eq!(batch.line(p).unwrap().quantity_remaining, 2);

        assert!(batch.draw(ProductId::new(), 1).is_err());
    }

    #[test]
    fn only_untouched_batches_may_be_deleted() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let cmd = receive_cmd(vec![line(a, 5), line(b, 3)]);
        let mut batch = InventoryBatch::receive(&cmd).unwrap();
        batch.ensure_untouched().unwrap();

        batch.draw(b, 1).unwrap();
        let err = batch.ensure_untouched().unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert!(err.to_string().contains("1 of 3 units"));
    }
}
