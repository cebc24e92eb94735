//! Append-only audit ledger entries.
//!
//! Entries are written in the same unit of work as the stock movement they
//! describe and are never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobwork_core::{TenantId, UserId};

use crate::assignment::AssignmentId;
use crate::batch::BatchId;
use crate::dispatch::DispatchId;
use crate::product::ProductId;
use crate::return_request::ReturnRequestId;
use crate::sale::SaleOrderId;

/// Audit entry identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(Uuid);

jobwork_core::impl_uuid_newtype!(AuditEntryId, "AuditEntryId");

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    BatchReceived,
    StockAssigned,
    ReturnSubmitted,
    ReturnRejected,
    ReturnCleared,
    ReturnLost,
    ReturnDamaged,
    SaleFulfilled,
    BatchDeleted,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::BatchReceived => "batch_received",
            AuditKind::StockAssigned => "stock_assigned",
            AuditKind::ReturnSubmitted => "return_submitted",
            AuditKind::ReturnRejected => "return_rejected",
            AuditKind::ReturnCleared => "return_cleared",
            AuditKind::ReturnLost => "return_lost",
            AuditKind::ReturnDamaged => "return_damaged",
            AuditKind::SaleFulfilled => "sale_fulfilled",
            AuditKind::BatchDeleted => "batch_deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLedgerEntry {
    pub id: AuditEntryId,
    pub tenant_id: TenantId,
    pub kind: AuditKind,
    pub message: String,
    pub performed_by: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub batch_id: Option<BatchId>,
    pub dispatch_id: Option<DispatchId>,
    pub assignment_id: Option<AssignmentId>,
    pub return_request_id: Option<ReturnRequestId>,
    pub sale_order_id: Option<SaleOrderId>,
    pub recorded_at: DateTime<Utc>,
}

#[allow(clippy::too_many_arguments)]
impl AuditLedgerEntry {
    fn base(
        tenant_id: TenantId,
        kind: AuditKind,
        performed_by: UserId,
        product_id: ProductId,
        quantity: i64,
        message: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            tenant_id,
            kind,
            message,
            performed_by,
            product_id,
            quantity,
            batch_id: None,
            dispatch_id: None,
            assignment_id: None,
            return_request_id: None,
            sale_order_id: None,
            recorded_at: at,
        }
    }

    pub fn batch_received(
        tenant_id: TenantId,
        performed_by: UserId,
        product_id: ProductId,
        product_title: &str,
        quantity: i64,
        batch_id: BatchId,
        challan_no: &str,
        at: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "STOCK RECEIVED: {quantity} units of '{product_title}' on challan {challan_no}."
        );
        Self {
            batch_id: Some(batch_id),
            ..Self::base(
                tenant_id,
                AuditKind::BatchReceived,
                performed_by,
                product_id,
                quantity,
                message,
                at,
            )
        }
    }

    pub fn batch_deleted(
        tenant_id: TenantId,
        performed_by: UserId,
        product_id: ProductId,
        product_title: &str,
        quantity: i64,
        batch_id: BatchId,
        challan_no: &str,
        at: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "BATCH DELETED: {quantity} units of '{product_title}' withdrawn, challan {challan_no}."
        );
        Self {
            batch_id: Some(batch_id),
            ..Self::base(
                tenant_id,
                AuditKind::BatchDeleted,
                performed_by,
                product_id,
                quantity,
                message,
                at,
            )
        }
    }

    /// Replace the generated id, so a retried unit of work writes the same entry id.
    pub fn with_id(mut self, id: AuditEntryId) -> Self {
        self.id = id;
        self
    }

    pub fn stock_assigned(
        tenant_id: TenantId,
        performed_by: UserId,
        product_id: ProductId,
        product_title: &str,
        quantity: i64,
        dispatch_id: DispatchId,
        dispatch_no: &str,
        assignment_id: AssignmentId,
        at: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "STOCK ASSIGNED: {quantity} units of '{product_title}' issued on {dispatch_no}."
        );
        Self {
            dispatch_id: Some(dispatch_id),
            assignment_id: Some(assignment_id),
            ..Self::base(
                tenant_id,
                AuditKind::StockAssigned,
                performed_by,
                product_id,
                quantity,
                message,
                at,
            )
        }
    }

    pub fn return_submitted(
        tenant_id: TenantId,
        performed_by: UserId,
        product_id: ProductId,
        product_title: &str,
        quantity: i64,
        assignment_id: AssignmentId,
        request_id: ReturnRequestId,
        at: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "RETURN SUBMITTED: {quantity} units of '{product_title}' reported, awaiting review."
        );
        Self {
            assignment_id: Some(assignment_id),
            return_request_id: Some(request_id),
            ..Self::base(
                tenant_id,
                AuditKind::ReturnSubmitted,
                performed_by,
                product_id,
                quantity,
                message,
                at,
            )
        }
    }

    pub fn return_rejected(
        tenant_id: TenantId,
        performed_by: UserId,
        product_id: ProductId,
        product_title: &str,
        quantity: i64,
        assignment_id: AssignmentId,
        request_id: ReturnRequestId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Self {
        let message = format!(
            "RETURN REJECTED: {quantity} units of '{product_title}'. Reason: {reason}"
        );
        Self {
            assignment_id: Some(assignment_id),
            return_request_id: Some(request_id),
            ..Self::base(
                tenant_id,
                AuditKind::ReturnRejected,
                performed_by,
                product_id,
                quantity,
                message,
                at,
            )
        }
    }

    /// One entry for a committed return bucket (cleared, lost or damaged).
    pub fn return_committed(
        tenant_id: TenantId,
        kind: AuditKind,
        performed_by: UserId,
        product_id: ProductId,
        product_title: &str,
        quantity: i64,
        assignment_id: AssignmentId,
        request_id: ReturnRequestId,
        at: DateTime<Utc>,
    ) -> Self {
        let message = match kind {
            AuditKind::ReturnCleared => format!(
                "RETURN CLEARED: {quantity} units of '{product_title}' returned (stock added back)."
            ),
            AuditKind::ReturnLost => {
                format!("RETURN LOST: {quantity} units of '{product_title}' reported as shortage.")
            }
            _ => format!(
                "RETURN DAMAGED: {quantity} units of '{product_title}' reported as seconds."
            ),
        };
        Self {
            assignment_id: Some(assignment_id),
            return_request_id: Some(request_id),
            ..Self::base(tenant_id, kind, performed_by, product_id, quantity, message, at)
        }
    }

    pub fn sale_fulfilled(
        tenant_id: TenantId,
        performed_by: UserId,
        product_id: ProductId,
        product_title: &str,
        quantity: i64,
        order_id: SaleOrderId,
        at: DateTime<Utc>,
    ) -> Self {
        let message = format!("STOCK SOLD: {quantity} units of '{product_title}' sold.");
        Self {
            sale_order_id: Some(order_id),
            ..Self::base(
                tenant_id,
                AuditKind::SaleFulfilled,
                performed_by,
                product_id,
                quantity,
                message,
                at,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_return_wording_per_bucket() {
        let mk = |kind| {
            AuditLedgerEntry::return_committed(
                TenantId::new(),
                kind,
                UserId::new(),
                ProductId::new(),
                "Saree",
                7,
                AssignmentId::new(),
                ReturnRequestId::new(),
                Utc::now(),
            )
        };
        let cleared = mk(AuditKind::ReturnCleared);
        assert_eq!(
            cleared.message,
            "RETURN CLEARED: 7 units of 'Saree' returned (stock added back)."
        );
        assert!(cleared.return_request_id.is_some());
        assert!(mk(AuditKind::ReturnLost).message.starts_with("RETURN LOST: 7"));
        assert!(mk(AuditKind::ReturnDamaged).message.starts_with("RETURN DAMAGED: 7"));
    }

    #[test]
    fn with_id_keeps_everything_but_the_id() {
        let batch_id = BatchId::new();
        let entry = AuditLedgerEntry::batch_deleted(
            TenantId::new(),
            UserId::new(),
            ProductId::new(),
            "Kurta",
            12,
            batch_id,
            "V-9",
            Utc::now(),
        );
        let fixed = AuditEntryId::new();
        let stamped = entry.clone().with_id(fixed);
        assert_eq!(stamped.id, fixed);
        assert_eq!(stamped.kind, AuditKind::BatchDeleted);
        assert_eq!(stamped.batch_id, Some(batch_id));
        assert_eq!(stamped.message, entry.message);
        assert!(stamped.message.starts_with("BATCH DELETED: 12 units of 'Kurta'"));
    }

    #[test]
    fn kind_serializes_as_stable_code() {
        let json = serde_json::to_value(AuditKind::SaleFulfilled).unwrap();
        assert_eq!(json, serde_json::json!(AuditKind::SaleFulfilled.as_str()));
    }
}
