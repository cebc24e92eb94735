use chrono::{DateTime, Utc};
use serde::Deserialize;

use jobwork_core::AggregateRoot;
use jobwork_infra::{DispatchOutcome, WorkerDispatches};
use jobwork_stock::{ReturnLock, ReturnSplit, WorkAssignment};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    pub title: String,
    pub sku: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveBatchLineRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: u64,
    #[serde(default)]
    pub discount: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveBatchRequest {
    pub vendor_id: String,
    pub challan_no: String,
    /// Defaults to the time of receipt.
    pub challan_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub lines: Vec<ReceiveBatchLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct AssignItemRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: u64,
}

#[derive(Debug, Deserialize)]
pub struct AssignToWorkerRequest {
    pub jobworker_id: String,
    pub notes: Option<String>,
    pub items: Vec<AssignItemRequest>,
}

/// Return quantities; omitted buckets are zero.
#[derive(Debug, Default, Deserialize)]
pub struct ReturnSplitRequest {
    #[serde(default)]
    pub cleared: i64,
    #[serde(default)]
    pub lost: i64,
    #[serde(default)]
    pub damaged: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReviewReturnRequest {
    pub action: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: u64,
    #[serde(default)]
    pub discount: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleOrderRequest {
    pub invoice_no: Option<String>,
    pub invoice_date: Option<DateTime<Utc>>,
    pub customer_id: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<SaleLineRequest>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn split_to_json(split: ReturnSplit) -> serde_json::Value {
    serde_json::json!({
        "cleared": split.cleared,
        "lost": split.lost,
        "damaged": split.damaged,
    })
}

pub fn assignment_to_json(a: &WorkAssignment) -> serde_json::Value {
    let locked_by = match a.lock() {
        ReturnLock::Free => None,
        ReturnLock::Locked(request_id) => Some(request_id.to_string()),
    };
    serde_json::json!({
        "id": a.id_typed().to_string(),
        "product_id": a.product_id().to_string(),
        "jobworker_id": a.jobworker_id().to_string(),
        "dispatch_id": a.dispatch_id().to_string(),
        "assigned_by": a.assigned_by().to_string(),
        "quantity": a.quantity(),
        "unit_price": a.unit_price(),
        "notes": a.notes(),
        "status": a.status(),
        "committed": split_to_json(a.committed()),
        "pending": split_to_json(a.pending()),
        "sold_quantity": a.sold_quantity(),
        "remaining": a.remaining(),
        "sellable": a.sellable(),
        "locked_by": locked_by,
        "source_batches": a.source_batches(),
        "from_returned_stock": a.from_returned_stock(),
        "created_at": a.created_at().to_rfc3339(),
        "version": a.version(),
    })
}

pub fn dispatch_to_json(outcome: &DispatchOutcome) -> serde_json::Value {
    let d = &outcome.dispatch;
    serde_json::json!({
        "id": d.id_typed().to_string(),
        "number": d.number().as_str(),
        "jobworker_id": d.jobworker_id().to_string(),
        "dispatched_by": d.dispatched_by().to_string(),
        "dispatched_at": d.dispatched_at().to_rfc3339(),
        "notes": d.notes(),
        "assignments": outcome.assignments.iter().map(assignment_to_json).collect::<Vec<_>>(),
    })
}

pub fn worker_dispatches_to_json(group: &WorkerDispatches) -> serde_json::Value {
    serde_json::json!({
        "jobworker_id": group.jobworker_id.to_string(),
        "dispatches": group.dispatches.iter().map(dispatch_to_json).collect::<Vec<_>>(),
    })
}
