//! Stock ledger domain module.
//!
//! Business rules for the job-work stock ledger, implemented purely as
//! deterministic domain logic (no IO, no storage, no clocks). Multi-record
//! orchestration and atomicity live in `jobwork-infra`; this crate decides
//! what each record may do and how stock is drawn.

pub mod allocation;
pub mod assignment;
pub mod audit;
pub mod batch;
pub mod dispatch;
pub mod product;
pub mod return_request;
pub mod sale;

pub use allocation::{BatchAvailability, Draw, DrawPlan, plan_allocation};
pub use assignment::{
    AssignmentId, AssignmentStatus, NewAssignment, ReturnLock, ReturnSplit, WorkAssignment,
};
pub use audit::{AuditEntryId, AuditKind, AuditLedgerEntry};
pub use batch::{
    BatchId, BatchLine, BatchMeta, InventoryBatch, ReceiveBatch, ReceivedLine, VendorId,
};
pub use dispatch::{AssignItem, AssignToWorker, Dispatch, DispatchId, DispatchNumber, JobWorkerId};
pub use product::{MAX_QUANTITY, Product, ProductId, check_quantity};
pub use return_request::{ReturnRequest, ReturnRequestId, ReturnRequestStatus, ReviewAction};
pub use sale::{
    CreateSaleOrder, CustomerId, SaleDeduction, SaleLine, SaleOrder, SaleOrderId, SellableStock,
    plan_sale_deduction,
};
