use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobwork_core::{AggregateRoot, DomainError, DomainResult, TenantId, UserId};

use crate::assignment::AssignmentId;
use crate::product::{ProductId, check_quantity};

/// Dispatch (outgoing challan) identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchId(Uuid);

jobwork_core::impl_uuid_newtype!(DispatchId, "DispatchId");

/// Job worker reference. Workers are managed outside the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobWorkerId(Uuid);

jobwork_core::impl_uuid_newtype!(JobWorkerId, "JobWorkerId");

/// Human-readable dispatch number, `CH-00001`, `CH-00002`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchNumber(String);

impl DispatchNumber {
    const PREFIX: &'static str = "CH-";

    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("{}{:05}", Self::PREFIX, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix(Self::PREFIX)?.parse().ok()
    }
}

impl core::fmt::Display for DispatchNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One requested line of an assign-to-worker request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
}

/// Command: AssignToWorker.
///
/// Every item becomes its own work assignment under a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignToWorker {
    pub tenant_id: TenantId,
    pub dispatch_id: DispatchId,
    pub jobworker_id: JobWorkerId,
    pub assigned_by: UserId,
    pub items: Vec<AssignItem>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AssignToWorker {
    pub fn validate(&self) -> DomainResult<()> {
        if self.items.is_empty() {
            return Err(DomainError::validation("at least one item is required"));
        }
        for (idx, item) in self.items.iter().enumerate() {
            check_quantity(&format!("item {idx}"), item.quantity)?;
        }
        Ok(())
    }
}

/// Aggregate root: Dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    id: DispatchId,
    tenant_id: TenantId,
    number: DispatchNumber,
    jobworker_id: JobWorkerId,
    dispatched_by: UserId,
    dispatched_at: DateTime<Utc>,
    notes: Option<String>,
    assignment_ids: Vec<AssignmentId>,
    version: u64,
}

impl Dispatch {
    pub fn open(cmd: &AssignToWorker, number: DispatchNumber) -> Self {
        Self {
            id: cmd.dispatch_id,
            tenant_id: cmd.tenant_id,
            number,
            jobworker_id: cmd.jobworker_id,
            dispatched_by: cmd.assigned_by,
            dispatched_at: cmd.occurred_at,
            notes: cmd.notes.clone(),
            assignment_ids: Vec::new(),
            version: 0,
        }
    }

    /// Link an assignment. Only allowed before the dispatch is first committed.
    pub fn attach(&mut self, assignment_id: AssignmentId) -> DomainResult<()> {
        if self.version != 0 {
            return Err(DomainError::invariant(format!(
                "dispatch {} is already committed",
                self.number
            )));
        }
        self.assignment_ids.push(assignment_id);
        Ok(())
    }

    pub fn id_typed(&self) -> DispatchId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn number(&self) -> &DispatchNumber {
        &self.number
    }

    pub fn jobworker_id(&self) -> JobWorkerId {
        self.jobworker_id
    }

    pub fn dispatched_by(&self) -> UserId {
        self.dispatched_by
    }

    pub fn dispatched_at(&self) -> DateTime<Utc> {
        self.dispatched_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn assignment_ids(&self) -> &[AssignmentId] {
        &self.assignment_ids
    }
}

impl AggregateRoot for Dispatch {
    type Id = DispatchId;

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

    fn cmd(items: Vec<AssignItem>) -> AssignToWorker {
        AssignToWorker {
            tenant_id: TenantId::new(),
            dispatch_id: DispatchId::new(),
            jobworker_id: JobWorkerId::new(),
            assigned_by: UserId::new(),
            items,
            notes: Some("stitching".to_string()),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(DispatchNumber::from_sequence(1).as_str(), "CH-00001");
        assert_eq!(DispatchNumber::from_sequence(123_456).as_str(), "CH-123456");
        assert_eq!(DispatchNumber::from_sequence(42).sequence(), Some(42));
    }

    #[test]
    fn validate_requires_positive_items() {
        assert!(cmd(vec![]).validate().is_err());
        let bad = cmd(vec![AssignItem {
            product_id: ProductId::new(),
            quantity: -2,
            unit_price: 10,
        }]);
        match bad.validate().unwrap_err() {
            DomainError::Validation(msg) if msg.contains("item 0") => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn attach_is_closed_after_commit() {
        let mut d = Dispatch::open(&cmd(vec![]), DispatchNumber::from_sequence(1));
        d.attach(AssignmentId::new()).unwrap();
        d.record_commit(1);
        assert!(d.attach(AssignmentId::new()).is_err());
        assert_eq!(d.assignment_ids().len(), 1);
    }
}
