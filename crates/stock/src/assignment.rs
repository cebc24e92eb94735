//! Work assignments and their return accounting.
//!
//! An assignment's quantity never changes after creation. Returns move units
//! into one of three committed buckets (cleared, lost, damaged), either via a
//! staged proposal guarded by [`ReturnLock`] or directly. Sales later consume
//! cleared units through a separate `sold_quantity` counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobwork_core::{AggregateRoot, DomainError, DomainResult, TenantId, UserId};

use crate::allocation::Draw;
use crate::dispatch::{DispatchId, JobWorkerId};
use crate::product::{MAX_QUANTITY, ProductId};
use crate::return_request::ReturnRequestId;

/// Work assignment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(Uuid);

jobwork_core::impl_uuid_newtype!(AssignmentId, "AssignmentId");

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Cleared,
}

impl AssignmentStatus {
    /// Status is a function of the committed total alone.
    pub fn from_counts(quantity: i64, accounted: i64) -> Self {
        if accounted >= quantity {
            AssignmentStatus::Cleared
        } else if accounted > 0 {
            AssignmentStatus::InProgress
        } else {
            AssignmentStatus::Pending
        }
    }
}

/// A split of returned units: cleared, lost (shortage), damaged (seconds).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnSplit {
    pub cleared: i64,
    pub lost: i64,
    pub damaged: i64,
}

impl ReturnSplit {
    pub const ZERO: ReturnSplit = ReturnSplit {
        cleared: 0,
        lost: 0,
        damaged: 0,
    };

    /// Build a split from reported counts; negatives are rejected.
    pub fn new(cleared: i64, lost: i64, damaged: i64) -> DomainResult<Self> {
        for (name, v) in [("cleared", cleared), ("shortage", lost), ("seconds", damaged)] {
            if v < 0 {
                return Err(DomainError::validation(format!(
                    "{name} cannot be negative, got {v}"
                )));
            }
            if v > MAX_QUANTITY {
                return Err(DomainError::validation(format!(
                    "{name} {v} exceeds the limit of {MAX_QUANTITY}"
                )));
            }
        }
        Ok(Self {
            cleared,
            lost,
            damaged,
        })
    }

    /// Sum of all buckets. Saturates, so an absurd split still fails the
    /// capacity check instead of wrapping.
    pub fn total(&self) -> i64 {
        self.cleared
            .saturating_add(self.lost)
            .saturating_add(self.damaged)
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }

    fn plus(self, other: ReturnSplit) -> ReturnSplit {
        ReturnSplit {
            cleared: self.cleared.saturating_add(other.cleared),
            lost: self.lost.saturating_add(other.lost),
            damaged: self.damaged.saturating_add(other.damaged),
        }
    }
}

/// Advisory lock held by an outstanding return request.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "request_id", rename_all = "snake_case")]
pub enum ReturnLock {
    #[default]
    Free,
    Locked(ReturnRequestId),
}

impl ReturnLock {
    pub fn holder(&self) -> Option<ReturnRequestId> {
        match self {
            ReturnLock::Free => None,
            ReturnLock::Locked(id) => Some(*id),
        }
    }
}

/// Input for creating an assignment from an applied draw plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub id: AssignmentId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub jobworker_id: JobWorkerId,
    pub dispatch_id: DispatchId,
    pub assigned_by: UserId,
    pub quantity: i64,
    pub unit_price: u64,
    pub notes: Option<String>,
    pub source_batches: Vec<Draw>,
    pub from_returned_stock: i64,
    pub created_at: DateTime<Utc>,
}

/// Aggregate root: WorkAssignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkAssignment {
    id: AssignmentId,
    tenant_id: TenantId,
    product_id: ProductId,
    jobworker_id: JobWorkerId,
    dispatch_id: DispatchId,
    assigned_by: UserId,
    quantity: i64,
    unit_price: u64,
    notes: Option<String>,
    source_batches: Vec<Draw>,
    from_returned_stock: i64,
    committed: ReturnSplit,
    pending: ReturnSplit,
    sold_quantity: i64,
    lock: ReturnLock,
    created_at: DateTime<Utc>,
    version: u64,
}

impl WorkAssignment {
    pub fn assign(new: NewAssignment) -> DomainResult<Self> {
        if new.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "assignment quantity must be positive, got {}",
                new.quantity
            )));
        }
        let covered = new
            .source_batches
            .iter()
            .fold(new.from_returned_stock, |acc, d| acc.saturating_add(d.quantity));
        if covered != new.quantity {
            return Err(DomainError::invariant(format!(
                "draw plan covers {covered} of {} units",
                new.quantity
            )));
        }
        Ok(Self {
            id: new.id,
            tenant_id: new.tenant_id,
            product_id: new.product_id,
            jobworker_id: new.jobworker_id,
            dispatch_id: new.dispatch_id,
            assigned_by: new.assigned_by,
            quantity: new.quantity,
            unit_price: new.unit_price,
            notes: new.notes,
            source_batches: new.source_batches,
            from_returned_stock: new.from_returned_stock,
            committed: ReturnSplit::ZERO,
            pending: ReturnSplit::ZERO,
            sold_quantity: 0,
            lock: ReturnLock::Free,
            created_at: new.created_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> AssignmentId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn jobworker_id(&self) -> JobWorkerId {
        self.jobworker_id
    }

    pub fn dispatch_id(&self) -> DispatchId {
        self.dispatch_id
    }

    pub fn assigned_by(&self) -> UserId {
        self.assigned_by
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn source_batches(&self) -> &[Draw] {
        &self.source_batches
    }

    pub fn from_returned_stock(&self) -> i64 {
        self.from_returned_stock
    }

    pub fn committed(&self) -> ReturnSplit {
        self.committed
    }

    pub fn pending(&self) -> ReturnSplit {
        self.pending
    }

    pub fn sold_quantity(&self) -> i64 {
        self.sold_quantity
    }

    pub fn lock(&self) -> ReturnLock {
        self.lock
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Units not yet reported back in any committed bucket.
    pub fn remaining(&self) -> i64 {
        self.quantity - self.committed.total()
    }

    pub fn status(&self) -> AssignmentStatus {
        AssignmentStatus::from_counts(self.quantity, self.committed.total())
    }

    /// Cleared units not yet sold onward.
    pub fn sellable(&self) -> i64 {
        self.committed.cleared - self.sold_quantity
    }

    pub fn ensure_unlocked(&self) -> DomainResult<()> {
        match self.lock {
            ReturnLock::Free => Ok(()),
            ReturnLock::Locked(request) => Err(DomainError::lock_conflict(format!(
                "assignment {} already has return request {request} awaiting review",
                self.id
            ))),
        }
    }

    /// Stage a proposal and take the lock on behalf of `request_id`.
    pub fn stage_return(
        &mut self,
        request_id: ReturnRequestId,
        split: ReturnSplit,
    ) -> DomainResult<()> {
        self.ensure_unlocked()?;
        self.ensure_fits(split, self.remaining())?;
        self.pending = split;
        self.lock = ReturnLock::Locked(request_id);
        self.check_invariants()
    }

    /// Fold the staged proposal into the committed buckets and release the lock.
    ///
    /// Returns the split that was committed.
    pub fn commit_staged(&mut self, request_id: ReturnRequestId) -> DomainResult<ReturnSplit> {
        self.ensure_held_by(request_id)?;
        let staged = self.pending;
        self.committed = self.committed.plus(staged);
        self.pending = ReturnSplit::ZERO;
        self.lock = ReturnLock::Free;
        self.check_invariants()?;
        Ok(staged)
    }

    /// Drop the staged proposal and release the lock.
    pub fn discard_staged(&mut self, request_id: ReturnRequestId) -> DomainResult<()> {
        self.ensure_held_by(request_id)?;
        self.pending = ReturnSplit::ZERO;
        self.lock = ReturnLock::Free;
        Ok(())
    }

    /// Commit a split immediately, bypassing staging.
    ///
    /// Capacity is whatever is unaccounted after reserving `pending_elsewhere`
    /// for outstanding proposals. The lock and any staged deltas are left as
    /// they are.
    pub fn apply_direct(&mut self, split: ReturnSplit, pending_elsewhere: i64) -> DomainResult<()> {
        self.ensure_fits(split, self.remaining().saturating_sub(pending_elsewhere))?;
        self.committed = self.committed.plus(split);
        self.check_invariants()
    }

    /// Consume `quantity` cleared units for an onward sale.
    pub fn record_sale(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::invariant(format!(
                "sale deduction must be positive, got {quantity}"
            )));
        }
        if quantity > self.sellable() {
            return Err(DomainError::insufficient_stock(format!(
                "assignment {} has {} sellable units, {} requested",
                self.id,
                self.sellable(),
                quantity
            )));
        }
        self.sold_quantity += quantity;
        self.check_invariants()
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        let c = self.committed;
        let p = self.pending;
        if [c.cleared, c.lost, c.damaged, p.cleared, p.lost, p.damaged, self.sold_quantity]
            .iter()
            .any(|v| *v < 0)
        {
            return Err(DomainError::invariant(format!(
                "assignment {} has a negative counter",
                self.id
            )));
        }
        if c.total().saturating_add(p.total()) > self.quantity {
            return Err(DomainError::invariant(format!(
                "assignment {}: committed {} + pending {} exceeds quantity {}",
                self.id,
                c.total(),
                p.total(),
                self.quantity
            )));
        }
        if self.sold_quantity > c.cleared {
            return Err(DomainError::invariant(format!(
                "assignment {}: sold {} exceeds cleared {}",
                self.id, self.sold_quantity, c.cleared
            )));
        }
        if self.lock == ReturnLock::Free && !p.is_zero() {
            return Err(DomainError::invariant(format!(
                "assignment {} has staged deltas without a lock",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_fits(&self, split: ReturnSplit, capacity: i64) -> DomainResult<()> {
        if split.cleared < 0 || split.lost < 0 || split.damaged < 0 {
            return Err(DomainError::validation(format!(
                "return buckets cannot be negative, got {split:?}"
            )));
        }
        let total = split.total();
        if total <= 0 {
            return Err(DomainError::over_allocation(
                "a return must account for at least one unit",
            ));
        }
        if total > capacity {
            return Err(DomainError::over_allocation(format!(
                "return of {total} exceeds the {} units still outstanding on assignment {}",
                capacity.max(0),
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_held_by(&self, request_id: ReturnRequestId) -> DomainResult<()> {
        if self.lock != ReturnLock::Locked(request_id) {
            return Err(DomainError::invariant(format!(
                "assignment {} lock is {:?}, not held by request {request_id}",
                self.id, self.lock
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for WorkAssignment {
    type Id = AssignmentId;

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
    use proptest::prelude::*;

    fn assignment(quantity: i64) -> WorkAssignment {
        WorkAssignment::assign(NewAssignment {
            id: AssignmentId::new(),
            tenant_id: TenantId::new(),
            product_id: ProductId::new(),
            jobworker_id: JobWorkerId::new(),
            dispatch_id: DispatchId::new(),
            assigned_by: UserId::new(),
            quantity,
            unit_price: 100,
            notes: None,
            source_batches: vec![],
            from_returned_stock: quantity,
            created_at: Utc::now(),
        })
        .unwrap()
    }

    fn split(c: i64, l: i64, d: i64) -> ReturnSplit {
        ReturnSplit::new(c, l, d).unwrap()
    }

    #[test]
    fn status_follows_committed_total() {
        assert_eq!(AssignmentStatus::from_counts(10, 0), AssignmentStatus::Pending);
        assert_eq!(AssignmentStatus::from_counts(10, 4), AssignmentStatus::InProgress);
        assert_eq!(AssignmentStatus::from_counts(10, 10), AssignmentStatus::Cleared);
    }

    #[test]
    fn staged_return_is_invisible_until_committed() {
        let mut a = assignment(10);
        let req = ReturnRequestId::new();
        a.stage_return(req, split(7, 2, 1)).unwrap();
        assert_eq!(a.status(), AssignmentStatus::Pending);
        assert_eq!(a.remaining(), 10);
        assert_eq!(a.lock(), ReturnLock::Locked(req));

        let committed = a.commit_staged(req).unwrap();
        assert_eq!(committed, split(7, 2, 1));
        assert_eq!(a.status(), AssignmentStatus::Cleared);
        assert_eq!(a.pending(), ReturnSplit::ZERO);
        assert_eq!(a.lock(), ReturnLock::Free);
    }

    #[test]
    fn second_stage_hits_the_lock_before_the_quantity_check() {
        let mut a = assignment(5);
        a.stage_return(ReturnRequestId::new(), split(1, 0, 0)).unwrap();
        let err = a.stage_return(ReturnRequestId::new(), split(100, 0, 0)).unwrap_err();
        match err {
            DomainError::LockConflict(_) => {}
            _ => panic!("expected lock conflict, got: {err:?}"),
        }
    }

    #[test]
    fn over_and_empty_proposals_are_over_allocation() {
        let mut a = assignment(5);
        assert_eq!(
            a.stage_return(ReturnRequestId::new(), split(4, 2, 0)).unwrap_err().code(),
            "over_allocation"
        );
        assert_eq!(
            a.stage_return(ReturnRequestId::new(), ReturnSplit::ZERO).unwrap_err().code(),
            "over_allocation"
        );
        assert_eq!(a.lock(), ReturnLock::Free);
    }

    #[test]
    fn negative_component_is_validation() {
        assert_eq!(ReturnSplit::new(3, -1, 0).unwrap_err().code(), "validation_error");
    }

    #[test]
    fn oversized_split_is_rejected_and_never_wraps() {
        assert_eq!(
            ReturnSplit::new(i64::MAX, i64::MAX, 2).unwrap_err().code(),
            "validation_error"
        );

        // Built directly, the total saturates and the capacity check still holds.
        let huge = ReturnSplit {
            cleared: i64::MAX,
            lost: i64::MAX,
            damaged: 2,
        };
        assert_eq!(huge.total(), i64::MAX);
        let mut a = assignment(5);
        assert_eq!(
            a.stage_return(ReturnRequestId::new(), huge).unwrap_err().code(),
            "over_allocation"
        );
        assert_eq!(a.lock(), ReturnLock::Free);
    }

    #[test]
    fn negative_bucket_built_directly_is_refused_before_any_change() {
        let sneaky = ReturnSplit {
            cleared: -5,
            lost: 8,
            damaged: 0,
        };
        let mut a = assignment(10);
        assert_eq!(
            a.apply_direct(sneaky, 0).unwrap_err().code(),
            "validation_error"
        );
        assert_eq!(a.committed(), ReturnSplit::ZERO);
    }

    #[test]
    fn discard_releases_without_touching_committed() {
        let mut a = assignment(5);
        let req = ReturnRequestId::new();
        a.stage_return(req, split(2, 0, 0)).unwrap();
        a.discard_staged(req).unwrap();
        assert_eq!(a.committed(), ReturnSplit::ZERO);
        assert_eq!(a.lock(), ReturnLock::Free);
        assert!(a.discard_staged(req).is_err());
    }

    #[test]
    fn direct_return_respects_outstanding_proposals() {
        let mut a = assignment(10);
        let req = ReturnRequestId::new();
        a.stage_return(req, split(6, 0, 0)).unwrap();

        let err = a.apply_direct(split(5, 0, 0), a.pending().total()).unwrap_err();
        assert_eq!(err.code(), "over_allocation");

        a.apply_direct(split(3, 1, 0), a.pending().total()).unwrap();
        assert_eq!(a.committed(), split(3, 1, 0));
        assert_eq!(a.lock(), ReturnLock::Locked(req));

        a.commit_staged(req).unwrap();
        assert_eq!(a.committed().total(), 10);
        assert_eq!(a.status(), AssignmentStatus::Cleared);
    }

    #[test]
    fn sales_consume_cleared_units_only() {
        let mut a = assignment(10);
        a.apply_direct(split(4, 6, 0), 0).unwrap();
        assert_eq!(a.sellable(), 4);

        a.record_sale(3).unwrap();
        assert_eq!(a.sellable(), 1);
        assert_eq!(a.quantity(), 10);
        assert_eq!(a.status(), AssignmentStatus::Cleared);

        let err = a.record_sale(2).unwrap_err();
        assert_eq!(err.code(), "insufficient_stock");
    }

    #[test]
    fn assign_rejects_plan_that_does_not_cover_quantity() {
        let err = WorkAssignment::assign(NewAssignment {
            from_returned_stock: 2,
            ..NewAssignment {
                id: AssignmentId::new(),
                tenant_id: TenantId::new(),
                product_id: ProductId::new(),
                jobworker_id: JobWorkerId::new(),
                dispatch_id: DispatchId::new(),
                assigned_by: UserId::new(),
                quantity: 3,
                unit_price: 0,
                notes: None,
                source_batches: vec![],
                from_returned_stock: 0,
                created_at: Utc::now(),
            }
        })
        .unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Submit(i64, i64, i64),
        Approve,
        Reject,
        Direct(i64, i64, i64),
        Sell(i64),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0i64..6, 0i64..6, 0i64..6).prop_map(|(c, l, d)| Op::Submit(c, l, d)),
            Just(Op::Approve),
            Just(Op::Reject),
            (0i64..6, 0i64..6, 0i64..6).prop_map(|(c, l, d)| Op::Direct(c, l, d)),
            (1i64..6).prop_map(Op::Sell),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            .. ProptestConfig::default()
        })]

        #[test]
        fn conservation_holds_under_any_sequence(
            quantity in 1i64..40,
            ops in prop::collection::vec(arb_op(), 0..40),
        ) {
            let mut a = assignment(quantity);
            for op in ops {
                // Failed operations must leave the record untouched.
                let before = a.clone();
                let result = match op {
                    Op::Submit(c, l, d) => a.stage_return(ReturnRequestId::new(), split(c, l, d)),
                    Op::Approve => match a.lock().holder() {
                        Some(req) => a.commit_staged(req).map(|_| ()),
                        None => Ok(()),
                    },
                    Op::Reject => match a.lock().holder() {
                        Some(req) => a.discard_staged(req),
                        None => Ok(()),
                    },
                    Op::Direct(c, l, d) => {
                        let pending = a.pending().total();
                        a.apply_direct(split(c, l, d), pending)
                    }
                    Op::Sell(n) => a.record_sale(n),
                };
                if result.is_err() {
                    prop_assert_eq!(&a, &before);
                }

                prop_assert!(a.committed().total() + a.pending().total() <= a.quantity());
                prop_assert!(a.sold_quantity() <= a.committed().cleared);
                prop_assert_eq!(a.quantity(), quantity);
                prop_assert!(a.check_invariants().is_ok());
                prop_assert_eq!(
                    a.status(),
                    AssignmentStatus::from_counts(a.quantity(), a.committed().total())
                );
            }
        }
    }
}
