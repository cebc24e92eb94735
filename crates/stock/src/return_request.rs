use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobwork_core::{AggregateRoot, DomainError, DomainResult, TenantId, UserId};

use crate::assignment::{AssignmentId, ReturnSplit};

/// Return request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnRequestId(Uuid);

jobwork_core::impl_uuid_newtype!(ReturnRequestId, "ReturnRequestId");

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Reviewer decision on a pending request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl core::str::FromStr for ReviewAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(ReviewAction::Approve),
            "reject" => Ok(ReviewAction::Reject),
            other => Err(DomainError::validation(format!(
                "review action must be 'approve' or 'reject', got '{other}'"
            ))),
        }
    }
}

/// Aggregate root: ReturnRequest. Terminal once reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    id: ReturnRequestId,
    tenant_id: TenantId,
    assignment_id: AssignmentId,
    proposed: ReturnSplit,
    status: ReturnRequestStatus,
    submitted_by: UserId,
    submitted_at: DateTime<Utc>,
    reviewed_by: Option<UserId>,
    reviewed_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    direct: bool,
    version: u64,
}

impl ReturnRequest {
    pub fn submit(
        tenant_id: TenantId,
        id: ReturnRequestId,
        assignment_id: AssignmentId,
        proposed: ReturnSplit,
        submitted_by: UserId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            assignment_id,
            proposed,
            status: ReturnRequestStatus::Pending,
            submitted_by,
            submitted_at: at,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            direct: false,
            version: 0,
        }
    }

    /// After-the-fact record of a direct return: already approved by the
    /// actor who processed it.
    pub fn recorded_direct(
        tenant_id: TenantId,
        id: ReturnRequestId,
        assignment_id: AssignmentId,
        split: ReturnSplit,
        reviewer: UserId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: ReturnRequestStatus::Approved,
            reviewed_by: Some(reviewer),
            reviewed_at: Some(at),
            direct: true,
            ..Self::submit(tenant_id, id, assignment_id, split, reviewer, at)
        }
    }

    pub fn approve(&mut self, reviewer: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = ReturnRequestStatus::Approved;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(at);
        Ok(())
    }

    pub fn reject(
        &mut self,
        reviewer: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_pending()?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "no reason given".to_string());
        self.status = ReturnRequestStatus::Rejected;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(at);
        self.rejection_reason = Some(reason);
        Ok(())
    }

    fn ensure_pending(&self) -> DomainResult<()> {
        if self.status != ReturnRequestStatus::Pending {
            return Err(DomainError::already_reviewed(format!(
                "return request {} is already {:?}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    pub fn id_typed(&self) -> ReturnRequestId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn assignment_id(&self) -> AssignmentId {
        self.assignment_id
    }

    pub fn proposed(&self) -> ReturnSplit {
        self.proposed
    }

    pub fn status(&self) -> ReturnRequestStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReturnRequestStatus::Pending
    }

    pub fn submitted_by(&self) -> UserId {
        self.submitted_by
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn reviewed_by(&self) -> Option<UserId> {
        self.reviewed_by
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn is_direct(&self) -> bool {
        self.direct
    }
}

impl AggregateRoot for ReturnRequest {
    type Id = ReturnRequestId;

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

    fn pending() -> ReturnRequest {
        ReturnRequest::submit(
            TenantId::new(),
            ReturnRequestId::new(),
            AssignmentId::new(),
            ReturnSplit::new(7, 2, 1).unwrap(),
            UserId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn review_is_one_shot() {
        let mut req = pending();
        let reviewer = UserId::new();
        req.approve(reviewer, Utc::now()).unwrap();
        assert_eq!(req.status(), ReturnRequestStatus::Approved);
        assert_eq!(req.reviewed_by(), Some(reviewer));

        let err = req.reject(reviewer, None, Utc::now()).unwrap_err();
        match err {
            DomainError::AlreadyReviewed(msg) if msg.contains("Approved") => {}
            _ => panic!("expected already reviewed, got: {err:?}"),
        }
        assert_eq!(req.approve(reviewer, Utc::now()).unwrap_err().code(), "already_reviewed");
    }

    #[test]
    fn reject_records_reason_with_default() {
        let mut req = pending();
        req.reject(UserId::new(), Some("  wrong count ".into()), Utc::now()).unwrap();
        assert_eq!(req.rejection_reason(), Some("wrong count"));

        let mut req = pending();
        req.reject(UserId::new(), None, Utc::now()).unwrap();
        assert_eq!(req.rejection_reason(), Some("no reason given"));
    }

    #[test]
    fn direct_record_is_born_approved() {
        let reviewer = UserId::new();
        let req = ReturnRequest::recorded_direct(
            TenantId::new(),
            ReturnRequestId::new(),
            AssignmentId::new(),
            ReturnSplit::new(1, 0, 0).unwrap(),
            reviewer,
            Utc::now(),
        );
        assert_eq!(req.status(), ReturnRequestStatus::Approved);
        assert_eq!(req.submitted_by(), reviewer);
        assert!(req.is_direct());
    }

    #[test]
    fn review_action_parses_case_insensitively() {
        assert_eq!("Approve".parse::<ReviewAction>().unwrap(), ReviewAction::Approve);
        assert_eq!("reject".parse::<ReviewAction>().unwrap(), ReviewAction::Reject);
        assert_eq!("maybe".parse::<ReviewAction>().unwrap_err().code(), "validation_error");
    }
}
