use jobwork_core::{TenantId, UserId};

/// Tenant context for a request.
///
/// Immutable, and present on every ledger route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// The user performing the request, as asserted by the upstream auth layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: UserId,
}

impl ActorContext {
    pub fn new(actor_id: UserId) -> Self {
        Self { actor_id }
    }

    pub fn actor_id(&self) -> UserId {
        self.actor_id
    }
}
