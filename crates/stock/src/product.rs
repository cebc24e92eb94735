use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobwork_core::{AggregateRoot, DomainError, DomainResult, TenantId};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

jobwork_core::impl_uuid_newtype!(ProductId, "ProductId");

/// Largest quantity a single line, item or return bucket may carry.
pub const MAX_QUANTITY: i64 = 1_000_000_000_000;

/// Reject non-positive or oversized quantities on command input.
pub fn check_quantity(what: &str, quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "{what}: quantity must be positive, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(DomainError::validation(format!(
            "{what}: quantity {quantity} exceeds the limit of {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

/// Registry record for a stocked product.
///
/// `total_available_stock` is the registry counter: stock received and not yet
/// handed out to workers, plus stock that came back cleared. It is the gate
/// for every assignment; per-batch remaining quantities only decide *where*
/// the stock is drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    tenant_id: TenantId,
    title: String,
    sku: Option<String>,
    total_available_stock: i64,
    version: u64,
}

impl Product {
    pub fn register(
        tenant_id: TenantId,
        id: ProductId,
        title: impl Into<String>,
        sku: Option<String>,
    ) -> DomainResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("product title cannot be empty"));
        }
        let sku = sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(Self {
            id,
            tenant_id,
            title: title.trim().to_string(),
            sku,
            total_available_stock: 0,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn total_available_stock(&self) -> i64 {
        self.total_available_stock
    }

    /// Fails unless the registry holds at least `quantity` units.
    pub fn ensure_available(&self, quantity: i64) -> DomainResult<()> {
        if quantity > self.total_available_stock {
            return Err(DomainError::insufficient_stock(format!(
                "'{}' has {} available, {} requested",
                self.title, self.total_available_stock, quantity
            )));
        }
        Ok(())
    }

    /// Add stock to the registry (batch receipt, cleared return).
    pub fn credit(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::invariant(format!(
                "registry credit must be positive, got {quantity}"
            )));
        }
        self.total_available_stock = self
            .total_available_stock
            .checked_add(quantity)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "'{}' cannot hold {} more units on top of {}",
                    self.title, quantity, self.total_available_stock
                ))
            })?;
        Ok(())
    }

    /// Remove stock from the registry (assignment to a worker).
    pub fn debit(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::invariant(format!(
                "registry debit must be positive, got {quantity}"
            )));
        }
        self.ensure_available(quantity)?;
        self.total_available_stock -= quantity;
        Ok(())
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

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

    fn product() -> Product {
        Product::register(TenantId::new(), ProductId::new(), "Kurta", None).unwrap()
    }

    #[test]
    fn register_rejects_blank_title() {
        let err = Product::register(TenantId::new(), ProductId::new(), "   ", None).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("title") => {}
            _ => panic!("expected validation error, got: {err:?}"),
        }
    }

    #[test]
    fn new_product_starts_empty() {
        let p = product();
        assert_eq!(p.total_available_stock(), 0);
        assert_eq!(p.version(), 0);
        assert_eq!(p.sku(), None);
    }

    #[test]
    fn debit_past_available_is_insufficient_stock() {
        let mut p = product();
        p.credit(10).unwrap();
        let err = p.debit(11).unwrap_err();
        assert_eq!(err.code(), "insufficient_stock");
        assert_eq!(p.total_available_stock(), 10);

        p.debit(10).unwrap();
        assert_eq!(p.total_available_stock(), 0);
    }

    #[test]
    fn credit_that_would_overflow_is_rejected_untouched() {
        let mut p = product();
        p.credit(i64::MAX).unwrap();
        let err = p.credit(1).unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert_eq!(p.total_available_stock(), i64::MAX);
    }

    #[test]
    fn command_quantities_are_bounded() {
        assert!(check_quantity("line 0", 1).is_ok());
        assert!(check_quantity("line 0", MAX_QUANTITY).is_ok());
        let err = check_quantity("line 0", MAX_QUANTITY + 1).unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert_eq!(check_quantity("line 0", 0).unwrap_err().code(), "validation_error");
    }

    #[test]
    fn non_positive_movements_are_rejected() {
        let mut p = product();
        assert!(p.credit(0).is_err());
        assert!(p.debit(-1).is_err());
    }
}
