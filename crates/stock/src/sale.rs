use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobwork_core::{AggregateRoot, DomainError, DomainResult, TenantId, UserId};

use crate::assignment::AssignmentId;
use crate::product::{ProductId, check_quantity};

/// Sale order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleOrderId(Uuid);

jobwork_core::impl_uuid_newtype!(SaleOrderId, "SaleOrderId");

/// Customer reference. Customers are managed outside the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(Uuid);

jobwork_core::impl_uuid_newtype!(CustomerId, "CustomerId");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    pub discount: u64,
}

/// Command: CreateSaleOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSaleOrder {
    pub tenant_id: TenantId,
    pub order_id: SaleOrderId,
    pub created_by: UserId,
    pub lines: Vec<SaleLine>,
    pub invoice_no: Option<String>,
    pub invoice_date: Option<DateTime<Utc>>,
    pub customer_id: Option<CustomerId>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl CreateSaleOrder {
    pub fn validate(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("a sale order needs at least one line"));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            check_quantity(&format!("line {idx}"), line.quantity)?;
            if line.discount > line.unit_price {
                return Err(DomainError::validation(format!(
                    "line {idx}: discount exceeds unit price"
                )));
            }
        }
        Ok(())
    }
}

/// Sellable stock on one assignment, as seen by the sale planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellableStock {
    pub assignment_id: AssignmentId,
    pub created_at: DateTime<Utc>,
    pub sellable: i64,
}

/// Units of one product taken from one assignment to fulfil a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDeduction {
    pub product_id: ProductId,
    pub assignment_id: AssignmentId,
    pub quantity: i64,
}

/// Plan which assignments a sale line draws from, oldest assignment first.
///
/// Fails with `InsufficientStock` when the cleared-and-unsold total is short;
/// in that case nothing is planned.
pub fn plan_sale_deduction(
    product_id: ProductId,
    stock: &[SellableStock],
    need: i64,
) -> DomainResult<Vec<SaleDeduction>> {
    let mut ordered: Vec<&SellableStock> = stock.iter().filter(|s| s.sellable > 0).collect();
    let available = ordered
        .iter()
        .fold(0i64, |acc, s| acc.saturating_add(s.sellable));
    if available < need {
        return Err(DomainError::insufficient_stock(format!(
            "product {product_id}: {available} cleared units available for sale, {need} requested"
        )));
    }
    ordered.sort_by_key(|s| (s.created_at, s.assignment_id));

    let mut outstanding = need;
    let mut plan = Vec::new();
    for s in ordered {
        if outstanding == 0 {
            break;
        }
        let take = s.sellable.min(outstanding);
        plan.push(SaleDeduction {
            product_id,
            assignment_id: s.assignment_id,
            quantity: take,
        });
        outstanding -= take;
    }
    Ok(plan)
}

/// Aggregate root: SaleOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOrder {
    id: SaleOrderId,
    tenant_id: TenantId,
    created_by: UserId,
    lines: Vec<SaleLine>,
    invoice_no: Option<String>,
    invoice_date: DateTime<Utc>,
    customer_id: Option<CustomerId>,
    notes: Option<String>,
    deductions: Vec<SaleDeduction>,
    created_at: DateTime<Utc>,
    version: u64,
}

impl SaleOrder {
    /// Record a fulfilled order together with the deductions that served it.
    pub fn fulfilled(cmd: &CreateSaleOrder, deductions: Vec<SaleDeduction>) -> DomainResult<Self> {
        cmd.validate()?;
        for line in &cmd.lines {
            let served: i64 = deductions
                .iter()
                .filter(|d| d.product_id == line.product_id)
                .map(|d| d.quantity)
                .sum();
            let ordered: i64 = cmd
                .lines
                .iter()
                .filter(|l| l.product_id == line.product_id)
                .map(|l| l.quantity)
                .sum();
            if served != ordered {
                return Err(DomainError::invariant(format!(
                    "product {}: {served} units deducted for {ordered} ordered",
                    line.product_id
                )));
            }
        }
        Ok(Self {
            id: cmd.order_id,
            tenant_id: cmd.tenant_id,
            created_by: cmd.created_by,
            lines: cmd.lines.clone(),
            invoice_no: cmd.invoice_no.clone(),
            invoice_date: cmd.invoice_date.unwrap_or(cmd.occurred_at),
            customer_id: cmd.customer_id,
            notes: cmd.notes.clone(),
            deductions,
            created_at: cmd.occurred_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> SaleOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn invoice_no(&self) -> Option<&str> {
        self.invoice_no.as_deref()
    }

    pub fn invoice_date(&self) -> DateTime<Utc> {
        self.invoice_date
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn deductions(&self) -> &[SaleDeduction] {
        &self.deductions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Invoice total in minor units: sum of (price - discount) * quantity.
    pub fn total(&self) -> u64 {
        self.lines
            .iter()
            .map(|l| {
                l.unit_price
                    .saturating_sub(l.discount)
                    .saturating_mul(l.quantity.max(0) as u64)
            })
            .fold(0u64, u64::saturating_add)
    }
}

impl AggregateRoot for SaleOrder {
    type Id = SaleOrderId;

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
    use crate::product::MAX_QUANTITY;
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn stock(minute: i64, sellable: i64) -> SellableStock {
        SellableStock {
            assignment_id: AssignmentId::new(),
            created_at: at(minute),
            sellable,
        }
    }

    #[test]
    fn deducts_oldest_assignment_first() {
        let p = ProductId::new();
        let old = stock(0, 3);
        let new = stock(5, 10);
        let plan = plan_sale_deduction(p, &[new, old], 5).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].assignment_id, plan[0].quantity), (old.assignment_id, 3));
        assert_eq!((plan[1].assignment_id, plan[1].quantity), (new.assignment_id, 2));
    }

    #[test]
    fn short_stock_plans_nothing() {
        let lots = [stock(0, 2), stock(1, 0)];
        let err = plan_sale_deduction(ProductId::new(), &lots, 3).unwrap_err();
        match err {
            DomainError::InsufficientStock(msg) if msg.contains("2 cleared units") => {}
            _ => panic!("expected insufficient stock, got: {err:?}"),
        }
    }

    #[test]
    fn order_total_applies_discount() {
        let p = ProductId::new();
        let cmd = CreateSaleOrder {
            tenant_id: TenantId::new(),
            order_id: SaleOrderId::new(),
            created_by: UserId::new(),
            lines: vec![SaleLine {
                product_id: p,
                quantity: 4,
                unit_price: 500,
                discount: 50,
            }],
            invoice_no: Some("INV-7".into()),
            invoice_date: None,
            customer_id: None,
            notes: None,
            occurred_at: at(0),
        };
        let deductions = vec![SaleDeduction {
            product_id: p,
            assignment_id: AssignmentId::new(),
            quantity: 4,
        }];
        let order = SaleOrder::fulfilled(&cmd, deductions).unwrap();
        assert_eq!(order.total(), 1800);
        assert_eq!(order.invoice_date(), at(0));

        let err = SaleOrder::fulfilled(&cmd, vec![]).unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
    }

    #[test]
    fn order_total_saturates_instead_of_overflowing() {
        let p = ProductId::new();
        let cmd = CreateSaleOrder {
            tenant_id: TenantId::new(),
            order_id: SaleOrderId::new(),
            created_by: UserId::new(),
            lines: vec![SaleLine {
                product_id: p,
                quantity: MAX_QUANTITY,
                unit_price: u64::MAX,
                discount: 0,
            }],
            invoice_no: None,
            invoice_date: None,
            customer_id: None,
            notes: None,
            occurred_at: at(0),
        };
        let deductions = vec![SaleDeduction {
            product_id: p,
            assignment_id: AssignmentId::new(),
            quantity: MAX_QUANTITY,
        }];
        let order = SaleOrder::fulfilled(&cmd, deductions).unwrap();
        assert_eq!(order.total(), u64::MAX);
    }

    #[test]
    fn sellable_sum_saturates() {
        let stock = [stock(0, i64::MAX), stock(1, i64::MAX)];
        let plan = plan_sale_deduction(ProductId::new(), &stock, 5).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].quantity, 5);
    }

    #[test]
    fn oversized_line_is_validation() {
        let cmd = CreateSaleOrder {
            tenant_id: TenantId::new(),
            order_id: SaleOrderId::new(),
            created_by: UserId::new(),
            lines: vec![SaleLine {
                product_id: ProductId::new(),
                quantity: MAX_QUANTITY + 1,
                unit_price: 1,
                discount: 0,
            }],
            invoice_no: None,
            invoice_date: None,
            customer_id: None,
            notes: None,
            occurred_at: at(0),
        };
        assert_eq!(cmd.validate().unwrap_err().code(), "validation_error");
    }
}
