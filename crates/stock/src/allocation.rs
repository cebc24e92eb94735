//! FIFO allocation planning.
//!
//! Planning is pure: it looks at a snapshot of batch availability and says
//! which batches to draw from. Applying the plan (batch decrements, registry
//! debit, assignment creation) happens inside one unit of work in the store,
//! which re-plans from fresh reads if the snapshot moved underneath it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobwork_core::{DomainError, DomainResult};

use crate::batch::BatchId;

/// What the planner needs to know about one batch for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAvailability {
    pub batch_id: BatchId,
    /// Challan date; primary FIFO key.
    pub received_at: DateTime<Utc>,
    /// Tie-breaker for batches received on the same date.
    pub created_at: DateTime<Utc>,
    pub remaining: i64,
}

/// One batch draw: `quantity` units taken from `batch_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub batch_id: BatchId,
    pub quantity: i64,
}

/// Result of planning an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawPlan {
    pub requested: i64,
    pub draws: Vec<Draw>,
    /// Units not backed by any batch line (stock credited back by cleared
    /// returns). Covered by the registry alone.
    pub from_returned_stock: i64,
}

impl DrawPlan {
    pub fn from_batches(&self) -> i64 {
        self.draws
            .iter()
            .fold(0i64, |acc, d| acc.saturating_add(d.quantity))
    }
}

/// Plan a FIFO draw of `need` units.
///
/// Batches are taken oldest challan date first (then oldest created, then id,
/// so equal dates still give one deterministic order). Empty batches are
/// skipped. The registry check happens before planning; whatever the batches
/// cannot cover is reported as `from_returned_stock`.
pub fn plan_allocation(batches: &[BatchAvailability], need: i64) -> DomainResult<DrawPlan> {
    if need <= 0 {
        return Err(DomainError::validation(format!(
            "allocation quantity must be positive, got {need}"
        )));
    }

    let mut ordered: Vec<&BatchAvailability> = batches.iter().filter(|b| b.remaining > 0).collect();
    ordered.sort_by_key(|b| (b.received_at, b.created_at, b.batch_id));

    let mut outstanding = need;
    let mut draws = Vec::new();
    for batch in ordered {
        if outstanding == 0 {
            break;
        }
        let take = batch.remaining.min(outstanding);
        draws.push(Draw {
            batch_id: batch.batch_id,
            quantity: take,
        });
        outstanding -= take;
    }

    Ok(DrawPlan {
        requested: need,
        draws,
        from_returned_stock: outstanding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn at(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn batch(day: i64, remaining: i64) -> BatchAvailability {
        BatchAvailability {
            batch_id: BatchId::new(),
            received_at: at(day),
            created_at: at(day),
            remaining,
        }
    }

    #[test]
    fn draws_oldest_batch_first() {
        let older = batch(1, 5);
        let newer = batch(2, 10);
        // Input order must not matter.
        let plan = plan_allocation(&[newer, older], 8).unwrap();
        assert_eq!(
            plan.draws,
            vec![
                Draw { batch_id: older.batch_id, quantity: 5 },
                Draw { batch_id: newer.batch_id, quantity: 3 },
            ]
        );
        assert_eq!(plan.from_returned_stock, 0);
    }

    #[test]
    fn skips_exhausted_batches() {
        let empty = batch(0, 0);
        let full = batch(3, 4);
        let plan = plan_allocation(&[empty, full], 4).unwrap();
        assert_eq!(plan.draws.len(), 1);
        assert_eq!(plan.draws[0].batch_id, full.batch_id);
    }

    #[test]
    fn shortfall_is_reported_as_returned_stock() {
        let plan = plan_allocation(&[batch(1, 3)], 5).unwrap();
        assert_eq!(plan.from_batches(), 3);
        assert_eq!(plan.from_returned_stock, 2);

        let plan = plan_allocation(&[], 2).unwrap();
        assert!(plan.draws.is_empty());
        assert_eq!(plan.from_returned_stock, 2);
    }

    #[test]
    fn non_positive_need_is_a_validation_error() {
        let err = plan_allocation(&[batch(1, 3)], 0).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    fn arb_batches() -> impl Strategy<Value = Vec<(i64, i64)>> {
        prop::collection::vec((0i64..30, 0i64..50), 0..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            .. ProptestConfig::default()
        })]

        #[test]
        fn plan_accounts_for_every_unit(spec in arb_batches(), need in 1i64..400) {
            let batches: Vec<_> = spec.iter().map(|(d, r)| batch(*d, *r)).collect();
            let plan = plan_allocation(&batches, need).unwrap();
            let available: i64 = batches.iter().map(|b| b.remaining).sum();

            prop_assert_eq!(plan.from_batches() + plan.from_returned_stock, need);
            prop_assert_eq!(plan.from_batches(), need.min(available));
            for d in &plan.draws {
                let src = batches.iter().find(|b| b.batch_id == d.batch_id).unwrap();
                prop_assert!(d.quantity > 0 && d.quantity <= src.remaining);
            }
        }

        #[test]
        fn only_the_last_draw_may_be_partial(spec in arb_batches(), need in 1i64..400) {
            let batches: Vec<_> = spec.iter().map(|(d, r)| batch(*d, *r)).collect();
            let plan = plan_allocation(&batches, need).unwrap();
            let n = plan.draws.len();
            for (i, d) in plan.draws.iter().enumerate() {
                let src = batches.iter().find(|b| b.batch_id == d.batch_id).unwrap();
                if i + 1 < n {
                    prop_assert_eq!(d.quantity, src.remaining);
                }
                if i > 0 {
                    let prev_id = plan.draws[i - 1].batch_id;
                    let prev = batches.iter().find(|b| b.batch_id == prev_id).unwrap();
                    prop_assert!(prev.received_at <= src.received_at);
                }
            }
        }
    }
}
