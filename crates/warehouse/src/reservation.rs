//! Reservation batch checks (pure decision logic).
//!
//! The ledger reads every lot touched by a batch, runs `plan_reservation`
//! over that snapshot and only writes when the whole batch passes. Nothing in
//! here mutates a lot.

use std::collections::HashMap;

use thiserror::Error;

use depot_core::{DomainError, DomainResult, ExternalOrderId, LotId, OrderId};

use crate::allocation::Allocation;
use crate::lot::{LotState, WarehouseLot};

/// A lot invariant that would be broken by the batch.
///
/// Each variant tells the caller which remedy applies: pick another lot
/// (`AlreadyReserved`, `AlreadySold`) or reduce the quantity
/// (`InsufficientQuantity`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationConflict {
    #[error("lot {lot_id} is already reserved for order {order_id}")]
    AlreadyReserved { lot_id: LotId, order_id: OrderId },

    #[error("lot {lot_id} was already sold in order {external_order_id}")]
    AlreadySold {
        lot_id: LotId,
        external_order_id: ExternalOrderId,
    },

    #[error("lot {lot_id} holds {available} units but {requested} were requested")]
    InsufficientQuantity {
        lot_id: LotId,
        requested: u32,
        available: u32,
    },
}

impl ReservationConflict {
    pub fn lot_id(&self) -> &LotId {
        match self {
            ReservationConflict::AlreadyReserved { lot_id, .. }
            | ReservationConflict::AlreadySold { lot_id, .. }
            | ReservationConflict::InsufficientQuantity { lot_id, .. } => lot_id,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Conflict(#[from] ReservationConflict),
}

/// One lot the batch will tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLot {
    pub lot_id: LotId,
    /// Sum of every allocation in the batch drawn from this lot.
    pub quantity: u32,
    /// Already reserved for the same order (idempotent re-reserve).
    pub already_held: bool,
}

/// A batch that passed every check, in first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationPlan {
    pub order_id: OrderId,
    pub lots: Vec<PlannedLot>,
}

impl ReservationPlan {
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }
}

/// Input-shape checks that need no lot data.
pub fn validate_allocations(allocations: &[Allocation]) -> DomainResult<()> {
    for allocation in allocations {
        if allocation.quantity == 0 {
            return Err(DomainError::validation(format!(
                "allocation quantity for lot {} must be positive",
                allocation.lot_id
            )));
        }
    }
    Ok(())
}

/// Collapse repeated lot ids, keeping first-appearance order.
fn summed_by_lot(allocations: &[Allocation]) -> DomainResult<Vec<(LotId, u32)>> {
    let mut order: Vec<(LotId, u32)> = Vec::with_capacity(allocations.len());
    let mut index: HashMap<&LotId, usize> = HashMap::new();

    for allocation in allocations {
        match index.get(&allocation.lot_id) {
            Some(&i) => {
                let entry = &mut order[i];
                entry.1 = entry.1.checked_add(allocation.quantity).ok_or_else(|| {
                    let lot_id = &allocation.lot_id;
                    DomainError::validation(format!("quantity overflow for lot {lot_id}"))
                })?;
            }
            None => {
                index.insert(&allocation.lot_id, order.len());
                order.push((allocation.lot_id.clone(), allocation.quantity));
            }
        }
    }

    Ok(order)
}

/// Check a whole batch against a snapshot of the lots it touches.
///
/// The first failing lot (in batch order) decides the error; on success every
/// lot in the plan may be tagged `Reserved(order_id)`.
pub fn plan_reservation(
    order_id: &OrderId,
    allocations: &[Allocation],
    lots: &HashMap<LotId, WarehouseLot>,
) -> Result<ReservationPlan, ReservationError> {
    validate_allocations(allocations)?;

    let mut planned = Vec::new();
    for (lot_id, quantity) in summed_by_lot(allocations)? {
        let lot = lots
            .get(&lot_id)
            .ok_or_else(|| DomainError::validation(format!("unknown lot id {lot_id}")))?;

        let already_held = match lot.state() {
            LotState::Available => false,
            LotState::Reserved { order_id: holder } if holder == order_id => true,
            LotState::Reserved { order_id: holder } => {
                return Err(ReservationConflict::AlreadyReserved {
                    lot_id,
                    order_id: holder.clone(),
                }
                .into());
            }
            LotState::Sold { external_order_id } => {
                return Err(ReservationConflict::AlreadySold {
                    lot_id,
                    external_order_id: external_order_id.clone(),
                }
                .into());
            }
        };

        if lot.quantity() < quantity {
            return Err(ReservationConflict::InsufficientQuantity {
                lot_id,
                requested: quantity,
                available: lot.quantity(),
            }
            .into());
        }

        planned.push(PlannedLot {
            lot_id,
            quantity,
            already_held,
        });
    }

    Ok(ReservationPlan {
        order_id: order_id.clone(),
        lots: planned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::lot::LotAudit;

    fn lot(id: &str, quantity: u32) -> WarehouseLot {
        let id = LotId::new(id).unwrap();
        WarehouseLot::new(id, "H129FSQ.104.023", "", "BOX-A", quantity, Utc::now()).unwrap()
    }

    fn order(id: &str) -> OrderId {
        OrderId::new(id).unwrap()
    }

    fn snapshot(lots: Vec<WarehouseLot>) -> HashMap<LotId, WarehouseLot> {
        lots.into_iter().map(|l| (l.id_typed().clone(), l)).collect()
    }

    #[test]
    fn available_lots_are_planned_in_batch_order() {
        let a = lot("A", 10);
        let b = lot("B", 4);
        let allocations = vec![Allocation::from_lot(&b, 4), Allocation::from_lot(&a, 3)];

        let plan =
            plan_reservation(&order("order-1"), &allocations, &snapshot(vec![a, b])).unwrap();
        let ids: Vec<&str> = plan.lots.iter().map(|p| p.lot_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert!(plan.lots.iter().all(|p| !p.already_held));
    }

    #[test]
    fn zero_quantity_is_a_validation_error() {
        let a = lot("A", 10);
        let allocations = vec![Allocation::from_lot(&a, 0)];
        let err = plan_reservation(&order("o"), &allocations, &snapshot(vec![a])).unwrap_err();
        assert!(matches!(err, ReservationError::Validation(DomainError::Validation(_))));
    }

    #[test]
    fn unknown_lot_is_a_validation_error() {
        let a = lot("A", 10);
        let allocations = vec![Allocation::from_lot(&a, 1)];
        let err = plan_reservation(&order("o"), &allocations, &HashMap::new()).unwrap_err();
        match err {
            ReservationError::Validation(DomainError::Validation(msg)) => {
                assert!(msg.contains("A"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn reserved_for_other_order_conflicts_with_holder() {
        let mut a = lot("A", 20);
        a.reserve(&order("order-1"), LotAudit::new("Rossi"), Utc::now()).unwrap();
        let allocations = vec![Allocation::from_lot(&a, 1)];

        let err =
            plan_reservation(&order("order-2"), &allocations, &snapshot(vec![a])).unwrap_err();
        assert_eq!(
            err,
            ReservationError::Conflict(ReservationConflict::AlreadyReserved {
                lot_id: LotId::new("A").unwrap(),
                order_id: order("order-1"),
            })
        );
    }

    #[test]
    fn reserved_for_same_order_is_idempotent() {
        let mut a = lot("A", 20);
        a.reserve(&order("order-1"), LotAudit::new("Rossi"), Utc::now()).unwrap();
        let allocations = vec![Allocation::from_lot(&a, 5)];

        let plan = plan_reservation(&order("order-1"), &allocations, &snapshot(vec![a])).unwrap();
        assert!(plan.lots[0].already_held);
    }

    #[test]
    fn sold_lot_conflicts_with_external_order() {
        let mut a = lot("A", 2);
        a.reserve(&order("order-1"), LotAudit::new("Rossi"), Utc::now()).unwrap();
        a.mark_sold(&ExternalOrderId::new("EXT-7").unwrap(), None, Utc::now()).unwrap();
        let allocations = vec![Allocation::from_lot(&a, 1)];

        let err =
            plan_reservation(&order("order-2"), &allocations, &snapshot(vec![a])).unwrap_err();
        assert!(matches!(
            err,
            ReservationError::Conflict(ReservationConflict::AlreadySold {
                ref external_order_id,
                ..
            }) if external_order_id.as_str() == "EXT-7"
        ));
    }

    #[test]
    fn repeated_lot_quantities_are_summed() {
        let a = lot("A", 5);
        let allocations = vec![Allocation::from_lot(&a, 3), Allocation::from_lot(&a, 3)];

        let err = plan_reservation(&order("o"), &allocations, &snapshot(vec![a])).unwrap_err();
        assert_eq!(
            err,
            ReservationError::Conflict(ReservationConflict::InsufficientQuantity {
                lot_id: LotId::new("A").unwrap(),
                requested: 6,
                available: 5,
            })
        );
    }

    #[test]
    fn first_failing_lot_decides_the_error() {
        let ok = lot("OK", 10);
        let small = lot("SMALL", 1);
        let mut taken = lot("TAKEN", 10);
        taken.reserve(&order("other"), LotAudit::new("X"), Utc::now()).unwrap();

        let allocations = vec![
            Allocation::from_lot(&ok, 2),
            Allocation::from_lot(&small, 2),
            Allocation::from_lot(&taken, 1),
        ];
        let lots = snapshot(vec![ok, small, taken]);
        let err = plan_reservation(&order("o"), &allocations, &lots).unwrap_err();
        match err {
            ReservationError::Conflict(c) => assert_eq!(c.lot_id().as_str(), "SMALL"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn empty_batch_yields_empty_plan() {
        let plan = plan_reservation(&order("o"), &[], &HashMap::new()).unwrap();
        assert!(plan.is_empty());
    }
}
