use serde::{Deserialize, Serialize};

use depot_core::{DomainError, DomainResult};
use depot_warehouse::Allocation;

/// How a line's requested quantity is covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMode {
    FullyFromWarehouse,
    PartiallyFromWarehouse,
    NoneFromWarehouse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub requested_quantity: u32,
    pub warehouse_quantity: u32,
    pub remainder: u32,
    pub mode: FulfillmentMode,
}

/// Split `requested` into warehouse-covered units and a remainder to package.
///
/// The warehouse share is clamped to `requested`: over-allocating never
/// produces a negative remainder.
pub fn compute_allocation(
    requested: u32,
    allocations: &[Allocation],
) -> DomainResult<AllocationSummary> {
    if requested == 0 {
        return Err(DomainError::validation("requested quantity must be positive"));
    }

    let mut covered: u64 = 0;
    for allocation in allocations {
        if allocation.quantity == 0 {
            return Err(DomainError::validation(format!(
                "allocation quantity for lot {} must be positive",
                allocation.lot_id
            )));
        }
        if allocation.quantity > allocation.lot_quantity {
            return Err(DomainError::validation(format!(
                "allocation of {} exceeds the {} units in lot {}",
                allocation.quantity, allocation.lot_quantity, allocation.lot_id
            )));
        }
        covered += u64::from(allocation.quantity);
    }

    let warehouse_quantity = covered.min(u64::from(requested)) as u32;
    let remainder = requested - warehouse_quantity;
    let mode = if remainder == 0 {
        FulfillmentMode::FullyFromWarehouse
    } else if warehouse_quantity == 0 {
        FulfillmentMode::NoneFromWarehouse
    } else {
        FulfillmentMode::PartiallyFromWarehouse
    };

    Ok(AllocationSummary {
        requested_quantity: requested,
        warehouse_quantity,
        remainder,
        mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::LotId;

    fn allocation(lot: &str, quantity: u32, lot_quantity: u32) -> Allocation {
        Allocation {
            lot_id: LotId::new(lot).unwrap(),
            article_code: "H129FSQ.104.023".to_string(),
            box_label: "BOX-A".to_string(),
            quantity,
            lot_quantity,
        }
    }

    #[test]
    fn partial_allocation_leaves_remainder() {
        let summary = compute_allocation(10, &[allocation("L1", 6, 8)]).unwrap();
        assert_eq!(summary.mode, FulfillmentMode::PartiallyFromWarehouse);
        assert_eq!(summary.warehouse_quantity, 6);
        assert_eq!(summary.remainder, 4);
    }

    #[test]
    fn exact_allocation_is_fully_from_warehouse() {
        let summary = compute_allocation(5, &[allocation("L1", 5, 5)]).unwrap();
        assert_eq!(summary.mode, FulfillmentMode::FullyFromWarehouse);
        assert_eq!(summary.remainder, 0);
    }

    #[test]
    fn no_allocations_is_none_from_warehouse() {
        let summary = compute_allocation(3, &[]).unwrap();
        assert_eq!(summary.mode, FulfillmentMode::NoneFromWarehouse);
        assert_eq!(summary.remainder, 3);
    }

    #[test]
    fn over_allocation_is_clamped() {
        let summary =
            compute_allocation(4, &[allocation("L1", 3, 3), allocation("L2", 3, 9)]).unwrap();
        assert_eq!(summary.warehouse_quantity, 4);
        assert_eq!(summary.remainder, 0);
        assert_eq!(summary.mode, FulfillmentMode::FullyFromWarehouse);
    }

    #[test]
    fn invalid_quantities_are_rejected() {
        assert!(matches!(compute_allocation(0, &[]), Err(DomainError::Validation(_))));
        assert!(matches!(
            compute_allocation(5, &[allocation("L1", 0, 5)]),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            compute_allocation(5, &[allocation("L1", 6, 5)]),
            Err(DomainError::Validation(_))
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: warehouse + remainder always equals the request and
            /// the mode agrees with the split.
            #[test]
            fn split_is_conserved(
                requested in 1u32..10_000,
                quantities in prop::collection::vec(1u32..500, 0..8),
            ) {
                let allocations: Vec<Allocation> = quantities
                    .iter()
                    .enumerate()
                    .map(|(i, q)| allocation(&format!("L{i}"), *q, *q))
                    .collect();

                let summary = compute_allocation(requested, &allocations).unwrap();
                prop_assert_eq!(summary.warehouse_quantity + summary.remainder, requested);
                prop_assert!(summary.warehouse_quantity <= requested);

                let expected_mode = match (summary.warehouse_quantity, summary.remainder) {
                    (_, 0) => FulfillmentMode::FullyFromWarehouse,
                    (0, _) => FulfillmentMode::NoneFromWarehouse,
                    _ => FulfillmentMode::PartiallyFromWarehouse,
                };
                prop_assert_eq!(summary.mode, expected_mode);
            }
        }
    }
}
