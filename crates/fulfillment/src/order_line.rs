//! Order-line resolution: warehouse sub-lines + packaged remainder, priced.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use depot_core::{DomainError, LotId, VariantId};
use depot_warehouse::{Allocation, ArticleCode, normalize_code};

use crate::allocation::{FulfillmentMode, compute_allocation};
use crate::packaging::{PackagingCalculator, PackagingError};
use crate::pricing::{PriceLookup, VatPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub article_code: String,
    pub requested_quantity: u32,
}

impl OrderLineRequest {
    pub fn new(article_code: impl Into<String>, requested_quantity: u32) -> Self {
        Self {
            article_code: article_code.into(),
            requested_quantity,
        }
    }

    /// Family handed to the packaging calculator (`FIGURA.GAMBO`).
    pub fn article_family(&self) -> String {
        ArticleCode::parse(&self.article_code)
            .map(|code| code.family())
            .unwrap_or_else(|| normalize_code(&self.article_code))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SubLineSource {
    Warehouse { lot_id: LotId, box_label: String },
    Package { package_size: u32, package_count: u32 },
}

/// One independently priced row of a resolved order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub source: SubLineSource,
    /// Smallest currency unit; `None` when the price list has no entry.
    pub unit_price: Option<u64>,
    pub vat_rate: u32,
}

/// Non-fatal issues attached to a successful line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FulfillmentWarning {
    /// The remainder could not be packaged; only warehouse stock is used.
    PackagingDegraded {
        requested: u32,
        covered: u32,
        reason: String,
    },
    /// At least one sub-line had no recognisable VAT rate.
    VatRateAssumed { rate: u32 },
    PriceUnavailable { variant_id: VariantId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOrderLine {
    pub requested_quantity: u32,
    pub warehouse_quantity: u32,
    pub packaged_quantity: u32,
    pub mode: FulfillmentMode,
    pub sub_lines: Vec<SubLine>,
    pub warnings: Vec<FulfillmentWarning>,
}

impl ResolvedOrderLine {
    /// Units actually on the line (after any degradation).
    pub fn fulfilled_quantity(&self) -> u32 {
        self.warehouse_quantity + self.packaged_quantity
    }

    pub fn is_degraded(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, FulfillmentWarning::PackagingDegraded { .. }))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderLineError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// Nothing from the warehouse and the calculator could not package the request.
    #[error("order line cannot be fulfilled: {0}")]
    Packaging(#[from] PackagingError),
}

/// Resolve a line: allocate, package the remainder, price every sub-line.
///
/// When packaging fails and some stock is allocated, the line degrades to the
/// warehouse quantity and carries a `PackagingDegraded` warning.
pub fn resolve_order_line(
    request: &OrderLineRequest,
    allocations: &[Allocation],
    calculator: &dyn PackagingCalculator,
    prices: &dyn PriceLookup,
    vat: &VatPolicy,
) -> Result<ResolvedOrderLine, OrderLineError> {
    let summary = compute_allocation(request.requested_quantity, allocations)?;
    let mut warnings = Vec::new();
    let mut sub_lines = Vec::new();

    // Warehouse sub-lines, clamped to the requested quantity in allocation order.
    let mut left = summary.warehouse_quantity;
    for allocation in allocations {
        if left == 0 {
            break;
        }
        let quantity = allocation.quantity.min(left);
        left -= quantity;
        sub_lines.push((
            VariantId::new(allocation.article_code.clone())?,
            quantity,
            SubLineSource::Warehouse {
                lot_id: allocation.lot_id.clone(),
                box_label: allocation.box_label.clone(),
            },
        ));
    }

    let mut mode = summary.mode;
    let mut packaged_quantity = 0;
    if summary.remainder > 0 {
        match calculator.calculate(&request.article_family(), summary.remainder) {
            Ok(breakdown) => {
                packaged_quantity = summary.remainder;
                for entry in breakdown.entries {
                    sub_lines.push((
                        entry.variant_id,
                        entry.total_pieces,
                        SubLineSource::Package {
                            package_size: entry.package_size,
                            package_count: entry.package_count,
                        },
                    ));
                }
            }
            Err(err) if summary.warehouse_quantity == 0 => return Err(err.into()),
            Err(err) => {
                mode = FulfillmentMode::FullyFromWarehouse;
                warnings.push(FulfillmentWarning::PackagingDegraded {
                    requested: summary.requested_quantity,
                    covered: summary.warehouse_quantity,
                    reason: err.to_string(),
                });
            }
        }
    }

    let mut vat_assumed = None;
    let mut missing_prices = BTreeSet::new();
    let sub_lines = sub_lines
        .into_iter()
        .map(|(variant_id, quantity, source)| {
            let unit_price = prices.price(&variant_id);
            if unit_price.is_none() {
                missing_prices.insert(variant_id.clone());
            }
            let resolution = vat.snap(prices.vat_rate(&variant_id));
            if resolution.assumed {
                vat_assumed = Some(resolution.rate);
            }
            SubLine {
                variant_id,
                quantity,
                source,
                unit_price,
                vat_rate: resolution.rate,
            }
        })
        .collect();

    if let Some(rate) = vat_assumed {
        warnings.push(FulfillmentWarning::VatRateAssumed { rate });
    }
    warnings.extend(
        missing_prices
            .into_iter()
            .map(|variant_id| FulfillmentWarning::PriceUnavailable { variant_id }),
    );

    Ok(ResolvedOrderLine {
        requested_quantity: summary.requested_quantity,
        warehouse_quantity: summary.warehouse_quantity,
        packaged_quantity,
        mode,
        sub_lines,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use chrono::Utc;
    use depot_warehouse::WarehouseLot;

    use crate::packaging::{PackageVariant, PackagingBreakdown, VariantPackagingCalculator};
    use crate::pricing::InMemoryPriceList;

    /// Records every invocation before delegating.
    struct RecordingCalculator<C> {
        inner: C,
        calls: RefCell<Vec<(String, u32)>>,
    }

    impl<C: PackagingCalculator> RecordingCalculator<C> {
        fn new(inner: C) -> Self {
            Self {
                inner,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, u32)> {
            self.calls.borrow().clone()
        }
    }

    impl<C: PackagingCalculator> PackagingCalculator for RecordingCalculator<C> {
        fn calculate(
            &self,
            family: &str,
            quantity: u32,
        ) -> Result<PackagingBreakdown, PackagingError> {
            self.calls.borrow_mut().push((family.to_string(), quantity));
            self.inner.calculate(family, quantity)
        }
    }

    fn variant(id: &str) -> VariantId {
        VariantId::new(id).unwrap()
    }

    fn calculator(sizes: &[u32]) -> RecordingCalculator<VariantPackagingCalculator> {
        let variants = sizes
            .iter()
            .map(|s| PackageVariant {
                variant_id: variant(&format!("H129FSQ.104.{s:03}")),
                package_size: *s,
            })
            .collect();
        RecordingCalculator::new(
            VariantPackagingCalculator::new().with_family("H129FSQ.104", variants),
        )
    }

    fn prices() -> InMemoryPriceList {
        InMemoryPriceList::new()
            .with_price(variant("H129FSQ.104.023"), 900, Some(22.0))
            .with_price(variant("H129FSQ.104.002"), 1500, Some(22.0))
            .with_price(variant("H129FSQ.104.001"), 800, Some(22.0))
    }

    fn lot(id: &str, quantity: u32) -> WarehouseLot {
        WarehouseLot::new(
            LotId::new(id).unwrap(),
            "H129FSQ.104.023",
            "fresa",
            "BOX-A",
            quantity,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn partial_line_packages_the_remainder() {
        let calc = calculator(&[1, 2]);
        let request = OrderLineRequest::new("H129FSQ.104.023", 10);
        let allocations = vec![Allocation::from_lot(&lot("L1", 8), 6)];

        let line = resolve_order_line(
            &request,
            &allocations,
            &calc,
            &prices(),
            &VatPolicy::default(),
        )
        .unwrap();

        assert_eq!(calc.calls(), vec![("H129FSQ.104".to_string(), 4)]);
        assert_eq!(line.mode, FulfillmentMode::PartiallyFromWarehouse);
        assert_eq!(line.warehouse_quantity, 6);
        assert_eq!(line.packaged_quantity, 4);
        assert_eq!(line.sub_lines.len(), 2);
        assert_eq!(
            line.sub_lines[1].source,
            SubLineSource::Package {
                package_size: 2,
                package_count: 2
            }
        );
        assert!(line.warnings.is_empty());
    }

    #[test]
    fn fully_covered_line_skips_the_calculator() {
        let calc = calculator(&[1, 2]);
        let request = OrderLineRequest::new("H129FSQ.104.023", 5);
        let allocations = vec![Allocation::from_lot(&lot("L1", 5), 5)];

        let line = resolve_order_line(
            &request,
            &allocations,
            &calc,
            &prices(),
            &VatPolicy::default(),
        )
        .unwrap();

        assert!(calc.calls().is_empty());
        assert_eq!(line.mode, FulfillmentMode::FullyFromWarehouse);
        assert_eq!(line.sub_lines.len(), 1);
        assert_eq!(line.sub_lines[0].unit_price, Some(900));
        assert_eq!(line.sub_lines[0].vat_rate, 22);
    }

    #[test]
    fn packaging_failure_without_stock_fails_the_line() {
        let calc = calculator(&[5]);
        let request = OrderLineRequest::new("H129FSQ.104.023", 3);

        let err = resolve_order_line(&request, &[], &calc, &prices(), &VatPolicy::default())
            .unwrap_err();
        assert!(matches!(
            err,
            OrderLineError::Packaging(PackagingError::NoExactCombination { .. })
        ));
    }

    #[test]
    fn packaging_failure_with_stock_degrades_with_warning() {
        let calc = calculator(&[5]);
        let request = OrderLineRequest::new("H129FSQ.104.023", 10);
        let allocations = vec![Allocation::from_lot(&lot("L1", 8), 7)];

        let line = resolve_order_line(
            &request,
            &allocations,
            &calc,
            &prices(),
            &VatPolicy::default(),
        )
        .unwrap();

        assert_eq!(line.mode, FulfillmentMode::FullyFromWarehouse);
        assert_eq!(line.fulfilled_quantity(), 7);
        assert!(line.is_degraded());
        assert!(matches!(
            line.warnings[0],
            FulfillmentWarning::PackagingDegraded { requested: 10, covered: 7, .. }
        ));
    }

    #[test]
    fn assumed_vat_is_reported_once_per_line() {
        let calc = calculator(&[1, 2]);
        let prices = InMemoryPriceList::new()
            .with_price(variant("H129FSQ.104.023"), 900, None)
            .with_price(variant("H129FSQ.104.002"), 1500, Some(13.0))
            .with_price(variant("H129FSQ.104.001"), 800, None);
        let request = OrderLineRequest::new("H129FSQ.104.023", 9);
        let allocations = vec![Allocation::from_lot(&lot("L1", 8), 4)];

        let line = resolve_order_line(
            &request,
            &allocations,
            &calc,
            &prices,
            &VatPolicy::default(),
        )
        .unwrap();

        assert_eq!(line.sub_lines.len(), 3);
        let vat_warnings = line
            .warnings
            .iter()
            .filter(|w| matches!(w, FulfillmentWarning::VatRateAssumed { .. }))
            .count();
        assert_eq!(vat_warnings, 1);
    }

    #[test]
    fn missing_prices_are_flagged_per_variant() {
        let calc = calculator(&[1, 2]);
        let request = OrderLineRequest::new("H129FSQ.104.023", 3);
        let allocations = vec![
            Allocation::from_lot(&lot("L1", 1), 1),
            Allocation::from_lot(&lot("L2", 1), 1),
        ];

        let line = resolve_order_line(
            &request,
            &allocations,
            &calc,
            &InMemoryPriceList::new(),
            &VatPolicy::default(),
        )
        .unwrap();

        let missing: Vec<&str> = line
            .warnings
            .iter()
            .filter_map(|w| match w {
                FulfillmentWarning::PriceUnavailable { variant_id } => Some(variant_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(missing, vec!["H129FSQ.104.001", "H129FSQ.104.023"]);
    }

    #[test]
    fn over_allocation_is_trimmed_on_sub_lines() {
        let calc = calculator(&[1]);
        let request = OrderLineRequest::new("H129FSQ.104.023", 4);
        let allocations = vec![
            Allocation::from_lot(&lot("L1", 3), 3),
            Allocation::from_lot(&lot("L2", 3), 3),
        ];

        let line = resolve_order_line(
            &request,
            &allocations,
            &calc,
            &prices(),
            &VatPolicy::default(),
        )
        .unwrap();
        let quantities: Vec<u32> = line.sub_lines.iter().map(|s| s.quantity).collect();
        assert_eq!(quantities, vec![3, 1]);
    }
}
