//! Price and VAT lookup boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use depot_core::VariantId;

/// External price list.
pub trait PriceLookup {
    /// Unit price in the smallest currency unit (e.g., cents).
    fn price(&self, variant_id: &VariantId) -> Option<u64>;

    /// Raw VAT percentage as stored upstream (may be imprecise, e.g. `21.99`).
    fn vat_rate(&self, variant_id: &VariantId) -> Option<f64>;
}

/// Snapping rules for VAT rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatPolicy {
    /// Valid rates in whole percent.
    pub valid_rates: Vec<u32>,
    /// Maximum distance (percentage points) from a valid rate.
    pub tolerance: f64,
    /// Rate assumed when the upstream value is missing or unrecognised.
    pub default_rate: u32,
}

impl Default for VatPolicy {
    fn default() -> Self {
        Self {
            valid_rates: vec![0, 4, 5, 10, 22],
            tolerance: 0.5,
            default_rate: 22,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatResolution {
    pub rate: u32,
    /// The default rate was assumed; callers must surface a warning.
    pub assumed: bool,
}

impl VatPolicy {
    pub fn with_default_rate(mut self, rate: u32) -> Self {
        self.default_rate = rate;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Snap `raw` to the nearest valid rate within tolerance.
    pub fn snap(&self, raw: Option<f64>) -> VatResolution {
        let nearest = raw.filter(|r| r.is_finite()).and_then(|raw| {
            self.valid_rates
                .iter()
                .map(|&rate| (rate, (f64::from(rate) - raw).abs()))
                .filter(|(_, distance)| *distance <= self.tolerance)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(rate, _)| rate)
        });

        match nearest {
            Some(rate) => VatResolution { rate, assumed: false },
            None => VatResolution {
                rate: self.default_rate,
                assumed: true,
            },
        }
    }
}

/// In-memory price list for tests/dev.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceList {
    prices: HashMap<VariantId, u64>,
    vat: HashMap<VariantId, f64>,
}

impl InMemoryPriceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, variant_id: VariantId, price: u64, vat_rate: Option<f64>) -> Self {
        if let Some(rate) = vat_rate {
            self.vat.insert(variant_id.clone(), rate);
        }
        self.prices.insert(variant_id, price);
        self
    }
}

impl PriceLookup for InMemoryPriceList {
    fn price(&self, variant_id: &VariantId) -> Option<u64> {
        self.prices.get(variant_id).copied()
    }

    fn vat_rate(&self, variant_id: &VariantId) -> Option<f64> {
        self.vat.get(variant_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_to_nearest_rate_within_tolerance() {
        let policy = VatPolicy::default();
        assert_eq!(policy.snap(Some(21.99)), VatResolution { rate: 22, assumed: false });
        assert_eq!(policy.snap(Some(4.4)), VatResolution { rate: 4, assumed: false });
        assert_eq!(policy.snap(Some(4.6)), VatResolution { rate: 5, assumed: false });
        assert_eq!(policy.snap(Some(0.0)), VatResolution { rate: 0, assumed: false });
    }

    #[test]
    fn unknown_or_missing_rate_assumes_default() {
        let policy = VatPolicy::default();
        assert_eq!(policy.snap(Some(17.0)), VatResolution { rate: 22, assumed: true });
        assert_eq!(policy.snap(None), VatResolution { rate: 22, assumed: true });
        assert_eq!(policy.snap(Some(f64::NAN)), VatResolution { rate: 22, assumed: true });
    }

    #[test]
    fn default_rate_is_configurable() {
        let policy = VatPolicy::default().with_default_rate(10).with_tolerance(0.1);
        assert_eq!(policy.snap(Some(21.8)), VatResolution { rate: 10, assumed: true });
    }

    #[test]
    fn price_list_returns_registered_values() {
        let v = VariantId::new("V1").unwrap();
        let list = InMemoryPriceList::new().with_price(v.clone(), 1250, Some(22.0));
        assert_eq!(list.price(&v), Some(1250));
        assert_eq!(list.vat_rate(&v), Some(22.0));
        assert_eq!(list.price(&VariantId::new("V2").unwrap()), None);
    }
}
