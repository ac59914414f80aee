//! Packaging breakdown: express a quantity as purchasable packages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use depot_core::VariantId;
use depot_warehouse::normalize_code;

/// One purchasable pack of an article family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVariant {
    pub variant_id: VariantId,
    pub package_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingEntry {
    pub variant_id: VariantId,
    pub package_size: u32,
    pub package_count: u32,
    pub total_pieces: u32,
}

/// Entries ordered by package size, largest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingBreakdown {
    pub entries: Vec<PackagingEntry>,
}

impl PackagingBreakdown {
    pub fn total_pieces(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.total_pieces)).sum()
    }

    pub fn total_packages(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.package_count)).sum()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackagingError {
    #[error("no package variants known for article family {0}")]
    UnknownFamily(String),

    #[error("no package combination of {family} sums to exactly {quantity} pieces")]
    NoExactCombination { family: String, quantity: u32 },

    #[error("cannot package a zero quantity")]
    ZeroQuantity,

    #[error("{quantity} pieces of {family} exceed what the calculator can search")]
    QuantityTooLarge { family: String, quantity: u32 },
}

/// Largest amount solved by table lookup once the bulk has been taken greedily.
const MAX_TABLE_AMOUNT: u64 = 1 << 20;

/// External collaborator that turns a quantity into package sub-lines.
///
/// Implementations must return entries whose `total_pieces` sum exactly to
/// `quantity`, minimising the package count and preferring larger packages
/// on ties.
pub trait PackagingCalculator {
    fn calculate(
        &self,
        article_family: &str,
        quantity: u32,
    ) -> Result<PackagingBreakdown, PackagingError>;
}

/// Reference calculator over a static variant table.
#[derive(Debug, Clone, Default)]
pub struct VariantPackagingCalculator {
    families: HashMap<String, Vec<PackageVariant>>,
}

impl VariantPackagingCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the packs of one family. Zero-size packs are ignored and
    /// duplicate sizes keep the first variant given.
    pub fn with_family(mut self, family: &str, variants: Vec<PackageVariant>) -> Self {
        let mut variants: Vec<PackageVariant> =
            variants.into_iter().filter(|v| v.package_size > 0).collect();
        variants.sort_by(|a, b| b.package_size.cmp(&a.package_size));
        variants.dedup_by_key(|v| v.package_size);
        self.families.insert(normalize_code(family), variants);
        self
    }

    /// Minimum package count for every amount up to `quantity`.
    fn min_packages(sizes: &[u32], quantity: u32) -> Vec<Option<u32>> {
        let mut best: Vec<Option<u32>> = vec![None; quantity as usize + 1];
        best[0] = Some(0);
        for amount in 1..=quantity as usize {
            let fewest = sizes
                .iter()
                .filter(|&&size| size as usize <= amount)
                .filter_map(|&size| best[amount - size as usize])
                .min();
            best[amount] = fewest.map(|count| count + 1);
        }
        best
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

impl PackagingCalculator for VariantPackagingCalculator {
    fn calculate(
        &self,
        article_family: &str,
        quantity: u32,
    ) -> Result<PackagingBreakdown, PackagingError> {
        if quantity == 0 {
            return Err(PackagingError::ZeroQuantity);
        }
        let family = normalize_code(article_family);
        let variants = self
            .families
            .get(&family)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PackagingError::UnknownFamily(family.clone()))?;

        let no_combination = || PackagingError::NoExactCombination {
            family: family.clone(),
            quantity,
        };

        // Work in units of the common divisor so the table only spans what
        // the packs can actually reach.
        let sizes: Vec<u32> = variants.iter().map(|v| v.package_size).collect();
        let step = sizes.iter().copied().fold(0, gcd);
        if quantity % step != 0 {
            return Err(no_combination());
        }
        let units: Vec<u32> = sizes.iter().map(|size| size / step).collect();
        let largest = u64::from(units[0]);

        // From `largest^2` units up, every minimal combination contains the
        // largest pack, so those can be taken without searching.
        let mut counts = vec![0u32; sizes.len()];
        let mut remaining = u64::from(quantity / step);
        let bound = largest * largest;
        if remaining >= bound {
            let bulk = (remaining - bound) / largest + 1;
            counts[0] = u32::try_from(bulk).map_err(|_| no_combination())?;
            remaining -= bulk * largest;
        }
        if remaining > MAX_TABLE_AMOUNT {
            return Err(PackagingError::QuantityTooLarge {
                family: family.clone(),
                quantity,
            });
        }

        let mut remaining = remaining as usize;
        let best = Self::min_packages(&units, remaining as u32);

        // Walk back, always taking the largest pack that stays on an optimal
        // path; this yields the largest-first optimum.
        while remaining > 0 {
            let current = best[remaining].ok_or_else(no_combination)?;
            let (idx, unit) = units
                .iter()
                .enumerate()
                .find(|&(_, &unit)| {
                    let unit = unit as usize;
                    unit <= remaining && best[remaining - unit] == Some(current - 1)
                })
                .ok_or_else(no_combination)?;
            counts[idx] += 1;
            remaining -= *unit as usize;
        }

        let entries = variants
            .iter()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(variant, count)| PackagingEntry {
                variant_id: variant.variant_id.clone(),
                package_size: variant.package_size,
                package_count: count,
                total_pieces: variant.package_size * count,
            })
            .collect();

        Ok(PackagingBreakdown { entries })
    }
}
