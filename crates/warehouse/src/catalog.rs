//! Catalog listing filters and aggregate statistics.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::article::normalize_code;
use crate::lot::{LotState, LotStateKind, WarehouseLot};

/// Listing filter. Empty filter matches every lot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotFilter {
    pub state: Option<LotStateKind>,
    pub box_label: Option<String>,
    /// Compared against normalised article codes.
    pub article_prefix: Option<String>,
}

impl LotFilter {
    pub fn with_state(mut self, state: LotStateKind) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_box(mut self, box_label: impl Into<String>) -> Self {
        self.box_label = Some(box_label.into());
        self
    }

    pub fn with_article_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.article_prefix = Some(prefix.into());
        self
    }

    pub fn matches(&self, lot: &WarehouseLot) -> bool {
        if let Some(state) = self.state {
            if lot.state().kind() != state {
                return false;
            }
        }
        if let Some(box_label) = &self.box_label {
            if !lot.box_label().eq_ignore_ascii_case(box_label.trim()) {
                return false;
            }
        }
        if let Some(prefix) = &self.article_prefix {
            if !normalize_code(lot.article_code()).starts_with(&normalize_code(prefix)) {
                return false;
            }
        }
        true
    }

    /// Filter and sort by article code, box, then lot id.
    pub fn apply(&self, lots: impl IntoIterator<Item = WarehouseLot>) -> Vec<WarehouseLot> {
        let mut selected: Vec<WarehouseLot> =
            lots.into_iter().filter(|l| self.matches(l)).collect();
        selected.sort_by(|a, b| {
            normalize_code(a.article_code())
                .cmp(&normalize_code(b.article_code()))
                .then_with(|| a.box_label().cmp(b.box_label()))
                .then_with(|| a.id_typed().cmp(b.id_typed()))
        });
        selected
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTotals {
    pub lots: usize,
    pub quantity: u64,
}

impl StateTotals {
    fn add(&mut self, quantity: u32) {
        self.lots += 1;
        self.quantity += u64::from(quantity);
    }
}

/// Aggregate counts and quantities by lot state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockStatistics {
    pub total_lots: usize,
    pub total_quantity: u64,
    pub available: StateTotals,
    pub reserved: StateTotals,
    pub sold: StateTotals,
    pub distinct_articles: usize,
    /// Distinct draft orders currently holding at least one lot.
    pub open_orders: usize,
}

impl StockStatistics {
    pub fn from_lots<'a>(lots: impl IntoIterator<Item = &'a WarehouseLot>) -> Self {
        let mut stats = Self::default();
        let mut articles = HashSet::new();
        let mut orders = HashSet::new();

        for lot in lots {
            stats.total_lots += 1;
            stats.total_quantity += u64::from(lot.quantity());
            articles.insert(normalize_code(lot.article_code()));

            match lot.state() {
                LotState::Available => stats.available.add(lot.quantity()),
                LotState::Reserved { order_id } => {
                    stats.reserved.add(lot.quantity());
                    orders.insert(order_id.clone());
                }
                LotState::Sold { .. } => stats.sold.add(lot.quantity()),
            }
        }

        stats.distinct_articles = articles.len();
        stats.open_orders = orders.len();
        stats
    }
}

/// Per-box lot count and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxSummary {
    pub box_label: String,
    pub lots: usize,
    pub quantity: u64,
}

impl BoxSummary {
    /// One entry per distinct box label, sorted by label.
    pub fn from_lots<'a>(lots: impl IntoIterator<Item = &'a WarehouseLot>) -> Vec<Self> {
        let mut boxes: BTreeMap<&str, StateTotals> = BTreeMap::new();
        for lot in lots {
            boxes.entry(lot.box_label()).or_default().add(lot.quantity());
        }
        boxes
            .into_iter()
            .map(|(label, totals)| BoxSummary {
                box_label: label.to_string(),
                lots: totals.lots,
                quantity: totals.quantity,
            })
            .collect()
    }
}
