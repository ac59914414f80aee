use serde::{Deserialize, Serialize};

use depot_core::{LotId, ValueObject};

use crate::lot::WarehouseLot;

/// A caller-chosen quantity drawn from one lot while configuring an order line.
///
/// Ephemeral: discarded once the line is committed (reserved) or abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub lot_id: LotId,
    pub article_code: String,
    pub box_label: String,
    pub quantity: u32,
    /// Lot quantity at selection time.
    pub lot_quantity: u32,
}

impl ValueObject for Allocation {}

impl Allocation {
    pub fn from_lot(lot: &WarehouseLot, quantity: u32) -> Self {
        Self {
            lot_id: lot.id_typed().clone(),
            article_code: lot.article_code().to_string(),
            box_label: lot.box_label().to_string(),
            quantity,
            lot_quantity: lot.quantity(),
        }
    }
}
