//! Lot storage boundary.
//!
//! Every suspension point of the ledger is a call on this trait. Saves are
//! version-checked so a read-validate-write sequence can detect a concurrent
//! writer between its passes.

mod in_memory;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use depot_core::{ExpectedVersion, ExternalOrderId, LotId, OrderId};
use depot_warehouse::WarehouseLot;

pub use in_memory::InMemoryLotStore;

/// Lot store operation error.
///
/// Infrastructure failures, as opposed to domain validation or reservation
/// conflicts. They propagate unchanged; nothing here retries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lot not found: {0}")]
    NotFound(LotId),

    #[error("version conflict on lot {lot_id} (expected: {expected}, actual: {actual})")]
    Concurrency {
        lot_id: LotId,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("lot store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid stock snapshot: {0}")]
    Import(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait LotStore: Send + Sync {
    async fn get(&self, lot_id: &LotId) -> Result<Option<WarehouseLot>, StoreError>;

    /// Every lot, in no particular order.
    async fn list(&self) -> Result<Vec<WarehouseLot>, StoreError>;

    /// Persist `lot` if the stored version matches `expected`.
    ///
    /// Returns the stored copy stamped with its new version (previous + 1).
    /// A lot that does not exist yet has version 0.
    async fn save(
        &self,
        lot: WarehouseLot,
        expected: ExpectedVersion,
    ) -> Result<WarehouseLot, StoreError>;

    /// Fetch several lots at once; unknown ids are simply absent from the map.
    async fn get_many(
        &self,
        lot_ids: &[LotId],
    ) -> Result<HashMap<LotId, WarehouseLot>, StoreError> {
        let mut found = HashMap::with_capacity(lot_ids.len());
        for lot_id in lot_ids {
            if found.contains_key(lot_id) {
                continue;
            }
            if let Some(lot) = self.get(lot_id).await? {
                found.insert(lot_id.clone(), lot);
            }
        }
        Ok(found)
    }

    /// Lots currently tagged `Reserved(order_id)`, ordered by lot id.
    async fn reserved_for(&self, order_id: &OrderId) -> Result<Vec<WarehouseLot>, StoreError> {
        let mut lots: Vec<WarehouseLot> = self
            .list()
            .await?
            .into_iter()
            .filter(|lot| lot.state().reserved_for() == Some(order_id))
            .collect();
        lots.sort_by(|a, b| a.id_typed().cmp(b.id_typed()));
        Ok(lots)
    }

    /// Lots currently tagged `Sold(external_order_id)`, ordered by lot id.
    async fn sold_in(
        &self,
        external_order_id: &ExternalOrderId,
    ) -> Result<Vec<WarehouseLot>, StoreError> {
        let mut lots: Vec<WarehouseLot> = self
            .list()
            .await?
            .into_iter()
            .filter(|lot| lot.state().sold_in() == Some(external_order_id))
            .collect();
        lots.sort_by(|a, b| a.id_typed().cmp(b.id_typed()));
        Ok(lots)
    }
}

#[async_trait::async_trait]
impl<S> LotStore for Arc<S>
where
    S: LotStore + ?Sized,
{
    async fn get(&self, lot_id: &LotId) -> Result<Option<WarehouseLot>, StoreError> {
        (**self).get(lot_id).await
    }

    async fn list(&self) -> Result<Vec<WarehouseLot>, StoreError> {
        (**self).list().await
    }

    async fn save(
        &self,
        lot: WarehouseLot,
        expected: ExpectedVersion,
    ) -> Result<WarehouseLot, StoreError> {
        (**self).save(lot, expected).await
    }

    async fn get_many(
        &self,
        lot_ids: &[LotId],
    ) -> Result<HashMap<LotId, WarehouseLot>, StoreError> {
        (**self).get_many(lot_ids).await
    }

    async fn reserved_for(&self, order_id: &OrderId) -> Result<Vec<WarehouseLot>, StoreError> {
        (**self).reserved_for(order_id).await
    }

    async fn sold_in(
        &self,
        external_order_id: &ExternalOrderId,
    ) -> Result<Vec<WarehouseLot>, StoreError> {
        (**self).sold_in(external_order_id).await
    }
}
