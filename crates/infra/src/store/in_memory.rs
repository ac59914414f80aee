use std::collections::HashMap;
use std::sync::RwLock;

use depot_core::{AggregateRoot, ExpectedVersion, LotId};
use depot_warehouse::WarehouseLot;

use super::{LotStore, StoreError};

/// In-memory lot store.
///
/// Intended for tests/dev and the CLI's JSON snapshots.
#[derive(Debug, Default)]
pub struct InMemoryLotStore {
    lots: RwLock<HashMap<LotId, WarehouseLot>>,
}

impl InMemoryLotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store as a stock import would; versions are kept as given.
    pub fn with_lots(lots: impl IntoIterator<Item = WarehouseLot>) -> Self {
        let lots = lots.into_iter().map(|lot| (lot.id_typed().clone(), lot)).collect();
        Self {
            lots: RwLock::new(lots),
        }
    }

    /// Load a JSON array of lots. Missing state fields default to `Available`.
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let lots: Vec<WarehouseLot> = serde_json::from_str(raw)?;
        Ok(Self::with_lots(lots))
    }

    pub fn len(&self) -> usize {
        self.lots.read().map(|lots| lots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl LotStore for InMemoryLotStore {
    async fn get(&self, lot_id: &LotId) -> Result<Option<WarehouseLot>, StoreError> {
        let lots = self
            .lots
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(lots.get(lot_id).cloned())
    }

    async fn list(&self) -> Result<Vec<WarehouseLot>, StoreError> {
        let lots = self
            .lots
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(lots.values().cloned().collect())
    }

    async fn save(
        &self,
        mut lot: WarehouseLot,
        expected: ExpectedVersion,
    ) -> Result<WarehouseLot, StoreError> {
        let mut lots = self
            .lots
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let current = lots.get(lot.id_typed()).map(|l| l.version()).unwrap_or(0);
        if !expected.matches(current) {
            return Err(StoreError::Concurrency {
                lot_id: lot.id_typed().clone(),
                expected,
                actual: current,
            });
        }

        lot.set_version(current + 1);
        lots.insert(lot.id_typed().clone(), lot.clone());
        Ok(lot)
    }
}
