//! Merge reservations of several draft orders into one.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use depot_core::OrderId;

use crate::ledger::{LedgerError, LotChange, commit_batch};
use crate::store::LotStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub target: OrderId,
    /// Lots moved per source order. Sources with nothing reserved map to 0.
    pub moved: BTreeMap<OrderId, usize>,
}

impl TransferOutcome {
    pub fn total(&self) -> usize {
        self.moved.values().sum()
    }
}

/// Retags reservations from source orders to a target order.
///
/// Lots go straight from `Reserved(source)` to `Reserved(target)` and never
/// pass through Available, so no other order can claim them in between.
#[derive(Debug)]
pub struct TransferCoordinator<S> {
    store: S,
}

impl<S> TransferCoordinator<S>
where
    S: LotStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Move every lot reserved for any of `from` to `to`.
    ///
    /// `to` itself is ignored when listed among the sources and repeated
    /// sources count once. Audit metadata is carried over unchanged.
    #[instrument(skip_all, fields(target = %to, sources = from.len()))]
    pub async fn transfer(
        &self,
        from: &[OrderId],
        to: &OrderId,
    ) -> Result<TransferOutcome, LedgerError> {
        let mut moved: BTreeMap<OrderId, usize> = BTreeMap::new();
        let mut changes = Vec::new();
        let now = Utc::now();

        for source in from {
            if source == to || moved.contains_key(source) {
                continue;
            }
            let lots = self.store.reserved_for(source).await?;
            moved.insert(source.clone(), lots.len());

            for before in lots {
                let mut after = before.clone();
                after.retag_reservation(to, now)?;
                changes.push(LotChange { before, after });
            }
        }

        let outcome = TransferOutcome {
            target: to.clone(),
            moved,
        };

        if changes.is_empty() {
            debug!("nothing to transfer");
            return Ok(outcome);
        }

        commit_batch(&self.store, changes).await?;
        info!(moved = outcome.total(), "reservations transferred");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use depot_core::LotId;
    use depot_warehouse::{Allocation, LotAudit, WarehouseLot};

    use crate::ledger::ReservationLedger;
    use crate::store::InMemoryLotStore;

    fn lot(id: &str) -> WarehouseLot {
        let id = LotId::new(id).unwrap();
        WarehouseLot::new(id, "H129FSQ.104.023", "fresa", "BOX-A", 5, Utc::now()).unwrap()
    }

    fn order(id: &str) -> OrderId {
        OrderId::new(id).unwrap()
    }

    #[tokio::test]
    async fn merges_sources_and_keeps_audit() {
        let (a, b, c) = (lot("A"), lot("B"), lot("C"));
        let store = Arc::new(InMemoryLotStore::with_lots([a.clone(), b.clone(), c.clone()]));
        let ledger = ReservationLedger::new(store.clone());
        let coordinator = TransferCoordinator::new(store.clone());

        ledger
            .reserve(
                &order("draft-1"),
                &[Allocation::from_lot(&a, 1), Allocation::from_lot(&b, 1)],
                LotAudit::new("Rossi"),
            )
            .await
            .unwrap();
        ledger
            .reserve(&order("draft-2"), &[Allocation::from_lot(&c, 1)], LotAudit::new("Bianchi"))
            .await
            .unwrap();

        let outcome = coordinator
            .transfer(
                &[order("draft-1"), order("draft-2"), order("draft-1"), order("merged")],
                &order("merged"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.total(), 3);
        assert_eq!(outcome.moved.get(&order("draft-1")), Some(&2));
        assert_eq!(outcome.moved.get(&order("draft-2")), Some(&1));
        assert!(!outcome.moved.contains_key(&order("merged")));

        let merged = ledger.reservations_for(&order("merged")).await.unwrap();
        assert_eq!(merged.len(), 3);
        let c_after = merged.iter().find(|l| l.id_typed().as_str() == "C").unwrap();
        assert_eq!(c_after.audit().map(|a| a.customer_name.as_str()), Some("Bianchi"));
    }

    #[tokio::test]
    async fn unknown_sources_move_nothing() {
        let coordinator = TransferCoordinator::new(InMemoryLotStore::with_lots([lot("A")]));
        let outcome = coordinator.transfer(&[order("ghost")], &order("merged")).await.unwrap();
        assert_eq!(outcome.total(), 0);
        assert_eq!(outcome.moved.get(&order("ghost")), Some(&0));
    }
}
