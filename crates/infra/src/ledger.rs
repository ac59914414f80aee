//! Reservation ledger: the only writer of lot state.
//!
//! Every multi-lot operation reads and validates the whole batch first, then
//! writes each lot expecting the version read in the validate pass. A write
//! that loses a race undoes the lots already written in that batch.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use depot_core::{AggregateRoot, DomainError, ExpectedVersion, ExternalOrderId, LotId, OrderId};
use depot_warehouse::{
    Allocation, LotAudit, LotState, ReservationConflict, ReservationError, WarehouseLot,
    reservation::{plan_reservation, validate_allocations},
};

use crate::store::{LotStore, StoreError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Conflict(#[from] ReservationConflict),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ReservationError> for LedgerError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::Validation(e) => LedgerError::Validation(e),
            ReservationError::Conflict(e) => LedgerError::Conflict(e),
        }
    }
}

/// Result of a successful `reserve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveOutcome {
    pub order_id: OrderId,
    /// Every lot now tagged for the order, in batch order.
    pub lot_ids: Vec<LotId>,
    /// Lots that were already held by the same order before this call.
    pub already_held: usize,
}

impl ReserveOutcome {
    pub fn reserved(&self) -> usize {
        self.lot_ids.len()
    }

    pub fn newly_reserved(&self) -> usize {
        self.lot_ids.len() - self.already_held
    }
}

/// One lot as read in the validate pass and as it should be written.
#[derive(Debug, Clone)]
pub(crate) struct LotChange {
    pub(crate) before: WarehouseLot,
    pub(crate) after: WarehouseLot,
}

/// Write pass shared by the ledger and the transfer coordinator.
///
/// Each save expects the version read in the validate pass. On the first
/// failure the lots already written are restored (best-effort) and the store
/// error is returned.
pub(crate) async fn commit_batch<S>(
    store: &S,
    changes: Vec<LotChange>,
) -> Result<Vec<WarehouseLot>, StoreError>
where
    S: LotStore + ?Sized,
{
    let mut written: Vec<(WarehouseLot, u64)> = Vec::with_capacity(changes.len());
    let mut stored = Vec::with_capacity(changes.len());

    for change in changes {
        let expected = ExpectedVersion::of(&change.before);
        match store.save(change.after, expected).await {
            Ok(lot) => {
                written.push((change.before, lot.version()));
                stored.push(lot);
            }
            Err(err) => {
                warn!(
                    lot_id = %change.before.id_typed(),
                    error = %err,
                    rolled_back = written.len(),
                    "batch write failed, restoring lots already written"
                );
                rollback(store, written).await;
                return Err(err);
            }
        }
    }

    Ok(stored)
}

async fn rollback<S>(store: &S, written: Vec<(WarehouseLot, u64)>)
where
    S: LotStore + ?Sized,
{
    for (before, version) in written.into_iter().rev() {
        let lot_id = before.id_typed().clone();
        if let Err(err) = store.save(before, ExpectedVersion(version)).await {
            warn!(lot_id = %lot_id, error = %err, "rollback of lot failed");
        }
    }
}

/// Reservation state machine over a [`LotStore`].
///
/// Constructed once and shared by reference (or `Arc`). Operations are not
/// reentrant per order id: callers must not interleave two operations on the
/// same order.
#[derive(Debug)]
pub struct ReservationLedger<S> {
    store: S,
}

impl<S> ReservationLedger<S>
where
    S: LotStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tag every lot in `allocations` as reserved for `order_id`.
    ///
    /// All-or-nothing: the whole batch is validated before any lot is written.
    /// Lots already reserved for `order_id` are accepted and get the new audit.
    #[instrument(skip_all, fields(order_id = %order_id, allocations = allocations.len()))]
    pub async fn reserve(
        &self,
        order_id: &OrderId,
        allocations: &[Allocation],
        audit: LotAudit,
    ) -> Result<ReserveOutcome, LedgerError> {
        validate_allocations(allocations)?;
        if allocations.is_empty() {
            debug!("empty reservation batch");
            return Ok(ReserveOutcome {
                order_id: order_id.clone(),
                lot_ids: Vec::new(),
                already_held: 0,
            });
        }

        let lot_ids: Vec<LotId> = allocations.iter().map(|a| a.lot_id.clone()).collect();
        let snapshot = self.store.get_many(&lot_ids).await?;

        let plan = plan_reservation(order_id, allocations, &snapshot).map_err(|err| {
            if let ReservationError::Conflict(conflict) = &err {
                warn!(lot_id = %conflict.lot_id(), conflict = %conflict, "reservation rejected");
            }
            LedgerError::from(err)
        })?;

        let now = Utc::now();
        let mut changes = Vec::with_capacity(plan.lots.len());
        for planned in &plan.lots {
            let before = snapshot
                .get(&planned.lot_id)
                .ok_or_else(|| StoreError::NotFound(planned.lot_id.clone()))?;
            let mut after = before.clone();
            after.reserve(order_id, audit.clone(), now)?;
            changes.push(LotChange {
                before: before.clone(),
                after,
            });
        }

        commit_batch(&self.store, changes).await?;

        let already_held = plan.lots.iter().filter(|p| p.already_held).count();
        info!(lots = plan.lots.len(), already_held, "lots reserved");

        Ok(ReserveOutcome {
            order_id: order_id.clone(),
            lot_ids: plan.lots.into_iter().map(|p| p.lot_id).collect(),
            already_held,
        })
    }

    /// Return every lot reserved for `order_id` to Available. Idempotent.
    #[instrument(skip_all, fields(order_id = %order_id))]
    pub async fn release(&self, order_id: &OrderId) -> Result<usize, LedgerError> {
        let lots = self.store.reserved_for(order_id).await?;
        if lots.is_empty() {
            debug!("no reservations to release");
            return Ok(0);
        }

        let now = Utc::now();
        let changes = Self::changes(lots, |lot| lot.release(now))?;
        let released = commit_batch(&self.store, changes).await?.len();

        info!(released, "reservations released");
        Ok(released)
    }

    /// Promote every lot reserved for `order_id` to Sold.
    ///
    /// `audit: None` keeps the metadata written at reservation time.
    #[instrument(skip_all, fields(order_id = %order_id, external_order_id = %external_order_id))]
    pub async fn mark_sold(
        &self,
        order_id: &OrderId,
        external_order_id: &ExternalOrderId,
        audit: Option<LotAudit>,
    ) -> Result<usize, LedgerError> {
        let lots = self.store.reserved_for(order_id).await?;
        if lots.is_empty() {
            debug!("no reservations to mark sold");
            return Ok(0);
        }

        let now = Utc::now();
        let changes =
            Self::changes(lots, |lot| lot.mark_sold(external_order_id, audit.clone(), now))?;
        let sold = commit_batch(&self.store, changes).await?.len();

        info!(sold, "lots marked sold");
        Ok(sold)
    }

    /// Move every lot sold in `external_order_id` back to Available.
    #[instrument(skip_all, fields(external_order_id = %external_order_id))]
    pub async fn return_from_sold(
        &self,
        external_order_id: &ExternalOrderId,
    ) -> Result<usize, LedgerError> {
        let lots = self.store.sold_in(external_order_id).await?;
        if lots.is_empty() {
            debug!("no sold lots to return");
            return Ok(0);
        }

        let now = Utc::now();
        let changes = Self::changes(lots, |lot| lot.return_to_available(now))?;
        let returned = commit_batch(&self.store, changes).await?.len();

        info!(returned, "sold lots returned");
        Ok(returned)
    }

    /// Return the given lots from Sold to Available.
    ///
    /// Ids that are unknown or not currently sold are skipped; the count is
    /// the number of lots actually changed.
    #[instrument(skip_all, fields(requested = lot_ids.len()))]
    pub async fn return_specific(&self, lot_ids: &[LotId]) -> Result<usize, LedgerError> {
        let mut seen = HashSet::new();
        let unique: Vec<LotId> = lot_ids.iter().filter(|id| seen.insert(*id)).cloned().collect();
        let snapshot = self.store.get_many(&unique).await?;

        let sold: Vec<WarehouseLot> = unique
            .iter()
            .filter_map(|id| snapshot.get(id))
            .filter(|lot| matches!(lot.state(), LotState::Sold { .. }))
            .cloned()
            .collect();

        if sold.is_empty() {
            debug!("none of the requested lots is sold");
            return Ok(0);
        }

        let now = Utc::now();
        let changes = Self::changes(sold, |lot| lot.return_to_available(now))?;
        let returned = commit_batch(&self.store, changes).await?.len();

        info!(returned, skipped = unique.len() - returned, "lots returned");
        Ok(returned)
    }

    /// Patch the display order number on sold lots.
    ///
    /// Never fails: store errors are logged and the affected lot skipped.
    /// Returns the number of lots whose number changed.
    #[instrument(skip_all, fields(orders = mappings.len()))]
    pub async fn update_order_numbers(&self, mappings: &HashMap<ExternalOrderId, String>) -> usize {
        let mut updated = 0;

        for (external_order_id, number) in mappings {
            let lots = match self.store.sold_in(external_order_id).await {
                Ok(lots) => lots,
                Err(err) => {
                    warn!(
                        external_order_id = %external_order_id,
                        error = %err,
                        "order number patch skipped"
                    );
                    continue;
                }
            };

            for lot in lots {
                let mut patched = lot.clone();
                match patched.set_order_number(number) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => {
                        warn!(lot_id = %lot.id_typed(), error = %err, "order number patch skipped");
                        continue;
                    }
                }
                match self.store.save(patched, ExpectedVersion::of(&lot)).await {
                    Ok(_) => updated += 1,
                    Err(err) => {
                        warn!(lot_id = %lot.id_typed(), error = %err, "order number patch skipped");
                    }
                }
            }
        }

        info!(updated, "order numbers patched");
        updated
    }

    pub async fn reservations_for(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<WarehouseLot>, LedgerError> {
        Ok(self.store.reserved_for(order_id).await?)
    }

    pub async fn sold_in(
        &self,
        external_order_id: &ExternalOrderId,
    ) -> Result<Vec<WarehouseLot>, LedgerError> {
        Ok(self.store.sold_in(external_order_id).await?)
    }

    /// Apply `transition` to a copy of every lot; any illegal transition aborts
    /// before anything is written.
    fn changes<F>(lots: Vec<WarehouseLot>, mut transition: F) -> Result<Vec<LotChange>, LedgerError>
    where
        F: FnMut(&mut WarehouseLot) -> Result<(), DomainError>,
    {
        lots.into_iter()
            .map(|before| {
                let mut after = before.clone();
                transition(&mut after)?;
                Ok(LotChange { before, after })
            })
            .collect()
    }
}
