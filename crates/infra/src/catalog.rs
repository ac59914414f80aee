//! Read-side service over the lot store: lookups, listings, matching and
//! statistics.

use tracing::debug;

use depot_core::LotId;
use depot_warehouse::{
    BoxSummary, LotFilter, MatchCandidate, Matcher, StockStatistics, WarehouseLot,
};

use crate::config::DepotConfig;
use crate::store::{LotStore, StoreError};

#[derive(Debug)]
pub struct StockCatalog<S> {
    store: S,
    matcher: Matcher,
    match_limit: usize,
}

impl<S> StockCatalog<S>
where
    S: LotStore,
{
    pub fn new(store: S) -> Self {
        Self::from_config(store, &DepotConfig::default())
    }

    pub fn from_config(store: S, config: &DepotConfig) -> Self {
        Self {
            store,
            matcher: config.matcher(),
            match_limit: config.match_limit,
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub async fn get(&self, lot_id: &LotId) -> Result<Option<WarehouseLot>, StoreError> {
        self.store.get(lot_id).await
    }

    pub async fn list(&self, filter: &LotFilter) -> Result<Vec<WarehouseLot>, StoreError> {
        Ok(filter.apply(self.store.list().await?))
    }

    pub async fn boxes(&self) -> Result<Vec<BoxSummary>, StoreError> {
        let lots = self.store.list().await?;
        Ok(BoxSummary::from_lots(&lots))
    }

    /// Rank lots against an article query. Lots in any state are returned.
    ///
    /// `limit: None` uses the configured default.
    pub async fn match_article(
        &self,
        query: &str,
        description: Option<&str>,
        limit: Option<usize>,
        exclude: &[LotId],
    ) -> Result<Vec<MatchCandidate>, StoreError> {
        let lots = self.store.list().await?;
        let limit = limit.unwrap_or(self.match_limit);
        let candidates = self.matcher.match_article(&lots, query, description, limit, exclude);
        debug!(query, candidates = candidates.len(), "article matched");
        Ok(candidates)
    }

    pub async fn statistics(&self) -> Result<StockStatistics, StoreError> {
        let lots = self.store.list().await?;
        Ok(StockStatistics::from_lots(&lots))
    }
}
