//! Warehouse stock domain module.
//!
//! This crate contains the business rules for physical stock lots: lot state
//! transitions, article-code parsing, tiered article matching, reservation
//! batch checks and catalog statistics. Everything here is deterministic
//! domain logic (no IO, no storage).

pub mod allocation;
pub mod article;
pub mod catalog;
pub mod lot;
pub mod matcher;
pub mod reservation;

pub use allocation::Allocation;
pub use article::{ArticleCode, normalize_code};
pub use catalog::{BoxSummary, LotFilter, StateTotals, StockStatistics};
pub use lot::{LotAudit, LotState, LotStateKind, WarehouseLot};
pub use matcher::{
    DescriptionSimilarity, ExactCode, Figura, FiguraGambo, MatchCandidate, MatchQuery,
    MatchStrategy, MatchTier, Matcher,
};
pub use reservation::{PlannedLot, ReservationConflict, ReservationError, ReservationPlan};
