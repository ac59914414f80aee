//! Infrastructure layer: lot storage, the reservation ledger and the
//! services built on top of it.

pub mod catalog;
pub mod config;
pub mod ledger;
pub mod store;
pub mod transfer;


pub use catalog::StockCatalog;
pub use config::{ConfigError, DepotConfig};
pub use ledger::{LedgerError, ReservationLedger, ReserveOutcome};
pub use store::{InMemoryLotStore, LotStore, StoreError};
pub use transfer::{TransferCoordinator, TransferOutcome};
