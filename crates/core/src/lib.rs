//! `depot-core`: ids, errors and version stamps shared by every crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{ExternalOrderId, LotId, OrderId, VariantId};
pub use value_object::ValueObject;
