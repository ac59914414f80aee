//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. An
/// `ArticleCode` or an `Allocation` is a value object; a `WarehouseLot` is not
/// (two lots with identical contents in different boxes are different lots).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
