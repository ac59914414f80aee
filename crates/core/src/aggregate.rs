//! Aggregate root trait and optimistic version stamps.

/// Aggregate root marker + minimal interface.
///
/// Records that are mutated through read-validate-write sequences carry a
/// monotonically increasing version so the write pass can detect that someone
/// else changed the record in between.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Stores bump this by one on every successful save.
    fn version(&self) -> u64;
}

/// Version a save expects to find in the store.
///
/// A record that does not exist yet is at version 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(pub u64);

impl ExpectedVersion {
    /// Expect the version `aggregate` was read at.
    pub fn of<A: AggregateRoot>(aggregate: &A) -> Self {
        Self(aggregate.version())
    }

    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }
}

impl core::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
