//! Order-line fulfilment domain module.
//!
//! Decides how much of a requested quantity is covered by warehouse lots and
//! how the remainder is expressed as purchasable packages, then prices every
//! resulting sub-line. Pure domain logic: the packaging calculator and the
//! price list are injected through traits.

pub mod allocation;
pub mod order_line;
pub mod packaging;
pub mod pricing;

pub use allocation::{AllocationSummary, FulfillmentMode, compute_allocation};
pub use order_line::{
    FulfillmentWarning, OrderLineError, OrderLineRequest, ResolvedOrderLine, SubLine, SubLineSource,
    resolve_order_line,
};
pub use packaging::{
    PackageVariant, PackagingBreakdown, PackagingCalculator, PackagingEntry, PackagingError,
    VariantPackagingCalculator,
};
pub use pricing::{InMemoryPriceList, PriceLookup, VatPolicy, VatResolution};
