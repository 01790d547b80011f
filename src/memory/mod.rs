//! Memory model for the runtime.
//!
//! - [`value`]: tagged runtime values with a scalar/boxed split
//! - [`heap`]: the id-keyed object heap the collector sweeps
//!
//! The heap stores whole tagged values rather than raw bytes, so sizes and
//! budgets throughout the crate are expressed in object counts. The off-heap
//! byte arena lives in [`crate::types`] because its lifetime is manual and
//! the collector never touches it.

pub mod heap;
pub mod value;
