#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Boolean condition trees for content queries.
//!
//! - [`Condition`] - entity-scoped tree of `and` / `or` / `not`, column
//!   leaves and relation nodes
//! - [`ColumnCondition`] - operators applied to a single column
//! - [`FilterValue`] - typed scalar operands

pub mod condition;
pub mod value;

pub use condition::{ColumnCondition, Condition};
pub use value::FilterValue;
