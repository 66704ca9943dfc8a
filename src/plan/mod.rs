//! The three-stage core: normalize source sheets into per-SKU records, project
//! them onto the 60-day window, and aggregate duplicate SKU rows.

pub mod aggregate;
pub mod cell;
pub mod normalize;
pub mod project;
pub mod reconcile;
pub mod record;
pub mod spec_field;
pub mod summary;
pub mod table;

pub use aggregate::{aggregate_rows, aggregate_table, AggregateRules};
pub use normalize::{normalize, Normalized};
pub use project::{project, ProjectedRow, DAY_WINDOW};
pub use record::{SkuMap, SkuRecord};
