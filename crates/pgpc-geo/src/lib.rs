//! pgpc Geo - Dimension remapping, reprojection and patch grid sizing
//!
//! This crate builds on pgpc-core to move points between formats and to
//! choose a patch size for gridding a point set.

pub mod expr;
pub mod grid;
pub mod mapping;
pub mod transform;

pub use expr::{Bindings, Expression, Placeholder};
pub use grid::{GridCounter, GridExtent, GridSizer, PatchGrid};
pub use mapping::{DimensionMapping, MappingKey, MappingSource};
pub use transform::{transform, transform_with, ProjReprojector, Reprojector};
