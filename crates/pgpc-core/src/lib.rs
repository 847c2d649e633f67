//! pgpc Core - Point formats, binary point codec and patch headers
//!
//! This crate contains the data model and wire codecs for pgPointCloud
//! points and patches, the format catalog and the layered configuration.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod patch;
pub mod point;
pub mod schema;

pub use catalog::FormatCatalog;
pub use codec::{BinaryLayout, Endianness, FieldLayout};
pub use error::{PgpcError, Result};
pub use models::{Dimension, DimensionKey, Format, Interpretation};
pub use patch::{Compression, PatchHeader};
pub use point::Point;
