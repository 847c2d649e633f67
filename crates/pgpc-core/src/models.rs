pub mod dimension;
pub mod format;

pub use dimension::{Dimension, Interpretation, DEFAULT_SCALE, SUPPORTED_SIZES};
pub use format::{DimensionKey, Format};
