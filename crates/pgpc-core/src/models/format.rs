//! Point format (pcid) model

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::codec::{BinaryLayout, Endianness, FieldLayout};
use crate::error::{PgpcError, Result};
use crate::models::dimension::{check_scale, Dimension, SUPPORTED_SIZES};

/// Address of a dimension: 1-based position or name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionKey<'k> {
    Position(usize),
    Name(&'k str),
}

impl From<usize> for DimensionKey<'_> {
    fn from(position: usize) -> Self {
        DimensionKey::Position(position)
    }
}

impl<'k> From<&'k str> for DimensionKey<'k> {
    fn from(name: &'k str) -> Self {
        DimensionKey::Name(name)
    }
}

impl<'k> From<&'k String> for DimensionKey<'k> {
    fn from(name: &'k String) -> Self {
        DimensionKey::Name(name.as_str())
    }
}

impl fmt::Display for DimensionKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionKey::Position(position) => write!(f, "position {}", position),
            DimensionKey::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// Ordered schema of dimensions identified by a pcid.
///
/// Dimension order defines the binary layout and positional addressing.
#[derive(Debug, Clone)]
pub struct Format {
    pcid: u32,
    srid: i32,
    projection: Option<String>,
    compression: Option<String>,
    dimensions: Vec<Dimension>,
    lookup: HashMap<String, usize>,
}

impl PartialEq for Format {
    fn eq(&self, other: &Self) -> bool {
        self.pcid == other.pcid
            && self.srid == other.srid
            && self.projection == other.projection
            && self.compression == other.compression
            && self.dimensions == other.dimensions
    }
}

impl Format {
    /// Create and validate a format
    pub fn new(pcid: u32, srid: i32, dimensions: Vec<Dimension>) -> Result<Self> {
        let mut format = Self {
            pcid,
            srid,
            projection: None,
            compression: None,
            dimensions: Vec::new(),
            lookup: HashMap::new(),
        };
        format.set_dimensions(dimensions)?;
        Ok(format)
    }

    /// Attach a projection definition (proj string) for reprojection
    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Attach the schema-level compression hint
    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Replace the dimensions, rebuilding the name lookup
    pub fn set_dimensions(&mut self, dimensions: Vec<Dimension>) -> Result<()> {
        let previous = std::mem::replace(&mut self.dimensions, dimensions);
        if let Err(e) = self.validate() {
            self.dimensions = previous;
            return Err(e);
        }
        self.rebuild_lookup();
        Ok(())
    }

    fn rebuild_lookup(&mut self) {
        self.lookup = self
            .dimensions
            .iter()
            .enumerate()
            .map(|(idx, dim)| (dim.name().to_string(), idx))
            .collect();
    }

    /// Check name uniqueness, storage sizes and scales
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for dim in &self.dimensions {
            if !seen.insert(dim.name()) {
                return Err(PgpcError::invalid_schema(format!(
                    "Duplicate dimension name '{}' in format {}",
                    dim.name(),
                    self.pcid
                )));
            }
            if !SUPPORTED_SIZES.contains(&dim.size()) {
                return Err(PgpcError::invalid_schema(format!(
                    "Dimension '{}' has unsupported size {}",
                    dim.name(),
                    dim.size()
                )));
            }
            check_scale(dim.name(), dim.scale())?;
        }
        Ok(())
    }

    pub fn pcid(&self) -> u32 {
        self.pcid
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    /// Projection definition, ignoring empty strings
    pub fn projection(&self) -> Option<&str> {
        self.projection.as_deref().filter(|p| !p.trim().is_empty())
    }

    pub fn compression(&self) -> Option<&str> {
        self.compression.as_deref()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// 0-based index of a named dimension
    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Resolve a key to its 0-based index
    pub fn index_of(&self, key: DimensionKey<'_>) -> Result<usize> {
        match key {
            DimensionKey::Position(position) if (1..=self.dimensions.len()).contains(&position) => {
                Ok(position - 1)
            }
            DimensionKey::Position(_) => Err(PgpcError::unknown_dimension(key)),
            DimensionKey::Name(name) => {
                self.dimension_index(name).ok_or_else(|| PgpcError::unknown_dimension(key))
            }
        }
    }

    pub fn dimension<'k>(&self, key: impl Into<DimensionKey<'k>>) -> Result<&Dimension> {
        let idx = self.index_of(key.into())?;
        Ok(&self.dimensions[idx])
    }

    pub fn dimension_by_name(&self, name: &str) -> Result<&Dimension> {
        self.dimension(DimensionKey::Name(name))
    }

    /// Dimension at a 1-based position
    pub fn dimension_by_position(&self, position: usize) -> Result<&Dimension> {
        self.dimension(DimensionKey::Position(position))
    }

    /// Byte layout of a point body, in dimension order
    pub fn binary_layout(&self, endianness: Endianness) -> BinaryLayout {
        let mut offset = 0;
        let fields = self
            .dimensions
            .iter()
            .map(|dim| {
                let field = FieldLayout {
                    offset,
                    width: dim.size(),
                    interpretation: dim.interpretation(),
                };
                offset += dim.size();
                field
            })
            .collect();

        BinaryLayout { endianness, fields, size: offset }
    }

    /// Size in bytes of one point body (without header)
    pub fn point_size(&self) -> usize {
        self.dimensions.iter().map(Dimension::size).sum()
    }
}
