//! Registry of formats keyed by pcid.
//!
//! The catalog owns every [`Format`]; points borrow from it.

use std::collections::HashMap;

use crate::codec;
use crate::error::{PgpcError, Result};
use crate::models::Format;
use crate::point::Point;
use crate::schema::parse_schema;

#[derive(Debug, Clone, Default)]
pub struct FormatCatalog {
    formats: HashMap<u32, Format>,
}

impl FormatCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a format, returning the one it replaced
    pub fn insert(&mut self, format: Format) -> Option<Format> {
        let replaced = self.formats.insert(format.pcid(), format);
        if let Some(previous) = &replaced {
            tracing::warn!(pcid = previous.pcid(), "Replacing registered format");
        }
        replaced
    }

    /// Parse a schema document and register the resulting format
    pub fn import_schema(&mut self, pcid: u32, srid: i32, schema: &str) -> Result<&Format> {
        let format = parse_schema(pcid, srid, schema)?;
        self.insert(format);
        self.require(pcid)
    }

    pub fn get(&self, pcid: u32) -> Option<&Format> {
        self.formats.get(&pcid)
    }

    pub fn require(&self, pcid: u32) -> Result<&Format> {
        self.get(pcid).ok_or(PgpcError::UnknownFormat { pcid })
    }

    pub fn contains(&self, pcid: u32) -> bool {
        self.formats.contains_key(&pcid)
    }

    /// Registered pcids in ascending order
    pub fn pcids(&self) -> Vec<u32> {
        let mut pcids: Vec<u32> = self.formats.keys().copied().collect();
        pcids.sort_unstable();
        pcids
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Decode a point using the format named by its own header
    pub fn decode_point(&self, data: &[u8]) -> Result<Point<'_>> {
        let pcid = Point::extract_pcid(data)?;
        Point::decode(self.require(pcid)?, data)
    }

    pub fn decode_point_hex(&self, hexstr: &str) -> Result<Point<'_>> {
        self.decode_point(&codec::decode_hex(hexstr)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dimension, Interpretation};

    fn format(pcid: u32) -> Format {
        Format::new(pcid, 4326, vec![Dimension::new("X", Interpretation::Float64)]).unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut catalog = FormatCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.insert(format(2)).is_none());
        assert!(catalog.insert(format(1)).is_none());
        assert!(catalog.insert(format(1)).is_some());

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.pcids(), vec![1, 2]);
        assert!(catalog.contains(2));
        assert!(matches!(catalog.require(5), Err(PgpcError::UnknownFormat { pcid: 5 })));
    }

    #[test]
    fn test_decode_point_by_header() {
        let mut catalog = FormatCatalog::new();
        catalog.insert(format(7));

        let registered = catalog.require(7).unwrap();
        let bytes = Point::from_values(registered, &[12.5]).unwrap().encode().unwrap();

        let point = catalog.decode_point(&bytes).unwrap();
        assert_eq!(point.format().pcid(), 7);
        assert_eq!(point.get("X").unwrap(), 12.5);
    }
}
