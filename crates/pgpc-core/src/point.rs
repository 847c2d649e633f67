//! Binary point codec
//!
//! Wire format: `[flag:1][pcid:u32][field...]` where the fields follow the
//! format's dimension order and the endianness named by the flag.
//!
//! Decoding honors the endianness flag of the input. Encoding always emits
//! NDR (little-endian), which is what the pgPointCloud extension produces
//! for values it hands back; keep it that way for wire compatibility.

use crate::codec::{self, ByteReader, Endianness};
use crate::error::{PgpcError, Result};
use crate::models::{DimensionKey, Format};

/// Header size: endianness flag plus pcid
pub const POINT_HEADER_SIZE: usize = 5;

/// One tuple of dimension values bound to a shared [`Format`].
///
/// Values are stored raw (unscaled); accessors expose `raw * scale`.
/// `clone()` copies the values and keeps the same format reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Point<'a> {
    format: &'a Format,
    raw: Vec<f64>,
}

impl<'a> Point<'a> {
    /// Point with every raw value set to zero
    pub fn new(format: &'a Format) -> Self {
        Self { format, raw: vec![0.0; format.len()] }
    }

    /// Point from logical values, one per dimension
    pub fn from_values(format: &'a Format, values: &[f64]) -> Result<Self> {
        let mut point = Self::new(format);
        point.set_values(values)?;
        Ok(point)
    }

    /// Point from raw values, padded with zeros or truncated to fit the format
    pub fn from_raw(format: &'a Format, mut raw: Vec<f64>) -> Self {
        raw.resize(format.len(), 0.0);
        Self { format, raw }
    }

    /// Rebind the raw values to another format, padding or truncating
    pub fn with_format<'b>(self, format: &'b Format) -> Point<'b> {
        Point::from_raw(format, self.raw)
    }

    pub fn format(&self) -> &'a Format {
        self.format
    }

    pub fn raw_values(&self) -> &[f64] {
        &self.raw
    }

    /// All logical values in dimension order
    pub fn values(&self) -> Vec<f64> {
        self.format
            .dimensions()
            .iter()
            .zip(&self.raw)
            .map(|(dim, raw)| dim.to_logical(*raw))
            .collect()
    }

    /// Replace every value from logical values
    pub fn set_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.format.len() {
            return Err(PgpcError::ValueCountMismatch {
                expected: self.format.len(),
                actual: values.len(),
            });
        }

        self.raw = self
            .format
            .dimensions()
            .iter()
            .zip(values)
            .map(|(dim, value)| dim.to_raw(*value))
            .collect();
        Ok(())
    }

    /// Logical value of a dimension by 1-based position or name
    pub fn get<'k>(&self, key: impl Into<DimensionKey<'k>>) -> Result<f64> {
        let idx = self.format.index_of(key.into())?;
        Ok(self.format.dimensions()[idx].to_logical(self.raw[idx]))
    }

    /// Store a logical value for a dimension by 1-based position or name
    pub fn set<'k>(&mut self, key: impl Into<DimensionKey<'k>>, value: f64) -> Result<()> {
        let idx = self.format.index_of(key.into())?;
        self.raw[idx] = self.format.dimensions()[idx].to_raw(value);
        Ok(())
    }

    /// Read the pcid from a serialized point header
    pub fn extract_pcid(data: &[u8]) -> Result<u32> {
        ByteReader::from_header(data)?.read_u32()
    }

    pub fn extract_pcid_from_hex(hexstr: &str) -> Result<u32> {
        Self::extract_pcid(&codec::decode_hex(hexstr)?)
    }

    /// Deserialize a point encoded against `format`
    pub fn decode(format: &'a Format, data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::from_header(data)?;
        let pcid = reader.read_u32()?;
        if pcid != format.pcid() {
            return Err(PgpcError::FormatMismatch { expected: format.pcid(), found: pcid });
        }

        let raw = decode_body(format, &mut reader)?;
        Ok(Self { format, raw })
    }

    pub fn from_hex(format: &'a Format, hexstr: &str) -> Result<Self> {
        Self::decode(format, &codec::decode_hex(hexstr)?)
    }

    /// Serialize as NDR regardless of how the point was decoded
    pub fn encode(&self) -> Result<Vec<u8>> {
        let endianness = Endianness::Little;
        let mut buf = Vec::with_capacity(POINT_HEADER_SIZE + self.format.point_size());
        codec::write_header(&mut buf, endianness, self.format.pcid());
        for (dim, raw) in self.format.dimensions().iter().zip(&self.raw) {
            codec::write_value(&mut buf, endianness, dim, *raw)?;
        }
        Ok(buf)
    }

    /// Upper-case hex of [`encode`](Self::encode)
    pub fn to_hex(&self) -> Result<String> {
        Ok(codec::encode_hex(&self.encode()?))
    }
}

/// Read one point body (no header) at the reader's position
pub(crate) fn decode_body(format: &Format, reader: &mut ByteReader<'_>) -> Result<Vec<f64>> {
    let layout = format.binary_layout(reader.endianness());
    reader.require(layout.size)?;
    layout
        .fields
        .iter()
        .map(|field| reader.read_value(field.interpretation))
        .collect()
}
