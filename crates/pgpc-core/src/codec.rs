//! Byte-level helpers shared by the point and patch codecs.
//!
//! Every serialized pgPointCloud value starts with a one byte endianness
//! flag (`1` = NDR/little-endian, `0` = XDR/big-endian) followed by a
//! `u32` pcid. That single flag governs every multi-byte field after it.

use crate::error::{PgpcError, Result};
use crate::models::{Dimension, Interpretation};

/// Byte order declared by a header flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    /// NDR
    #[default]
    Little,
    /// XDR
    Big,
}

impl Endianness {
    /// Interpret a header flag byte. Any non-zero flag means NDR.
    pub fn from_flag(flag: u8) -> Self {
        if flag == 0 {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    pub fn flag(&self) -> u8 {
        match self {
            Endianness::Little => 1,
            Endianness::Big => 0,
        }
    }

    pub fn is_little(&self) -> bool {
        matches!(self, Endianness::Little)
    }
}

/// Position and type of one field inside a point body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub offset: usize,
    pub width: usize,
    pub interpretation: Interpretation,
}

/// Exact byte layout of a point body for one format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLayout {
    pub endianness: Endianness,
    pub fields: Vec<FieldLayout>,
    /// Total body size in bytes
    pub size: usize,
}

/// Cursor over a byte slice that reads with a fixed endianness
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    endianness: Endianness,
}

macro_rules! read_as {
    ($reader:expr, $ty:ty, $width:literal) => {{
        let bytes = $reader.take::<$width>()?;
        let value = match $reader.endianness {
            Endianness::Little => <$ty>::from_le_bytes(bytes),
            Endianness::Big => <$ty>::from_be_bytes(bytes),
        };
        value as f64
    }};
}

impl<'a> ByteReader<'a> {
    /// Start reading at the header flag, taking endianness from it
    pub(crate) fn from_header(data: &'a [u8]) -> Result<Self> {
        let flag = *data.first().ok_or(PgpcError::TruncatedData { needed: 1, available: 0 })?;
        Ok(Self { data, pos: 1, endianness: Endianness::from_flag(flag) })
    }

    pub(crate) fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Fail early if fewer than `len` bytes remain
    pub(crate) fn require(&self, len: usize) -> Result<()> {
        let needed = self.pos + len;
        if needed > self.data.len() {
            return Err(PgpcError::TruncatedData { needed, available: self.data.len() });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.require(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take::<4>()?;
        Ok(match self.endianness {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        })
    }

    pub(crate) fn read_value(&mut self, interpretation: Interpretation) -> Result<f64> {
        Ok(match interpretation {
            Interpretation::Int8 => read_as!(self, i8, 1),
            Interpretation::Uint8 => read_as!(self, u8, 1),
            Interpretation::Int16 => read_as!(self, i16, 2),
            Interpretation::Uint16 => read_as!(self, u16, 2),
            Interpretation::Int32 => read_as!(self, i32, 4),
            Interpretation::Uint32 => read_as!(self, u32, 4),
            Interpretation::Int64 => read_as!(self, i64, 8),
            Interpretation::Uint64 => read_as!(self, u64, 8),
            Interpretation::Float32 => read_as!(self, f32, 4),
            Interpretation::Float64 => read_as!(self, f64, 8),
        })
    }
}

macro_rules! write_as {
    ($buf:expr, $endianness:expr, $value:expr) => {{
        let value = $value;
        match $endianness {
            Endianness::Little => $buf.extend_from_slice(&value.to_le_bytes()),
            Endianness::Big => $buf.extend_from_slice(&value.to_be_bytes()),
        }
    }};
}

pub(crate) fn write_header(buf: &mut Vec<u8>, endianness: Endianness, pcid: u32) {
    buf.push(endianness.flag());
    write_as!(buf, endianness, pcid);
}

/// Pack one raw value, refusing anything that does not fit the declared type
pub(crate) fn write_value(
    buf: &mut Vec<u8>,
    endianness: Endianness,
    dimension: &Dimension,
    raw: f64,
) -> Result<()> {
    let interpretation = dimension.interpretation();
    let out_of_range = || PgpcError::ValueOutOfRange {
        dimension: dimension.name().to_string(),
        interpretation: interpretation.to_string(),
        value: raw,
    };

    let integral = || -> Result<f64> {
        let rounded = raw.round();
        match interpretation.integer_bounds() {
            Some((low, high)) if rounded.is_finite() && rounded >= low && rounded < high => {
                Ok(rounded)
            }
            _ => Err(out_of_range()),
        }
    };

    match interpretation {
        Interpretation::Int8 => write_as!(buf, endianness, integral()? as i8),
        Interpretation::Uint8 => write_as!(buf, endianness, integral()? as u8),
        Interpretation::Int16 => write_as!(buf, endianness, integral()? as i16),
        Interpretation::Uint16 => write_as!(buf, endianness, integral()? as u16),
        Interpretation::Int32 => write_as!(buf, endianness, integral()? as i32),
        Interpretation::Uint32 => write_as!(buf, endianness, integral()? as u32),
        Interpretation::Int64 => write_as!(buf, endianness, integral()? as i64),
        Interpretation::Uint64 => write_as!(buf, endianness, integral()? as u64),
        Interpretation::Float32 => {
            if raw.is_finite() && raw.abs() > f32::MAX as f64 {
                return Err(out_of_range());
            }
            write_as!(buf, endianness, raw as f32)
        }
        Interpretation::Float64 => write_as!(buf, endianness, raw),
    }
    Ok(())
}

/// Decode a hex string (either case) into bytes
pub fn decode_hex(hexstr: &str) -> Result<Vec<u8>> {
    hex::decode(hexstr.trim()).map_err(|e| PgpcError::InvalidHex { reason: e.to_string() })
}

/// Encode bytes as upper-case hex, the form PostgreSQL prints
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode_upper(data)
}
