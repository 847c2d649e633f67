//! Patch header decoding
//!
//! Header layout: `[flag:1][pcid:u32][compression:u32][npoints:u32]`,
//! all multi-byte fields in the endianness named by the flag.
//! Compressed payloads are opaque here; only uncompressed patches can be
//! expanded into points.

use std::fmt;

use crate::codec::{self, ByteReader, Endianness};
use crate::error::{PgpcError, Result};
use crate::models::Format;
use crate::point::{decode_body, Point};

pub const PATCH_HEADER_SIZE: usize = 13;

/// Patch payload compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Ght,
    Dimensional,
}

impl Compression {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Ght),
            2 => Ok(Compression::Dimensional),
            other => Err(PgpcError::UnsupportedCompression {
                compression: format!("unknown code {}", other),
            }),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Compression::None => 0,
            Compression::Ght => 1,
            Compression::Dimensional => 2,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Ght => write!(f, "ght"),
            Compression::Dimensional => write!(f, "dimensional"),
        }
    }
}

/// Read-only view of a patch header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    endianness: Endianness,
    pcid: u32,
    compression: Compression,
    point_count: u32,
}

impl PatchHeader {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::from_header(data)?;
        reader.require(PATCH_HEADER_SIZE - 1)?;
        let pcid = reader.read_u32()?;
        let compression = Compression::from_code(reader.read_u32()?)?;
        let point_count = reader.read_u32()?;

        Ok(Self { endianness: reader.endianness(), pcid, compression, point_count })
    }

    pub fn decode_hex(hexstr: &str) -> Result<Self> {
        Self::decode(&codec::decode_hex(hexstr)?)
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn is_little_endian(&self) -> bool {
        self.endianness.is_little()
    }

    pub fn pcid(&self) -> u32 {
        self.pcid
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn point_count(&self) -> u32 {
        self.point_count
    }

    /// Whether the payload can be read point by point
    pub fn points_accessible(&self) -> bool {
        self.compression == Compression::None
    }
}

/// Expand an uncompressed patch into points.
///
/// Point bodies follow the header back to back, without per-point headers.
pub fn decode_points<'a>(format: &'a Format, data: &[u8]) -> Result<Vec<Point<'a>>> {
    let header = PatchHeader::decode(data)?;
    if header.pcid() != format.pcid() {
        return Err(PgpcError::FormatMismatch { expected: format.pcid(), found: header.pcid() });
    }
    if !header.points_accessible() {
        return Err(PgpcError::UnsupportedCompression {
            compression: header.compression().to_string(),
        });
    }

    let mut reader = ByteReader::from_header(data)?;
    // Skip pcid, compression and point count
    for _ in 0..3 {
        reader.read_u32()?;
    }

    let count = header.point_count() as usize;
    reader.require(count.saturating_mul(format.point_size()))?;

    (0..count)
        .map(|_| decode_body(format, &mut reader).map(|raw| Point::from_raw(format, raw)))
        .collect()
}

pub fn decode_points_hex<'a>(format: &'a Format, hexstr: &str) -> Result<Vec<Point<'a>>> {
    decode_points(format, &codec::decode_hex(hexstr)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dimension, Interpretation};

    fn header_bytes(flag: u8, pcid: u32, compression: u32, npoints: u32) -> Vec<u8> {
        let mut data = vec![flag];
        for value in [pcid, compression, npoints] {
            if flag == 0 {
                data.extend_from_slice(&value.to_be_bytes());
            } else {
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        data
    }

    fn xy_format() -> Format {
        Format::new(
            3,
            4326,
            vec![
                Dimension::scaled("X", Interpretation::Int32, 0.01).unwrap(),
                Dimension::scaled("Y", Interpretation::Int32, 0.01).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_decode_little_endian_header() {
        let header = PatchHeader::decode(&header_bytes(1, 3, 2, 400)).unwrap();
        assert!(header.is_little_endian());
        assert_eq!(header.pcid(), 3);
        assert_eq!(header.compression(), Compression::Dimensional);
        assert_eq!(header.point_count(), 400);
        assert!(!header.points_accessible());
    }

    #[test]
    fn test_decode_big_endian_header() {
        let header = PatchHeader::decode(&header_bytes(0, 65507, 0, 12)).unwrap();
        assert!(!header.is_little_endian());
        assert_eq!(header.pcid(), 65507);
        assert_eq!(header.compression(), Compression::None);
        assert_eq!(header.point_count(), 12);
        assert!(header.points_accessible());
    }

    #[test]
    fn test_decode_hex_header() {
        let header = PatchHeader::decode_hex("01030000000100000002000000").unwrap();
        assert_eq!(header.pcid(), 3);
        assert_eq!(header.compression(), Compression::Ght);
        assert_eq!(header.point_count(), 2);
    }

    #[test]
    fn test_truncated_header() {
        let err = PatchHeader::decode(&header_bytes(1, 3, 0, 1)[..9]).unwrap_err();
        assert!(matches!(err, PgpcError::TruncatedData { needed: 13, available: 9 }));
    }

    #[test]
    fn test_unknown_compression_code() {
        let err = PatchHeader::decode(&header_bytes(1, 3, 7, 1)).unwrap_err();
        assert!(matches!(err, PgpcError::UnsupportedCompression { .. }));
    }

    #[test]
    fn test_decode_uncompressed_points() {
        let format = xy_format();
        let mut data = header_bytes(1, 3, 0, 2);
        for raw in [100i32, 200, -300, 400] {
            data.extend_from_slice(&raw.to_le_bytes());
        }

        let points = decode_points(&format, &data).unwrap();
        assert_eq!(points.len(), 2);
        assert!((points[0].get("X").unwrap() - 1.0).abs() < 1e-9);
        assert!((points[1].get("X").unwrap() + 3.0).abs() < 1e-9);
        assert!((points[1].get("Y").unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_compressed_points_unsupported() {
        let format = xy_format();
        let err = decode_points(&format, &header_bytes(1, 3, 2, 2)).unwrap_err();
        assert!(matches!(err, PgpcError::UnsupportedCompression { .. }));
    }

    #[test]
    fn test_uncompressed_points_truncated() {
        let format = xy_format();
        let mut data = header_bytes(1, 3, 0, 2);
        data.extend_from_slice(&100i32.to_le_bytes());
        let err = decode_points(&format, &data).unwrap_err();
        assert!(matches!(err, PgpcError::TruncatedData { .. }));
    }
}
