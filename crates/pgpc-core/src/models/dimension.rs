//! Dimension model: one named, typed, scaled field of a point format.

use std::fmt;
use std::str::FromStr;

use crate::error::{PgpcError, Result};

/// Storage widths a dimension may declare, in bytes.
pub const SUPPORTED_SIZES: [usize; 4] = [1, 2, 4, 8];

/// Default scale applied when a schema omits one.
pub const DEFAULT_SCALE: f64 = 1.0;

/// Numeric interpretation of a dimension's stored bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpretation {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl Interpretation {
    /// Width of the stored value in bytes
    pub fn size(&self) -> usize {
        match self {
            Interpretation::Int8 | Interpretation::Uint8 => 1,
            Interpretation::Int16 | Interpretation::Uint16 => 2,
            Interpretation::Int32 | Interpretation::Uint32 | Interpretation::Float32 => 4,
            Interpretation::Int64 | Interpretation::Uint64 | Interpretation::Float64 => 8,
        }
    }

    /// Name used in pgPointCloud schema documents
    pub fn schema_name(&self) -> &'static str {
        match self {
            Interpretation::Int8 => "int8_t",
            Interpretation::Uint8 => "uint8_t",
            Interpretation::Int16 => "int16_t",
            Interpretation::Uint16 => "uint16_t",
            Interpretation::Int32 => "int32_t",
            Interpretation::Uint32 => "uint32_t",
            Interpretation::Int64 => "int64_t",
            Interpretation::Uint64 => "uint64_t",
            Interpretation::Float32 => "float",
            Interpretation::Float64 => "double",
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, Interpretation::Float32 | Interpretation::Float64)
    }

    /// Representable range of an integer interpretation as
    /// `(inclusive lower, exclusive upper)`.
    ///
    /// The upper bound is exclusive so that the 64-bit limits stay exact in f64.
    pub fn integer_bounds(&self) -> Option<(f64, f64)> {
        match self {
            Interpretation::Int8 => Some((-128.0, 128.0)),
            Interpretation::Uint8 => Some((0.0, 256.0)),
            Interpretation::Int16 => Some((-32_768.0, 32_768.0)),
            Interpretation::Uint16 => Some((0.0, 65_536.0)),
            Interpretation::Int32 => Some((-2_147_483_648.0, 2_147_483_648.0)),
            Interpretation::Uint32 => Some((0.0, 4_294_967_296.0)),
            Interpretation::Int64 => Some((-9_223_372_036_854_775_808.0, 9_223_372_036_854_775_808.0)),
            Interpretation::Uint64 => Some((0.0, 18_446_744_073_709_551_616.0)),
            Interpretation::Float32 | Interpretation::Float64 => None,
        }
    }
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name())
    }
}

impl FromStr for Interpretation {
    type Err = PgpcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "int8_t" | "int8" => Ok(Interpretation::Int8),
            "uint8_t" | "uint8" => Ok(Interpretation::Uint8),
            "int16_t" | "int16" => Ok(Interpretation::Int16),
            "uint16_t" | "uint16" => Ok(Interpretation::Uint16),
            "int32_t" | "int32" => Ok(Interpretation::Int32),
            "uint32_t" | "uint32" => Ok(Interpretation::Uint32),
            "int64_t" | "int64" => Ok(Interpretation::Int64),
            "uint64_t" | "uint64" => Ok(Interpretation::Uint64),
            "float" | "float32" => Ok(Interpretation::Float32),
            "double" | "float64" => Ok(Interpretation::Float64),
            other => Err(PgpcError::invalid_schema(format!(
                "Invalid interpretation: {}",
                other
            ))),
        }
    }
}

/// One named numeric field of a [`Format`](crate::models::Format).
///
/// Immutable once built; use the `with_*` methods to derive a changed copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    name: String,
    interpretation: Interpretation,
    scale: f64,
    description: Option<String>,
}

impl Dimension {
    /// Create a dimension with the default scale
    pub fn new(name: impl Into<String>, interpretation: Interpretation) -> Self {
        Self { name: name.into(), interpretation, scale: DEFAULT_SCALE, description: None }
    }

    /// Create a dimension with an explicit scale
    pub fn scaled(
        name: impl Into<String>,
        interpretation: Interpretation,
        scale: f64,
    ) -> Result<Self> {
        Self::new(name, interpretation).with_scale(scale)
    }

    /// Build a dimension from the raw fields of a schema record.
    ///
    /// `size` must be one of [`SUPPORTED_SIZES`] and agree with the interpretation.
    pub fn from_schema_parts(
        name: &str,
        size: usize,
        interpretation: &str,
        scale: Option<f64>,
    ) -> Result<Self> {
        if !SUPPORTED_SIZES.contains(&size) {
            return Err(PgpcError::invalid_schema(format!(
                "Dimension '{}' has unsupported size {}",
                name, size
            )));
        }

        let interpretation: Interpretation = interpretation.parse()?;
        if interpretation.size() != size {
            return Err(PgpcError::invalid_schema(format!(
                "Dimension '{}' declares size {} but {} is {} bytes",
                name,
                size,
                interpretation,
                interpretation.size()
            )));
        }

        Self::new(name, interpretation).with_scale(scale.unwrap_or(DEFAULT_SCALE))
    }

    /// Return a copy with a different scale
    pub fn with_scale(mut self, scale: f64) -> Result<Self> {
        check_scale(&self.name, scale)?;
        self.scale = scale;
        Ok(self)
    }

    /// Return a copy with a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interpretation(&self) -> Interpretation {
        self.interpretation
    }

    pub fn size(&self) -> usize {
        self.interpretation.size()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Convert a stored raw value to its logical value
    pub fn to_logical(&self, raw: f64) -> f64 {
        if self.scale == DEFAULT_SCALE {
            raw
        } else {
            raw * self.scale
        }
    }

    /// Convert a logical value to the raw value that gets stored
    pub fn to_raw(&self, logical: f64) -> f64 {
        if self.scale == DEFAULT_SCALE {
            logical
        } else {
            logical / self.scale
        }
    }
}

pub(crate) fn check_scale(name: &str, scale: f64) -> Result<()> {
    if scale == 0.0 || !scale.is_finite() {
        return Err(PgpcError::invalid_schema(format!(
            "Dimension '{}' has invalid scale {}: scale must be finite and non-zero",
            name, scale
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpretation_sizes() {
        assert_eq!(Interpretation::Int8.size(), 1);
        assert_eq!(Interpretation::Uint16.size(), 2);
        assert_eq!(Interpretation::Float32.size(), 4);
        assert_eq!(Interpretation::Uint64.size(), 8);
        assert_eq!(Interpretation::Float64.size(), 8);
    }

    #[test]
    fn test_parse_interpretation() {
        assert_eq!("uint16_t".parse::<Interpretation>().unwrap(), Interpretation::Uint16);
        assert_eq!("double".parse::<Interpretation>().unwrap(), Interpretation::Float64);
        assert_eq!("float".parse::<Interpretation>().unwrap(), Interpretation::Float32);
        assert!("int24_t".parse::<Interpretation>().is_err());
    }

    #[test]
    fn test_zero_scale_rejected() {
        let result = Dimension::scaled("X", Interpretation::Int32, 0.0);
        assert!(matches!(result, Err(PgpcError::InvalidSchema { .. })));
    }

    #[test]
    fn test_schema_parts_size_checks() {
        assert!(Dimension::from_schema_parts("X", 4, "int32_t", Some(0.01)).is_ok());
        assert!(Dimension::from_schema_parts("X", 3, "int32_t", None).is_err());
        assert!(Dimension::from_schema_parts("X", 2, "int32_t", None).is_err());
    }

    #[test]
    fn test_with_scale_produces_new_dimension() {
        let dim = Dimension::new("Intensity", Interpretation::Uint16);
        let scaled = dim.clone().with_scale(0.5).unwrap();
        assert_eq!(dim.scale(), 1.0);
        assert_eq!(scaled.scale(), 0.5);
        assert_eq!(scaled.to_logical(8.0), 4.0);
        assert_eq!(scaled.to_raw(4.0), 8.0);
    }
}
