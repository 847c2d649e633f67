//! Error types for pgpc

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PgpcError {
    // Schema errors
    #[error("Invalid schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("Unknown dimension: {key}")]
    UnknownDimension { key: String },

    #[error("Unknown format: no format registered for pcid {pcid}")]
    UnknownFormat { pcid: u32 },

    // Codec errors
    #[error("Format mismatch: data declares pcid {found}, format has pcid {expected}")]
    FormatMismatch { expected: u32, found: u32 },

    #[error("Truncated data: needed {needed} bytes, got {available}")]
    TruncatedData { needed: usize, available: usize },

    #[error("Value {value} out of range for dimension {dimension} ({interpretation})")]
    ValueOutOfRange {
        dimension: String,
        interpretation: String,
        value: f64,
    },

    #[error("Expected {expected} values, got {actual}")]
    ValueCountMismatch { expected: usize, actual: usize },

    #[error("Invalid hex input: {reason}")]
    InvalidHex { reason: String },

    #[error("Unsupported patch compression: {compression}")]
    UnsupportedCompression { compression: String },

    // Transform errors
    #[error("Invalid mapping for {key}: {reason}")]
    InvalidMapping { key: String, reason: String },

    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Cannot reproject from SRID {from_srid} to SRID {to_srid}: missing projection")]
    MissingProjection { from_srid: i32, to_srid: i32 },

    #[error("Reprojection failed: {reason}")]
    ReprojectionFailed { reason: String },

    // Grid sizing errors
    #[error("Cell count oracle failed at cell size {cell_size}: {reason}")]
    OracleFailure { cell_size: i64, reason: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PgpcError>;

impl PgpcError {
    pub(crate) fn invalid_schema(reason: impl Into<String>) -> Self {
        PgpcError::InvalidSchema { reason: reason.into() }
    }

    pub(crate) fn unknown_dimension(key: impl std::fmt::Display) -> Self {
        PgpcError::UnknownDimension { key: key.to_string() }
    }

    /// True for errors a caller can recover from by skipping the record.
    pub fn is_record_level(&self) -> bool {
        matches!(self, PgpcError::ValueOutOfRange { .. } | PgpcError::TruncatedData { .. })
    }
}
