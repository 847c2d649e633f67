//! Mapping directives from destination dimensions to source values
//!
//! A mapping is keyed by destination dimension, either by 1-based position
//! or by name. When both keys exist for one destination dimension the
//! position key wins.

use pgpc_core::error::{PgpcError, Result};
use pgpc_core::Format;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Destination key of a mapping entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MappingKey {
    Position(usize),
    Name(String),
}

impl MappingKey {
    /// All-digit keys are positions, anything else is a name
    pub fn parse(key: &str) -> Result<Self> {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            return match key.parse::<usize>() {
                Ok(position) if position >= 1 => Ok(MappingKey::Position(position)),
                _ => Err(invalid(key, "positions start at 1")),
            };
        }
        if key.is_empty() {
            return Err(invalid(key, "empty key"));
        }
        Ok(MappingKey::Name(key.to_string()))
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKey::Position(position) => write!(f, "{}", position),
            MappingKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for MappingKey {
    fn from(position: usize) -> Self {
        MappingKey::Position(position)
    }
}

impl From<&str> for MappingKey {
    fn from(name: &str) -> Self {
        MappingKey::Name(name.to_string())
    }
}

impl From<String> for MappingKey {
    fn from(name: String) -> Self {
        MappingKey::Name(name)
    }
}

/// Where a destination value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum MappingSource {
    /// Source value under the same key as the destination entry
    Same,
    /// Source value at a 1-based position
    Position(usize),
    /// Source value of a named dimension
    Name(String),
    /// Fixed logical value
    Constant(f64),
    /// Arithmetic over source values, see [`crate::expr`]
    Expression(String),
}

impl MappingSource {
    fn from_json(key: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(MappingSource::Same),
            Value::Number(number) => match number.as_u64() {
                Some(position) if position >= 1 => Ok(MappingSource::Position(position as usize)),
                _ => Err(invalid(key, format!("{} is not a 1-based position", number))),
            },
            Value::String(name) => Ok(MappingSource::Name(name.clone())),
            Value::Object(directive) => {
                if let Some(constant) = directive.get("value") {
                    constant
                        .as_f64()
                        .map(MappingSource::Constant)
                        .ok_or_else(|| invalid(key, "constant value must be a number"))
                } else if let Some(expression) = directive.get("expression") {
                    expression
                        .as_str()
                        .map(|e| MappingSource::Expression(e.to_string()))
                        .ok_or_else(|| invalid(key, "expression must be a string"))
                } else {
                    Err(invalid(key, "unrecognized directive"))
                }
            }
            _ => Err(invalid(key, "unrecognized value")),
        }
    }
}

/// A resolved mapping entry for one destination dimension
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<'m> {
    pub key: &'m MappingKey,
    pub source: &'m MappingSource,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionMapping {
    entries: HashMap<MappingKey, MappingSource>,
}

impl DimensionMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every destination dimension copied from the same-named source dimension
    pub fn identity(format: &Format) -> Self {
        format
            .dimensions()
            .iter()
            .fold(Self::new(), |mapping, dim| mapping.same(dim.name()))
    }

    pub fn insert(&mut self, key: impl Into<MappingKey>, source: MappingSource) -> Option<MappingSource> {
        self.entries.insert(key.into(), source)
    }

    pub fn same(mut self, key: impl Into<MappingKey>) -> Self {
        self.insert(key, MappingSource::Same);
        self
    }

    pub fn from_position(mut self, key: impl Into<MappingKey>, position: usize) -> Self {
        self.insert(key, MappingSource::Position(position));
        self
    }

    pub fn from_name(mut self, key: impl Into<MappingKey>, name: impl Into<String>) -> Self {
        self.insert(key, MappingSource::Name(name.into()));
        self
    }

    pub fn constant(mut self, key: impl Into<MappingKey>, value: f64) -> Self {
        self.insert(key, MappingSource::Constant(value));
        self
    }

    pub fn expression(mut self, key: impl Into<MappingKey>, expression: impl Into<String>) -> Self {
        self.insert(key, MappingSource::Expression(expression.into()));
        self
    }

    pub fn get(&self, key: &MappingKey) -> Option<&MappingSource> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for the destination dimension at `position` named `name`
    pub fn resolve(&self, position: usize, name: &str) -> Result<Resolved<'_>> {
        let by_position = self.entries.get_key_value(&MappingKey::Position(position));
        let by_name = || self.entries.get_key_value(&MappingKey::Name(name.to_string()));

        by_position
            .or_else(by_name)
            .map(|(key, source)| Resolved { key, source })
            .ok_or_else(|| PgpcError::InvalidMapping {
                key: name.to_string(),
                reason: format!("destination dimension at position {} is not mapped", position),
            })
    }

    /// Parse a JSON object of directives
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| PgpcError::InvalidMapping {
            key: "<root>".to_string(),
            reason: "mapping must be a JSON object".to_string(),
        })?;

        let mut mapping = Self::new();
        for (key, directive) in object {
            let source = MappingSource::from_json(key, directive)?;
            mapping.insert(MappingKey::parse(key)?, source);
        }
        Ok(mapping)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| PgpcError::InvalidMapping {
            key: "<root>".to_string(),
            reason: format!("malformed JSON: {}", e),
        })?;
        Self::from_json(&value)
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> PgpcError {
    PgpcError::InvalidMapping { key: key.to_string(), reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgpc_core::{Dimension, Interpretation};

    #[test]
    fn test_parse_key() {
        assert_eq!(MappingKey::parse("3").unwrap(), MappingKey::Position(3));
        assert_eq!(MappingKey::parse("X").unwrap(), MappingKey::Name("X".to_string()));
        assert_eq!(MappingKey::parse("3a").unwrap(), MappingKey::Name("3a".to_string()));
        assert!(MappingKey::parse("0").is_err());
        assert!(MappingKey::parse("").is_err());
    }

    #[test]
    fn test_from_json() {
        let mapping = DimensionMapping::from_json_str(
            r#"{
                "X": null,
                "2": 1,
                "Z": "Elevation",
                "Intensity": {"value": 7.5},
                "Return": {"expression": "$1 * 2"}
            }"#,
        )
        .unwrap();

        assert_eq!(mapping.len(), 5);
        assert_eq!(mapping.get(&"X".into()), Some(&MappingSource::Same));
        assert_eq!(mapping.get(&MappingKey::Position(2)), Some(&MappingSource::Position(1)));
        assert_eq!(mapping.get(&"Z".into()), Some(&MappingSource::Name("Elevation".to_string())));
        assert_eq!(mapping.get(&"Intensity".into()), Some(&MappingSource::Constant(7.5)));
        assert_eq!(
            mapping.get(&"Return".into()),
            Some(&MappingSource::Expression("$1 * 2".to_string()))
        );
    }

    #[test]
    fn test_from_json_rejects_unknown_shapes() {
        for json in [
            r#"[1, 2]"#,
            r#"{"X": true}"#,
            r#"{"X": [1]}"#,
            r#"{"X": {"scale": 2}}"#,
            r#"{"X": {"value": "high"}}"#,
            r#"{"X": -1}"#,
            r#"{"X": 1.5}"#,
            r#"{"X": 0}"#,
            r#"not json"#,
        ] {
            assert!(
                matches!(DimensionMapping::from_json_str(json), Err(PgpcError::InvalidMapping { .. })),
                "expected {} to be rejected",
                json
            );
        }
    }

    #[test]
    fn test_resolve_prefers_position() {
        let mapping = DimensionMapping::new().from_name("Y", "Z").from_position(2usize, 1);
        let resolved = mapping.resolve(2, "Y").unwrap();
        assert_eq!(*resolved.key, MappingKey::Position(2));
        assert_eq!(*resolved.source, MappingSource::Position(1));

        let resolved = mapping.resolve(3, "Y").unwrap();
        assert_eq!(*resolved.key, MappingKey::Name("Y".to_string()));
    }

    #[test]
    fn test_resolve_unmapped() {
        let mapping = DimensionMapping::new().same("X");
        assert!(matches!(mapping.resolve(2, "Y"), Err(PgpcError::InvalidMapping { .. })));
    }

    #[test]
    fn test_identity() {
        let format = pgpc_core::Format::new(
            1,
            0,
            vec![Dimension::new("X", Interpretation::Float64), Dimension::new("Y", Interpretation::Float64)],
        )
        .unwrap();

        let mapping = DimensionMapping::identity(&format);
        assert_eq!(mapping.len(), 2);
        assert_eq!(*mapping.resolve(2, "Y").unwrap().source, MappingSource::Same);
    }
}
