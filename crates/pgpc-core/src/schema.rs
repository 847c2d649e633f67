//! pgPointCloud schema documents (`pointcloud_formats.schema`)

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{PgpcError, Result};
use crate::models::{Dimension, Format, DEFAULT_SCALE};

pub const SCHEMA_NAMESPACE: &str = "http://pointcloud.org/schemas/PC/1.1";

#[derive(Debug, Clone, Copy)]
enum Field {
    Position,
    Size,
    Name,
    Interpretation,
    Scale,
    Description,
}

#[derive(Debug, Default)]
struct DimensionRecord {
    position: Option<String>,
    size: Option<String>,
    name: Option<String>,
    interpretation: Option<String>,
    scale: Option<String>,
    description: Option<String>,
}

impl DimensionRecord {
    fn set(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Position => &mut self.position,
            Field::Size => &mut self.size,
            Field::Name => &mut self.name,
            Field::Interpretation => &mut self.interpretation,
            Field::Scale => &mut self.scale,
            Field::Description => &mut self.description,
        };
        *slot = Some(text.trim().to_string());
    }

    fn into_dimension(self, index: usize) -> Result<(usize, Dimension)> {
        let required = |value: Option<String>, tag: &str| {
            value.ok_or_else(|| {
                PgpcError::invalid_schema(format!("Dimension #{} is missing <pc:{}>", index, tag))
            })
        };

        let position = required(self.position, "position")?;
        let position: usize = position
            .parse()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| PgpcError::invalid_schema(format!("Invalid position: {}", position)))?;

        let size = required(self.size, "size")?;
        let size: usize = size
            .parse()
            .map_err(|_| PgpcError::invalid_schema(format!("Invalid size: {}", size)))?;

        let name = required(self.name, "name")?;
        let interpretation = required(self.interpretation, "interpretation")?;

        let scale = match self.scale {
            Some(scale) => Some(
                scale
                    .parse::<f64>()
                    .map_err(|_| PgpcError::invalid_schema(format!("Invalid scale: {}", scale)))?,
            ),
            None => None,
        };

        let mut dimension = Dimension::from_schema_parts(&name, size, &interpretation, scale)?;
        if let Some(description) = self.description.filter(|d| !d.is_empty()) {
            dimension = dimension.with_description(collapse_whitespace(&description));
        }

        Ok((position, dimension))
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_compression_metadata(element: &BytesStart<'_>) -> bool {
    element
        .attributes()
        .flatten()
        .any(|attr| attr.key.as_ref() == b"name" && attr.value.as_ref() == b"compression")
}

/// Import a format from a pgPointCloud schema document.
///
/// Dimensions are ordered by their `pc:position`, which must cover
/// `1..=n` exactly once.
pub fn parse_schema(pcid: u32, srid: i32, xml: &str) -> Result<Format> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<DimensionRecord> = None;
    let mut field: Option<Field> = None;
    let mut in_compression = false;
    let mut compression = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"dimension" => current = Some(DimensionRecord::default()),
                b"position" => field = Some(Field::Position),
                b"size" => field = Some(Field::Size),
                b"name" => field = Some(Field::Name),
                b"interpretation" => field = Some(Field::Interpretation),
                b"scale" => field = Some(Field::Scale),
                b"description" => field = Some(Field::Description),
                b"Metadata" if current.is_none() => in_compression = is_compression_metadata(&e),
                _ => field = None,
            },
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| {
                    PgpcError::invalid_schema(format!("Invalid text in schema: {}", e))
                })?;
                if let (Some(record), Some(f)) = (current.as_mut(), field) {
                    record.set(f, &text);
                } else if in_compression {
                    compression = Some(text.trim().to_string());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"dimension" => {
                    if let Some(record) = current.take() {
                        records.push(record);
                    }
                    field = None;
                }
                b"Metadata" => in_compression = false,
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PgpcError::invalid_schema(format!(
                    "Malformed schema XML at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if current.is_some() {
        return Err(PgpcError::invalid_schema("Unterminated <pc:dimension> element"));
    }

    let mut positioned = records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| record.into_dimension(idx + 1))
        .collect::<Result<Vec<_>>>()?;
    positioned.sort_by_key(|(position, _)| *position);

    for (expected, (position, dimension)) in positioned.iter().enumerate() {
        if *position != expected + 1 {
            return Err(PgpcError::invalid_schema(format!(
                "Dimension '{}' has position {}, expected {}",
                dimension.name(),
                position,
                expected + 1
            )));
        }
    }

    let dimensions = positioned.into_iter().map(|(_, dimension)| dimension).collect();
    let format = Format::new(pcid, srid, dimensions)?;

    tracing::debug!(pcid, srid, dimensions = format.len(), "Imported point cloud schema");

    Ok(match compression {
        Some(compression) => format.with_compression(compression),
        None => format,
    })
}

/// Render a format as a pgPointCloud schema document
pub fn to_schema_xml(format: &Format) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<pc:PointCloudSchema xmlns:pc=\"{}\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n",
        SCHEMA_NAMESPACE
    ));

    for (idx, dim) in format.dimensions().iter().enumerate() {
        xml.push_str("  <pc:dimension>\n");
        xml.push_str(&format!("    <pc:position>{}</pc:position>\n", idx + 1));
        xml.push_str(&format!("    <pc:size>{}</pc:size>\n", dim.size()));
        if let Some(description) = dim.description() {
            xml.push_str(&format!("    <pc:description>{}</pc:description>\n", escape(description)));
        }
        xml.push_str(&format!("    <pc:name>{}</pc:name>\n", escape(dim.name())));
        xml.push_str(&format!("    <pc:interpretation>{}</pc:interpretation>\n", dim.interpretation()));
        if dim.scale() != DEFAULT_SCALE {
            xml.push_str(&format!("    <pc:scale>{}</pc:scale>\n", dim.scale()));
        }
        xml.push_str("  </pc:dimension>\n");
    }

    if let Some(compression) = format.compression() {
        xml.push_str("  <pc:metadata>\n");
        xml.push_str(&format!(
            "    <Metadata name=\"compression\">{}</Metadata>\n",
            escape(compression)
        ));
        xml.push_str("  </pc:metadata>\n");
    }

    xml.push_str("</pc:PointCloudSchema>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Interpretation;

    const LAS_SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<pc:PointCloudSchema xmlns:pc="http://pointcloud.org/schemas/PC/1.1"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <pc:dimension>
    <pc:position>1</pc:position>
    <pc:size>4</pc:size>
    <pc:description>X coordinate as a long integer. You must use the
                    scale and offset information of the header to
                    determine the double value.</pc:description>
    <pc:name>X</pc:name>
    <pc:interpretation>int32_t</pc:interpretation>
    <pc:scale>0.01</pc:scale>
  </pc:dimension>
  <pc:dimension>
    <pc:position>2</pc:position>
    <pc:size>4</pc:size>
    <pc:name>Y</pc:name>
    <pc:interpretation>int32_t</pc:interpretation>
    <pc:scale>0.01</pc:scale>
  </pc:dimension>
  <pc:dimension>
    <pc:position>3</pc:position>
    <pc:size>4</pc:size>
    <pc:name>Z</pc:name>
    <pc:interpretation>int32_t</pc:interpretation>
    <pc:scale>0.01</pc:scale>
  </pc:dimension>
  <pc:dimension>
    <pc:position>4</pc:position>
    <pc:size>2</pc:size>
    <pc:name>Intensity</pc:name>
    <pc:interpretation>uint16_t</pc:interpretation>
    <pc:scale>1</pc:scale>
  </pc:dimension>
  <pc:metadata>
    <Metadata name="compression">dimensional</Metadata>
  </pc:metadata>
</pc:PointCloudSchema>
"#;

    #[test]
    fn test_import_schema() {
        let format = parse_schema(1, 4326, LAS_SCHEMA).unwrap();
        assert_eq!(format.pcid(), 1);
        assert_eq!(format.srid(), 4326);
        assert_eq!(format.len(), 4);
        assert_eq!(format.compression(), Some("dimensional"));

        let x = format.dimension_by_name("X").unwrap();
        assert_eq!(x.interpretation(), Interpretation::Int32);
        assert_eq!(x.scale(), 0.01);
        assert!(x.description().unwrap().starts_with("X coordinate as a long integer. You"));
        assert_eq!(format.dimension_by_position(4).unwrap().name(), "Intensity");
    }

    #[test]
    fn test_positions_define_order() {
        let xml = r#"<pc:PointCloudSchema xmlns:pc="http://pointcloud.org/schemas/PC/1.1">
  <pc:dimension><pc:position>2</pc:position><pc:size>8</pc:size><pc:name>B</pc:name><pc:interpretation>double</pc:interpretation></pc:dimension>
  <pc:dimension><pc:position>1</pc:position><pc:size>1</pc:size><pc:name>A</pc:name><pc:interpretation>uint8_t</pc:interpretation></pc:dimension>
</pc:PointCloudSchema>"#;
        let format = parse_schema(9, 0, xml).unwrap();
        assert_eq!(format.dimension_index("A"), Some(0));
        assert_eq!(format.dimension_index("B"), Some(1));
        assert_eq!(format.dimension_by_name("B").unwrap().scale(), 1.0);
    }

    #[test]
    fn test_position_gap_rejected() {
        let xml = r#"<pc:PointCloudSchema xmlns:pc="http://pointcloud.org/schemas/PC/1.1">
  <pc:dimension><pc:position>1</pc:position><pc:size>8</pc:size><pc:name>A</pc:name><pc:interpretation>double</pc:interpretation></pc:dimension>
  <pc:dimension><pc:position>3</pc:position><pc:size>8</pc:size><pc:name>B</pc:name><pc:interpretation>double</pc:interpretation></pc:dimension>
</pc:PointCloudSchema>"#;
        assert!(matches!(parse_schema(9, 0, xml), Err(PgpcError::InvalidSchema { .. })));
    }

    #[test]
    fn test_invalid_size_rejected() {
        let xml = r#"<pc:PointCloudSchema xmlns:pc="http://pointcloud.org/schemas/PC/1.1">
  <pc:dimension><pc:position>1</pc:position><pc:size>3</pc:size><pc:name>A</pc:name><pc:interpretation>int32_t</pc:interpretation></pc:dimension>
</pc:PointCloudSchema>"#;
        assert!(matches!(parse_schema(9, 0, xml), Err(PgpcError::InvalidSchema { .. })));
    }

    #[test]
    fn test_zero_scale_rejected() {
        let xml = r#"<pc:PointCloudSchema xmlns:pc="http://pointcloud.org/schemas/PC/1.1">
  <pc:dimension><pc:position>1</pc:position><pc:size>4</pc:size><pc:name>A</pc:name><pc:interpretation>int32_t</pc:interpretation><pc:scale>0</pc:scale></pc:dimension>
</pc:PointCloudSchema>"#;
        assert!(matches!(parse_schema(9, 0, xml), Err(PgpcError::InvalidSchema { .. })));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        let xml = "<pc:PointCloudSchema><pc:dimension></pc:PointCloudSchema>";
        assert!(matches!(parse_schema(9, 0, xml), Err(PgpcError::InvalidSchema { .. })));
    }

    #[test]
    fn test_schema_round_trip() {
        let format = parse_schema(1, 4326, LAS_SCHEMA).unwrap();
        let xml = to_schema_xml(&format);
        let reparsed = parse_schema(1, 4326, &xml).unwrap();
        assert_eq!(format, reparsed);
        assert!(xml.contains("<pc:interpretation>uint16_t</pc:interpretation>"));
        assert!(xml.contains("<Metadata name=\"compression\">dimensional</Metadata>"));
    }

    #[test]
    fn test_export_layout() {
        let format = Format::new(
            3,
            0,
            vec![Dimension::scaled("A<B", crate::models::Interpretation::Int16, 0.5)
                .unwrap()
                .with_description("x & y")],
        )
        .unwrap();
        let xml = to_schema_xml(&format);
        let lines: Vec<&str> = xml.lines().collect();

        assert_eq!(lines[0], "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        assert_eq!(
            &lines[2..9],
            &[
                "  <pc:dimension>",
                "    <pc:position>1</pc:position>",
                "    <pc:size>2</pc:size>",
                "    <pc:description>x &amp; y</pc:description>",
                "    <pc:name>A&lt;B</pc:name>",
                "    <pc:interpretation>int16_t</pc:interpretation>",
                "    <pc:scale>0.5</pc:scale>",
            ]
        );
        assert_eq!(lines.last(), Some(&"</pc:PointCloudSchema>"));
        assert!(xml.ends_with('\n'));
    }
}
