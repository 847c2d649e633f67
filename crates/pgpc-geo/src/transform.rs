//! Point remapping between formats and coordinate reprojection

use crate::expr::{Bindings, Expression, Placeholder};
use crate::mapping::{DimensionMapping, MappingKey, MappingSource};
use pgpc_core::error::{PgpcError, Result};
use pgpc_core::{Format, Point};
use proj::Proj;

/// Coordinate reprojection primitive
pub trait Reprojector {
    /// Reproject one coordinate pair between two projection definitions
    fn reproject(&self, from_proj: &str, to_proj: &str, x: f64, y: f64) -> Result<(f64, f64)>;
}

/// Reprojection backed by PROJ
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjReprojector;

impl Reprojector for ProjReprojector {
    fn reproject(&self, from_proj: &str, to_proj: &str, x: f64, y: f64) -> Result<(f64, f64)> {
        let proj = Proj::new_known_crs(from_proj, to_proj, None).map_err(|e| {
            PgpcError::ReprojectionFailed {
                reason: format!(
                    "Failed to create projection from '{}' to '{}': {}",
                    from_proj, to_proj, e
                ),
            }
        })?;

        proj.convert((x, y)).map_err(|e| PgpcError::ReprojectionFailed {
            reason: format!("Projection failed: {}", e),
        })
    }
}

/// Logical values of the source point, taken once per transform
struct SourceSnapshot<'a> {
    format: &'a Format,
    values: Vec<f64>,
}

impl Bindings for SourceSnapshot<'_> {
    fn resolve(&self, placeholder: &Placeholder) -> Option<f64> {
        match placeholder {
            Placeholder::Position(position) => {
                position.checked_sub(1).and_then(|idx| self.values.get(idx)).copied()
            }
            Placeholder::Name(name) => {
                self.format.dimension_index(name).and_then(|idx| self.values.get(idx)).copied()
            }
        }
    }
}

/// Remap `source` into `destination`, reprojecting X/Y with PROJ when the
/// SRIDs differ
pub fn transform<'d>(
    source: &Point<'_>,
    destination: &'d Format,
    mapping: &DimensionMapping,
) -> Result<Point<'d>> {
    transform_with(source, destination, mapping, &ProjReprojector)
}

/// [`transform`] with a caller-supplied reprojection primitive.
///
/// Transforming into the source's own format object returns a copy and
/// ignores the mapping. A different but equal format still goes through it.
pub fn transform_with<'d>(
    source: &Point<'_>,
    destination: &'d Format,
    mapping: &DimensionMapping,
    reprojector: &dyn Reprojector,
) -> Result<Point<'d>> {
    if std::ptr::eq(source.format(), destination) {
        return Ok(Point::from_raw(destination, source.raw_values().to_vec()));
    }

    let values = map_values(source, destination, mapping)?;
    let mut point = Point::from_values(destination, &values)?;

    let from = source.format();
    if from.srid() != destination.srid() {
        reproject_xy(&mut point, from, destination, reprojector)?;
    }

    Ok(point)
}

fn map_values(source: &Point<'_>, destination: &Format, mapping: &DimensionMapping) -> Result<Vec<f64>> {
    let mut snapshot: Option<SourceSnapshot<'_>> = None;

    destination
        .dimensions()
        .iter()
        .enumerate()
        .map(|(idx, dim)| -> Result<f64> {
            let position = idx + 1;
            let resolved = mapping.resolve(position, dim.name())?;

            match resolved.source {
                MappingSource::Same => match resolved.key {
                    MappingKey::Position(p) => source.get(*p),
                    MappingKey::Name(name) => source.get(name),
                },
                MappingSource::Position(p) => source.get(*p),
                MappingSource::Name(name) => source.get(name),
                MappingSource::Constant(value) => Ok(*value),
                MappingSource::Expression(text) => {
                    let expression = Expression::parse(text)?;
                    let bindings = snapshot.get_or_insert_with(|| SourceSnapshot {
                        format: source.format(),
                        values: source.values(),
                    });
                    expression.evaluate(&*bindings)
                }
            }
        })
        .collect()
}

fn reproject_xy(
    point: &mut Point<'_>,
    from: &Format,
    to: &Format,
    reprojector: &dyn Reprojector,
) -> Result<()> {
    let (from_proj, to_proj) = match (from.projection(), to.projection()) {
        (Some(from_proj), Some(to_proj)) => (from_proj, to_proj),
        _ => {
            return Err(PgpcError::MissingProjection { from_srid: from.srid(), to_srid: to.srid() })
        }
    };

    let x = point.get("X")?;
    let y = point.get("Y")?;
    let (to_x, to_y) = reprojector.reproject(from_proj, to_proj, x, y)?;
    tracing::debug!(
        from_srid = from.srid(),
        to_srid = to.srid(),
        "Reprojected ({}, {}) to ({}, {})",
        x,
        y,
        to_x,
        to_y
    );

    point.set("X", to_x)?;
    point.set("Y", to_y)?;
    Ok(())
}
