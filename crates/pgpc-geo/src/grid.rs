//! Adaptive patch grid sizing
//!
//! Points are grouped into square patches on a grid anchored at the upper
//! left corner of their extent. [`GridSizer`] searches for the largest cell
//! size at which no cell holds more than the configured number of points,
//! asking an oracle how many cells are over the limit for each size tried.
//!
//! The oracle is not monotonic in the cell size, so the search is a
//! heuristic. It halves its step on every move and, once it is moving one
//! unit at a time through sizes with no crowded cells, keeps growing for a
//! few more steps before settling.

use geo::{BoundingRect, MultiPoint, Rect};
use pgpc_core::config::SizingConfig;
use pgpc_core::error::{PgpcError, Result};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt::Display;

/// Initial sizes at or above this leave no headroom for the search steps
const MAX_INITIAL_SIZE: i64 = i64::MAX / 4;

/// Area to grid, anchored at its upper left corner
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridExtent {
    pub min_x: f64,
    pub max_y: f64,
    pub width: f64,
    pub height: f64,
}

impl GridExtent {
    pub fn new(min_x: f64, max_y: f64, width: f64, height: f64) -> Self {
        Self { min_x, max_y, width, height }
    }

    pub fn from_corners(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(min_x, max_y, max_x - min_x, max_y - min_y)
    }

    pub fn from_rect(rect: &Rect<f64>) -> Self {
        Self::from_corners(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    /// Bounding extent of a point set, `None` when it is empty
    pub fn from_points(points: &[geo::Point<f64>]) -> Option<Self> {
        MultiPoint::new(points.to_vec()).bounding_rect().map(|rect| Self::from_rect(&rect))
    }
}

/// Outcome of a sizing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchGrid {
    pub cell_size: i64,
    pub columns: u64,
    pub rows: u64,
    /// Oracle calls made
    pub iterations: u32,
}

impl PatchGrid {
    fn new(extent: &GridExtent, cell_size: i64, iterations: u32) -> Self {
        let cells = |side: f64| ((side / cell_size as f64).ceil().max(1.0)) as u64;
        Self { cell_size, columns: cells(extent.width), rows: cells(extent.height), iterations }
    }
}

#[derive(Debug, Clone)]
pub struct GridSizer {
    max_points_per_patch: u64,
    fallback_patch_size: i64,
    initial_divisor: u32,
    long_tail_limit: u32,
    max_iterations: u32,
}

impl GridSizer {
    pub fn new(config: &SizingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_points_per_patch: config.max_points_per_patch.value,
            fallback_patch_size: config.fallback_patch_size.value,
            initial_divisor: config.initial_divisor.value,
            long_tail_limit: config.long_tail_limit.value,
            max_iterations: config.max_iterations.value,
        })
    }

    pub fn max_points_per_patch(&self) -> u64 {
        self.max_points_per_patch
    }

    /// Search for a cell size using `oracle(cell_size)` to count crowded cells.
    ///
    /// An oracle error aborts the search with [`PgpcError::OracleFailure`].
    pub fn compute_patch_size<F, E>(&self, extent: &GridExtent, mut oracle: F) -> Result<PatchGrid>
    where
        F: FnMut(i64) -> std::result::Result<u64, E>,
        E: Display,
    {
        let initial = (extent.width.max(extent.height)) / f64::from(self.initial_divisor);
        if !initial.is_finite() || initial < 1.0 {
            tracing::warn!(
                width = extent.width,
                height = extent.height,
                "Extent too small to grid, using fallback patch size {}",
                self.fallback_patch_size
            );
            return Ok(PatchGrid::new(extent, self.fallback_patch_size, 0));
        }
        if initial >= MAX_INITIAL_SIZE as f64 {
            tracing::warn!(
                width = extent.width,
                height = extent.height,
                "Extent too large to grid, using fallback patch size {}",
                self.fallback_patch_size
            );
            return Ok(PatchGrid::new(extent, self.fallback_patch_size, 0));
        }

        let mut size = initial.trunc() as i64;
        // (size, over count) of every size tried, after a (0, 0) sentinel
        let mut history: Vec<(i64, u64)> = vec![(0, 0)];
        let mut long_tail = 0u32;
        let mut iterations = 0u32;

        let chosen = loop {
            if size < 1 || iterations >= self.max_iterations {
                break self.best_of(&history);
            }

            let over = oracle(size).map_err(|e| PgpcError::OracleFailure {
                cell_size: size,
                reason: e.to_string(),
            })?;
            iterations += 1;

            let (prev_size, prev_over) = history[history.len() - 1];
            let step = (size - prev_size).abs();
            tracing::debug!(size, over, step, long_tail, "Patch size iteration {}", iterations);

            if history.len() > 1 {
                if step <= 1 {
                    if over == 0 {
                        if long_tail >= self.long_tail_limit {
                            break prev_size;
                        } else if size > prev_size {
                            long_tail += 1;
                        }
                    } else if prev_over == 0 {
                        break prev_size;
                    }
                } else if long_tail > 0 && over > 0 && prev_over == 0 {
                    break prev_size;
                }
            }

            let delta = (step / 2).max(1);
            history.push((size, over));
            size = match size.checked_add(if over > 0 { -delta } else { delta }) {
                Some(next) => next,
                None => break self.best_of(&history),
            };
        };

        let grid = PatchGrid::new(extent, chosen, iterations);
        tracing::info!(
            cell_size = grid.cell_size,
            columns = grid.columns,
            rows = grid.rows,
            iterations = grid.iterations,
            "Computed patch size"
        );
        Ok(grid)
    }

    /// Size patches for an in-memory point set
    pub fn size_points(&self, points: &[geo::Point<f64>]) -> Result<PatchGrid> {
        let extent = GridExtent::from_points(points).unwrap_or_default();
        let counter = GridCounter::new(points, &extent, self.max_points_per_patch);
        self.compute_patch_size(&extent, |size| Ok::<_, Infallible>(counter.count_over_threshold(size)))
    }

    /// Largest size among those with the fewest crowded cells
    fn best_of(&self, history: &[(i64, u64)]) -> i64 {
        let tried = &history[1..];
        let Some(min_over) = tried.iter().map(|(_, over)| *over).min() else {
            return self.fallback_patch_size;
        };

        tried
            .iter()
            .filter(|(_, over)| *over == min_over)
            .map(|(size, _)| *size)
            .max()
            .unwrap_or(self.fallback_patch_size)
    }
}

/// In-memory oracle that buckets points the way `ST_SnapToGrid` does
#[derive(Debug, Clone)]
pub struct GridCounter<'p> {
    points: &'p [geo::Point<f64>],
    origin_x: f64,
    origin_y: f64,
    max_points: u64,
}

impl<'p> GridCounter<'p> {
    pub fn new(points: &'p [geo::Point<f64>], extent: &GridExtent, max_points: u64) -> Self {
        Self { points, origin_x: extent.min_x, origin_y: extent.max_y, max_points }
    }

    /// Points per cell, keyed by (column, row) from the upper left corner.
    /// Sizes below 1 count as 1.
    pub fn cell_counts(&self, size: i64) -> HashMap<(i64, i64), u64> {
        let size = size.max(1) as f64;
        let mut counts = HashMap::new();
        for point in self.points {
            let column = ((point.x() - self.origin_x) / size).round() as i64;
            let row = ((self.origin_y - point.y()) / size).round() as i64;
            *counts.entry((column, row)).or_insert(0) += 1;
        }
        counts
    }

    /// Number of cells holding more than the point limit
    pub fn count_over_threshold(&self, size: i64) -> u64 {
        self.cell_counts(size).values().filter(|count| **count > self.max_points).count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgpc_core::config::ConfigOverrides;

    fn sizer() -> GridSizer {
        GridSizer::new(&SizingConfig::with_defaults()).unwrap()
    }

    fn square(side: f64) -> GridExtent {
        GridExtent::from_corners(0.0, 0.0, side, side)
    }

    #[test]
    fn test_step_oracle_prefers_larger_sizes() {
        let grid = sizer()
            .compute_patch_size(&square(1000.0), |s| Ok::<_, Infallible>(u64::from(s < 50)))
            .unwrap();
        assert!(grid.cell_size >= 50);
        assert_eq!(grid.cell_size, 201);
        assert_eq!(grid.iterations, 12);
        assert_eq!((grid.columns, grid.rows), (5, 5));
    }

    #[test]
    fn test_settles_below_crowding_threshold() {
        let grid = sizer()
            .compute_patch_size(&square(10_000.0), |s| Ok::<_, Infallible>(u64::from(s > 300)))
            .unwrap();
        assert_eq!(grid.cell_size, 300);
        assert_eq!(grid.iterations, 11);
    }

    #[test]
    fn test_always_crowded_picks_largest_minimum() {
        let grid = sizer().compute_patch_size(&square(1000.0), |_| Ok::<_, Infallible>(1)).unwrap();
        assert_eq!(grid.cell_size, 100);
        assert_eq!(grid.iterations, 9);
    }

    #[test]
    fn test_best_of_history_on_least_crowded() {
        let grid = sizer()
            .compute_patch_size(&square(1000.0), |s| Ok::<_, Infallible>((s - 25).unsigned_abs() + 1))
            .unwrap();
        assert_eq!(grid.cell_size, 25);
        assert_eq!(grid.iterations, 9);
    }

    #[test]
    fn test_small_extent_uses_fallback() {
        let mut calls = 0;
        let grid = sizer()
            .compute_patch_size(&square(5.0), |_| {
                calls += 1;
                Ok::<_, Infallible>(0)
            })
            .unwrap();
        assert_eq!(grid.cell_size, 100);
        assert_eq!(grid.iterations, 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_non_finite_extent_uses_fallback() {
        let extent = GridExtent::new(0.0, 0.0, f64::NAN, 10.0);
        let grid = sizer().compute_patch_size(&extent, |_| Ok::<_, Infallible>(0)).unwrap();
        assert_eq!(grid.cell_size, 100);
    }

    #[test]
    fn test_huge_extent_uses_fallback() {
        let extent = GridExtent::from_corners(0.0, 0.0, 1e20, 1e20);
        let grid = sizer().compute_patch_size(&extent, |_| Ok::<_, Infallible>(0)).unwrap();
        assert_eq!(grid.cell_size, 100);
        assert_eq!(grid.iterations, 0);
    }

    #[test]
    fn test_large_extent_grows_without_overflow() {
        let extent = square(1e19);
        let grid = sizer().compute_patch_size(&extent, |_| Ok::<_, Infallible>(0)).unwrap();
        assert!(grid.cell_size >= 1_000_000_000_000_000_000);
        assert!(grid.iterations > 0);
    }

    #[test]
    fn test_oracle_failure_is_fatal() {
        let err = sizer()
            .compute_patch_size(&square(1000.0), |s| {
                if s < 100 {
                    Err("connection reset")
                } else {
                    Ok(1)
                }
            })
            .unwrap_err();

        match err {
            PgpcError::OracleFailure { cell_size, reason } => {
                assert_eq!(cell_size, 50);
                assert_eq!(reason, "connection reset");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_iteration_cap() {
        let mut config = SizingConfig::with_defaults();
        config.apply_overrides(ConfigOverrides { max_iterations: Some(3), ..Default::default() });
        let sizer = GridSizer::new(&config).unwrap();

        let grid = sizer
            .compute_patch_size(&square(1000.0), |s| Ok::<_, Infallible>(u64::from(s < 50)))
            .unwrap();
        assert_eq!(grid.iterations, 3);
        assert_eq!(grid.cell_size, 175);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = SizingConfig::with_defaults();
        config.apply_overrides(ConfigOverrides { initial_divisor: Some(0), ..Default::default() });
        assert!(matches!(GridSizer::new(&config), Err(PgpcError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_extent_from_points() {
        let points = vec![
            geo::Point::new(2.0, -1.0),
            geo::Point::new(-3.0, 4.0),
            geo::Point::new(5.0, 0.0),
        ];
        let extent = GridExtent::from_points(&points).unwrap();
        assert_eq!(extent, GridExtent::new(-3.0, 4.0, 8.0, 5.0));
        assert!(GridExtent::from_points(&[]).is_none());
    }

    #[test]
    fn test_counter_snaps_to_nearest_node() {
        let points = vec![
            geo::Point::new(0.0, 10.0),
            geo::Point::new(0.4, 9.7),
            geo::Point::new(4.6, 10.0),
            geo::Point::new(5.0, 5.0),
        ];
        let extent = GridExtent::from_corners(0.0, 5.0, 5.0, 10.0);
        let counter = GridCounter::new(&points, &extent, 1);

        let counts = counter.cell_counts(5);
        assert_eq!(counts[&(0, 0)], 2);
        assert_eq!(counts[&(1, 0)], 1);
        assert_eq!(counts[&(1, 1)], 1);
        assert_eq!(counter.count_over_threshold(5), 1);
    }
}
