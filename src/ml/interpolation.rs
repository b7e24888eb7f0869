//! Scattered-to-grid interpolation of one field

use crate::ml::clough_tocher::CloughTocher;
use crate::ml::triangulation::Triangulation;
use crate::structs::{GeoError, InterpolatedGrid, InterpolationMethod, Result, ScatteredInterpolator};
use ndarray::Array2;
use std::collections::HashSet;
use tracing::debug;

/// Lattice points per axis
pub const GRID_RESOLUTION: usize = 100;

/// Clough-Tocher piecewise cubic interpolation
#[derive(Debug, Clone, Copy, Default)]
pub struct CubicInterpolator;

impl ScatteredInterpolator for CubicInterpolator {
    fn interpolate(
        &self,
        xs: &[f64],
        ys: &[f64],
        zs: &[f64],
        targets: &[[f64; 2]],
    ) -> Result<Vec<f64>> {
        let (points, values) = distinct_samples(xs, ys, zs)?;
        let interpolant = CloughTocher::new(Triangulation::new(points)?, values);
        Ok(targets.iter().map(|&p| interpolant.evaluate(p)).collect())
    }

    fn name(&self) -> &'static str {
        "cubic"
    }
}

/// Barycentric (piecewise linear) interpolation
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl ScatteredInterpolator for LinearInterpolator {
    fn interpolate(
        &self,
        xs: &[f64],
        ys: &[f64],
        zs: &[f64],
        targets: &[[f64; 2]],
    ) -> Result<Vec<f64>> {
        let (points, values) = distinct_samples(xs, ys, zs)?;
        let tri = Triangulation::new(points)?;

        Ok(targets
            .iter()
            .map(|&p| match tri.locate(p) {
                Some((idx, b)) => {
                    let t = tri.triangles()[idx];
                    b[0] * values[t[0]] + b[1] * values[t[1]] + b[2] * values[t[2]]
                }
                None => f64::NAN,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Built-in strategy for a configured method
#[must_use]
pub fn interpolator_for(method: InterpolationMethod) -> Box<dyn ScatteredInterpolator> {
    match method {
        InterpolationMethod::Cubic => Box::new(CubicInterpolator),
        InterpolationMethod::Linear => Box::new(LinearInterpolator),
    }
}

/// Samples a field onto a regular lattice over the data's bounding box
pub struct GridInterpolator<'a> {
    resolution: usize,
    strategy: &'a dyn ScatteredInterpolator,
}

impl<'a> GridInterpolator<'a> {
    #[must_use]
    pub fn new(strategy: &'a dyn ScatteredInterpolator) -> Self {
        Self {
            resolution: GRID_RESOLUTION,
            strategy,
        }
    }

    /// Use a lattice other than 100x100
    #[must_use]
    #[allow(dead_code)]
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    /// Interpolate `zs` onto the lattice; `column` is recorded on the grid
    ///
    /// # Errors
    /// Returns error for mismatched inputs, a resolution below 2, or too few /
    /// collinear sample points
    pub fn interpolate(
        &self,
        xs: &[f64],
        ys: &[f64],
        zs: &[f64],
        column: usize,
    ) -> Result<InterpolatedGrid> {
        if self.resolution < 2 {
            return Err(GeoError::Config(format!(
                "Grid resolution must be at least 2, got {}",
                self.resolution
            )));
        }
        if xs.is_empty() {
            return Err(GeoError::DegenerateInput("No sample points".into()));
        }

        let (x_min, x_max) = min_max(xs);
        let (y_min, y_max) = min_max(ys);
        let grid_xs = linspace(x_min, x_max, self.resolution);
        let grid_ys = linspace(y_min, y_max, self.resolution);

        let targets: Vec<[f64; 2]> = grid_ys
            .iter()
            .flat_map(|&y| grid_xs.iter().map(move |&x| [x, y]))
            .collect();

        let sampled = self.strategy.interpolate(xs, ys, zs, &targets)?;
        let values = Array2::from_shape_vec((self.resolution, self.resolution), sampled)
            .map_err(|e| GeoError::Ml(format!("Failed to shape grid: {e}")))?;

        let grid = InterpolatedGrid {
            column,
            xs: grid_xs,
            ys: grid_ys,
            values,
        };
        debug!(
            method = self.strategy.name(),
            no_data = grid.no_data_count(),
            "grid interpolated"
        );
        Ok(grid)
    }
}

/// Check sample shapes and drop exact coordinate duplicates (first one wins)
fn distinct_samples(xs: &[f64], ys: &[f64], zs: &[f64]) -> Result<(Vec<[f64; 2]>, Vec<f64>)> {
    if xs.len() != ys.len() || xs.len() != zs.len() {
        return Err(GeoError::DegenerateInput(format!(
            "Sample arrays differ in length: x={}, y={}, z={}",
            xs.len(),
            ys.len(),
            zs.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut points = Vec::with_capacity(xs.len());
    let mut values = Vec::with_capacity(xs.len());

    for ((&x, &y), &z) in xs.iter().zip(ys).zip(zs) {
        if seen.insert(((x + 0.0).to_bits(), (y + 0.0).to_bits())) {
            points.push([x, y]);
            values.push(z);
        }
    }

    if points.len() < xs.len() {
        debug!(
            merged = xs.len() - points.len(),
            "merged coincident sample points"
        );
    }

    Ok((points, values))
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// `count` evenly spaced values from `min` to `max` inclusive
#[allow(clippy::cast_precision_loss)]
fn linspace(min: f64, max: f64, count: usize) -> Vec<f64> {
    let step = (max - min) / (count - 1) as f64;
    (0..count)
        .map(|i| if i == count - 1 { max } else { min + step * i as f64 })
        .collect()
}
