//! Presentation data for the two map renderings

use crate::structs::{ContourBands, InterpolatedGrid, Rendering, VisualizationType};

/// Filled-contour bands per map
pub const DEFAULT_CONTOUR_BANDS: usize = 8;

/// Turn an interpolated grid into the requested rendering
#[must_use]
pub fn render(grid: InterpolatedGrid, visualization: VisualizationType) -> Rendering {
    match visualization {
        VisualizationType::Heatmap => Rendering::Heatmap(grid),
        VisualizationType::Contour => Rendering::Contour(contour_bands(&grid, DEFAULT_CONTOUR_BANDS)),
    }
}

/// Classify every cell into one of `n_bands` evenly spaced value bands
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn contour_bands(grid: &InterpolatedGrid, n_bands: usize) -> ContourBands {
    let n_bands = n_bands.max(1);

    let range = grid.finite_range();

    let levels = match range {
        None => Vec::new(),
        Some((lo, hi)) if hi > lo => {
            let step = (hi - lo) / n_bands as f64;
            (0..=n_bands)
                .map(|i| if i == n_bands { hi } else { lo + step * i as f64 })
                .collect()
        }
        // Flat field: a single band
        Some((lo, hi)) => vec![lo, hi],
    };

    let classify = |v: f64| -> usize {
        match range {
            Some((lo, hi)) if hi > lo => {
                (((v - lo) / (hi - lo) * n_bands as f64).floor() as usize).min(n_bands - 1)
            }
            _ => 0,
        }
    };

    let bands = grid
        .values
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .map(|&v| v.is_finite().then(|| classify(v)))
                .collect()
        })
        .collect();

    ContourBands {
        column: grid.column,
        xs: grid.xs.clone(),
        ys: grid.ys.clone(),
        levels,
        bands,
    }
}
