//! Output file writers: cluster export, map renderings and run summary

use crate::structs::{
    ClusterAssignment, ContourBands, InterpolatedGrid, Rendering, Result, SessionConfig, Table,
};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Write the cluster export: header `cluster`, then one label per row in row order
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_clusters(path: &Path, assignment: &ClusterAssignment) -> Result<()> {
    use std::fmt::Write as _;

    let mut content = String::from("cluster\n");
    for label in &assignment.labels {
        let _ = writeln!(content, "{label}");
    }

    fs::write(path, content)?;
    Ok(())
}

/// Write a heatmap raster as long-format `x,y,value`; no-data cells read `nan`
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_heatmap(path: &Path, grid: &InterpolatedGrid) -> Result<()> {
    use std::fmt::Write as _;

    let mut content = String::from("x,y,value\n");
    for (row, &y) in grid.ys.iter().enumerate() {
        for (col, &x) in grid.xs.iter().enumerate() {
            match grid.value(row, col) {
                Some(v) => {
                    let _ = writeln!(content, "{x},{y},{v}");
                }
                None => {
                    let _ = writeln!(content, "{x},{y},nan");
                }
            }
        }
    }

    fs::write(path, content)?;
    Ok(())
}

/// Write filled-contour bands as JSON
///
/// # Errors
/// Returns error if serialization or writing fails
pub fn write_contour(path: &Path, bands: &ContourBands) -> Result<()> {
    let json = serde_json::to_string_pretty(bands)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write whichever rendering a visualization produced
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_rendering(path: &Path, rendering: &Rendering) -> Result<()> {
    match rendering {
        Rendering::Heatmap(grid) => write_heatmap(path, grid),
        Rendering::Contour(bands) => write_contour(path, bands),
    }
}

/// Write the clustering summary JSON
///
/// # Errors
/// Returns error if serialization or writing fails
#[allow(clippy::cast_precision_loss)]
pub fn write_summary_json(
    path: &Path,
    table: &Table,
    assignment: &ClusterAssignment,
    config: &SessionConfig,
) -> Result<()> {
    let clusters = assignment
        .sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| ClusterEntry {
            id: i,
            size,
            percentage: (size as f64 / table.n_rows() as f64) * 100.0,
        })
        .collect();

    let output = SummaryOutput {
        row_count: table.n_rows(),
        column_count: table.n_cols(),
        field_count: table.n_fields(),
        config,
        clustering: ClusteringSummary {
            k: assignment.k,
            nonempty: assignment.n_nonempty(),
            clusters,
        },
    };

    let json = serde_json::to_string_pretty(&output)?;
    fs::write(path, json)?;
    Ok(())
}

// JSON output structures

#[derive(Serialize)]
struct SummaryOutput<'a> {
    row_count: usize,
    column_count: usize,
    field_count: usize,
    config: &'a SessionConfig,
    clustering: ClusteringSummary,
}

#[derive(Serialize)]
struct ClusteringSummary {
    k: usize,
    nonempty: usize,
    clusters: Vec<ClusterEntry>,
}

#[derive(Serialize)]
struct ClusterEntry {
    id: usize,
    size: usize,
    percentage: f64,
}
