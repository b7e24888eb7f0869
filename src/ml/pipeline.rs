//! Stateless pipelines behind the session's cluster and map actions

use super::composer::compose_features;
use super::interpolation::GridInterpolator;
use crate::structs::{
    ClusterAssignment, Clusterer, FieldSelection, GeoError, InterpolatedGrid, Result,
    ScatteredInterpolator, Table,
};
use tracing::debug;

/// Compose weighted features and partition the table's rows
///
/// # Errors
/// Returns error if the weight is invalid or clustering fails
pub fn run_clustering(
    table: &Table,
    n_clusters: usize,
    coordinate_weight: f64,
    clusterer: &dyn Clusterer,
    generation: u64,
) -> Result<ClusterAssignment> {
    let features = compose_features(table, coordinate_weight)?;
    debug!(
        rows = features.n_samples(),
        features = ?features.names,
        "features composed"
    );

    let labels = clusterer.fit(features.data.view(), n_clusters)?;

    if labels.len() != table.n_rows() {
        return Err(GeoError::Ml(format!(
            "{} returned {} labels for {} rows",
            clusterer.name(),
            labels.len(),
            table.n_rows()
        )));
    }

    // Calculate cluster sizes
    let mut sizes = vec![0usize; n_clusters];
    for &cluster_id in &labels {
        let slot = sizes.get_mut(cluster_id).ok_or_else(|| {
            GeoError::Ml(format!(
                "{} produced label {cluster_id} for k={n_clusters}",
                clusterer.name()
            ))
        })?;
        *slot += 1;
    }

    Ok(ClusterAssignment {
        labels,
        k: n_clusters,
        sizes,
        coordinate_weight,
        generation,
    })
}

/// Interpolate one field of the table onto the default lattice
///
/// # Errors
/// Returns error if the field is not in the table or interpolation fails
pub fn run_interpolation(
    table: &Table,
    field: FieldSelection,
    interpolator: &dyn ScatteredInterpolator,
) -> Result<InterpolatedGrid> {
    let column = field.column();
    let zs = table.column(column).ok_or_else(|| {
        GeoError::Precondition(format!(
            "Field {} (column {column}) is not in a table with {} columns",
            field.field_number(),
            table.n_cols()
        ))
    })?;

    let xs = table.xs().to_vec();
    let ys = table.ys().to_vec();

    GridInterpolator::new(interpolator).interpolate(&xs, &ys, &zs.to_vec(), column)
}
