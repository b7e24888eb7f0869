//! Weighted feature composition for clustering
//!
//! The coordinate block is multiplied by the coordinate weight *before* it is
//! min-max scaled. Any positive weight is therefore cancelled by the scaling
//! and only a weight of 0 changes the features (coordinates collapse to 0).

use crate::structs::{
    FeatureMatrix, GeoError, Result, ScaledBlock, SessionConfig, Table, FIRST_FIELD_COLUMN,
};
use ndarray::{concatenate, Axis};

/// Build the clustering feature matrix from a table
///
/// # Errors
/// Returns error if the weight is negative or non-finite
pub fn compose_features(table: &Table, coordinate_weight: f64) -> Result<FeatureMatrix> {
    SessionConfig::validate_coordinate_weight(coordinate_weight)?;

    let weighted = &table.coordinates() * coordinate_weight;
    let coordinates = ScaledBlock::from_block(weighted.view())?;
    let fields = ScaledBlock::from_block(table.fields())?;

    let data = concatenate(Axis(1), &[coordinates.data.view(), fields.data.view()])
        .map_err(|e| GeoError::Ml(format!("Failed to assemble features: {e}")))?;

    let names = ["x".to_string(), "y".to_string()]
        .into_iter()
        .chain((1..=table.n_cols() - FIRST_FIELD_COLUMN).map(|i| format!("field{i}")))
        .collect();

    Ok(FeatureMatrix { names, data })
}
