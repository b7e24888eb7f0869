//! Consolidated public types for the geocluster crate
//!
//! This module contains all public structs, enums, and traits used across the crate.

use ndarray::{s, Array2, ArrayView1, ArrayView2};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Load error: {0}")]
    Load(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("ML error: {0}")]
    Ml(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GeoError>;

// ============================================================================
// Table Types
// ============================================================================

/// Column holding the x coordinate
pub const X_COLUMN: usize = 0;
/// Column holding the y coordinate
pub const Y_COLUMN: usize = 1;
/// First measured field column
pub const FIRST_FIELD_COLUMN: usize = 2;
/// Highest column an operator may select for mapping (field 8)
pub const MAX_FIELD_COLUMN: usize = 9;

/// Rectangular numeric table: x, y, then one column per measured field
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    data: Array2<f64>,
}

impl Table {
    /// Build a table from parsed rows
    ///
    /// # Errors
    /// Returns a load error if the rows are empty, ragged, narrower than
    /// x + y + one field, or contain non-finite values
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let Some(first) = rows.first() else {
            return Err(GeoError::Load("Table has no rows".into()));
        };
        let n_cols = first.len();

        if n_cols < FIRST_FIELD_COLUMN + 1 {
            return Err(GeoError::Load(format!(
                "Need at least {} columns (x, y, field), got {n_cols}",
                FIRST_FIELD_COLUMN + 1
            )));
        }

        let mut flat = Vec::with_capacity(n_rows * n_cols);
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(GeoError::Load(format!(
                    "Row {} has {} columns, expected {n_cols}",
                    row_idx + 1,
                    row.len()
                )));
            }
            if let Some(col_idx) = row.iter().position(|v| !v.is_finite()) {
                return Err(GeoError::Load(format!(
                    "Non-finite value at row {}, column {}",
                    row_idx + 1,
                    col_idx + 1
                )));
            }
            flat.extend(row);
        }

        let data = Array2::from_shape_vec((n_rows, n_cols), flat)
            .map_err(|e| GeoError::Load(format!("Failed to create table: {e}")))?;

        Ok(Self { data })
    }

    /// Get number of rows
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Get number of columns, coordinates included
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    /// Get number of measured field columns
    #[must_use]
    pub fn n_fields(&self) -> usize {
        self.n_cols() - FIRST_FIELD_COLUMN
    }

    /// Get a column by index
    #[must_use]
    pub fn column(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.n_cols()).then(|| self.data.column(index))
    }

    #[must_use]
    pub fn xs(&self) -> ArrayView1<'_, f64> {
        self.data.column(X_COLUMN)
    }

    #[must_use]
    pub fn ys(&self) -> ArrayView1<'_, f64> {
        self.data.column(Y_COLUMN)
    }

    /// Coordinate block (columns 0 and 1)
    #[must_use]
    pub fn coordinates(&self) -> ArrayView2<'_, f64> {
        self.data.slice(s![.., X_COLUMN..=Y_COLUMN])
    }

    /// Field block (columns 2..N-1)
    #[must_use]
    pub fn fields(&self) -> ArrayView2<'_, f64> {
        self.data.slice(s![.., FIRST_FIELD_COLUMN..])
    }
}

// ============================================================================
// ML Types
// ============================================================================

/// Min-max scaled block with the scaling parameters it was built from
#[derive(Debug, Clone)]
pub struct ScaledBlock {
    pub data: Array2<f64>,
    #[allow(dead_code)]
    pub mins: Vec<f64>,
    #[allow(dead_code)]
    pub maxs: Vec<f64>,
}

impl ScaledBlock {
    /// Get number of samples
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Get number of features
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }
}

/// Feature matrix fed to clustering: scaled coordinates followed by scaled fields
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Feature names (`x`, `y`, `field1`, ...)
    pub names: Vec<String>,
    pub data: Array2<f64>,
}

impl FeatureMatrix {
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }
}

/// Cluster label per table row, tied to the table load it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    /// Cluster label for each row, in row order
    pub labels: Vec<usize>,
    /// Requested number of clusters
    pub k: usize,
    /// Rows per cluster, indexed by label
    pub sizes: Vec<usize>,
    /// Coordinate weight used to compose the features
    pub coordinate_weight: f64,
    /// Table generation the labels belong to
    pub generation: u64,
}

impl ClusterAssignment {
    /// Get number of labelled rows
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    /// Number of clusters that received at least one row
    #[must_use]
    pub fn n_nonempty(&self) -> usize {
        self.sizes.iter().filter(|&&s| s > 0).count()
    }

    /// Get summary for operator output
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write as _;

        let mut s = format!(
            "K-means clustering with k={} (coordinate weight {:.2})\n",
            self.k, self.coordinate_weight
        );
        for (i, size) in self.sizes.iter().enumerate() {
            let _ = writeln!(s, "  Cluster {i}: {size} rows");
        }
        s
    }
}

/// One field sampled on a regular lattice; `NaN` marks cells with no data
#[derive(Debug, Clone)]
pub struct InterpolatedGrid {
    /// Table column the values come from
    pub column: usize,
    /// Lattice x positions (one per grid column)
    pub xs: Vec<f64>,
    /// Lattice y positions (one per grid row)
    pub ys: Vec<f64>,
    /// Values indexed `[row (y), col (x)]`
    pub values: Array2<f64>,
}

impl InterpolatedGrid {
    /// Value at a cell, `None` for no data or out of range
    #[must_use]
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get((row, col)).copied().filter(|v| v.is_finite())
    }

    /// Number of cells holding the no-data marker
    #[must_use]
    pub fn no_data_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Smallest and largest finite value, `None` if every cell is empty
    #[must_use]
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Filled-contour classification of a grid into value bands
#[derive(Debug, Clone, Serialize)]
pub struct ContourBands {
    pub column: usize,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    /// Band boundaries, ascending; band `i` spans `levels[i]..=levels[i + 1]`
    pub levels: Vec<f64>,
    /// Band index per cell `[row][col]`, `None` for no data
    pub bands: Vec<Vec<Option<usize>>>,
}

/// Presentation-ready output of a visualization request
#[derive(Debug, Clone)]
pub enum Rendering {
    Heatmap(InterpolatedGrid),
    Contour(ContourBands),
}

// ============================================================================
// Configuration Types
// ============================================================================

pub const MIN_CLUSTERS: usize = 2;
pub const MAX_CLUSTERS: usize = 10;
pub const DEFAULT_CLUSTERS: usize = 3;
pub const DEFAULT_COORDINATE_WEIGHT: f64 = 1.0;

/// Table column selected for mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSelection(usize);

impl FieldSelection {
    /// Select by table column index (2..=9)
    ///
    /// # Errors
    /// Returns a configuration error for columns outside the field range
    pub fn from_column(column: usize) -> Result<Self> {
        if (FIRST_FIELD_COLUMN..=MAX_FIELD_COLUMN).contains(&column) {
            Ok(Self(column))
        } else {
            Err(GeoError::Config(format!(
                "Field column must be in [{FIRST_FIELD_COLUMN}, {MAX_FIELD_COLUMN}], got {column}"
            )))
        }
    }

    /// Select by operator-facing field number (field 1 is column 2)
    ///
    /// # Errors
    /// Returns a configuration error for field numbers outside 1..=8
    pub fn from_field_number(field: usize) -> Result<Self> {
        if field == 0 {
            return Err(GeoError::Config("Field numbers start at 1".into()));
        }
        Self::from_column(field + FIRST_FIELD_COLUMN - 1)
    }

    #[must_use]
    pub fn column(self) -> usize {
        self.0
    }

    #[must_use]
    pub fn field_number(self) -> usize {
        self.0 + 1 - FIRST_FIELD_COLUMN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationType {
    #[default]
    Heatmap,
    Contour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Clough-Tocher piecewise cubic
    #[default]
    Cubic,
    /// Piecewise linear over the Delaunay triangulation
    Linear,
}

/// Operator-controlled settings consumed by the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub field_selection: Option<FieldSelection>,
    pub n_clusters: usize,
    pub coordinate_weight: f64,
    pub visualization_type: VisualizationType,
    pub interpolation_method: InterpolationMethod,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            field_selection: None,
            n_clusters: DEFAULT_CLUSTERS,
            coordinate_weight: DEFAULT_COORDINATE_WEIGHT,
            visualization_type: VisualizationType::default(),
            interpolation_method: InterpolationMethod::default(),
        }
    }
}

impl SessionConfig {
    /// # Errors
    /// Returns a configuration error if `k` is outside [2, 10]
    pub fn validate_n_clusters(k: usize) -> Result<()> {
        if (MIN_CLUSTERS..=MAX_CLUSTERS).contains(&k) {
            Ok(())
        } else {
            Err(GeoError::Config(format!(
                "n_clusters must be in [{MIN_CLUSTERS}, {MAX_CLUSTERS}], got {k}"
            )))
        }
    }

    /// # Errors
    /// Returns a configuration error for negative or non-finite weights
    pub fn validate_coordinate_weight(weight: f64) -> Result<()> {
        if weight.is_finite() && weight >= 0.0 {
            Ok(())
        } else {
            Err(GeoError::Config(format!(
                "coordinate_weight must be a non-negative number, got {weight}"
            )))
        }
    }

    /// Check every field of a config assembled outside the setters
    ///
    /// # Errors
    /// Returns the first configuration error found
    pub fn validate(&self) -> Result<()> {
        Self::validate_n_clusters(self.n_clusters)?;
        Self::validate_coordinate_weight(self.coordinate_weight)
    }
}

// ============================================================================
// Strategy Traits
// ============================================================================

/// Partitions rows of a feature matrix into a fixed number of groups
pub trait Clusterer {
    /// Return one label in `[0, n_clusters)` per feature row
    ///
    /// # Errors
    /// Returns error if the input cannot support `n_clusters` groups or the
    /// algorithm fails
    fn fit(&self, features: ArrayView2<'_, f64>, n_clusters: usize) -> Result<Vec<usize>>;

    /// Short algorithm name for logs
    fn name(&self) -> &'static str;
}

/// Estimates a field at target locations from scattered samples
pub trait ScatteredInterpolator {
    /// Interpolate `zs` sampled at `(xs, ys)` onto `targets`; targets outside
    /// the samples' convex hull get `NaN`
    ///
    /// # Errors
    /// Returns error on mismatched inputs or too few / collinear samples
    fn interpolate(
        &self,
        xs: &[f64],
        ys: &[f64],
        zs: &[f64],
        targets: &[[f64; 2]],
    ) -> Result<Vec<f64>>;

    /// Short method name for logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_from_rows() {
        let table = Table::from_rows(vec![
            vec![0.0, 0.0, 1.0, 5.0],
            vec![1.0, 2.0, 3.0, 6.0],
        ])
        .expect("build table");

        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.n_cols(), 4);
        assert_eq!(table.n_fields(), 2);
        assert_eq!(table.ys().to_vec(), vec![0.0, 2.0]);
        assert_eq!(table.fields().ncols(), 2);
        assert!(table.column(4).is_none());
    }

    #[test]
    fn test_table_rejects_bad_shapes() {
        assert!(matches!(Table::from_rows(vec![]), Err(GeoError::Load(_))));
        assert!(matches!(
            Table::from_rows(vec![vec![0.0, 1.0]]),
            Err(GeoError::Load(_))
        ));
        assert!(matches!(
            Table::from_rows(vec![vec![0.0, 1.0, 2.0], vec![0.0, 1.0]]),
            Err(GeoError::Load(_))
        ));
        assert!(matches!(
            Table::from_rows(vec![vec![0.0, 1.0, f64::NAN]]),
            Err(GeoError::Load(_))
        ));
    }

    #[test]
    fn test_field_selection() {
        let field = FieldSelection::from_field_number(1).expect("field 1");
        assert_eq!(field.column(), 2);
        assert_eq!(field.field_number(), 1);

        assert_eq!(FieldSelection::from_field_number(8).map(FieldSelection::column).ok(), Some(9));
        assert!(FieldSelection::from_field_number(0).is_err());
        assert!(FieldSelection::from_field_number(9).is_err());
        assert!(FieldSelection::from_column(1).is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(SessionConfig::default().validate().is_ok());
        assert!(SessionConfig::validate_n_clusters(1).is_err());
        assert!(SessionConfig::validate_n_clusters(11).is_err());
        assert!(SessionConfig::validate_coordinate_weight(0.0).is_ok());
        assert!(SessionConfig::validate_coordinate_weight(-0.02).is_err());
        assert!(SessionConfig::validate_coordinate_weight(f64::INFINITY).is_err());
    }

    #[test]
    fn test_cluster_assignment_summary() {
        let assignment = ClusterAssignment {
            labels: vec![0, 0, 1],
            k: 3,
            sizes: vec![2, 1, 0],
            coordinate_weight: 1.0,
            generation: 1,
        };

        assert_eq!(assignment.n_nonempty(), 2);
        assert!(assignment.summary().contains("Cluster 1: 1 rows"));
    }
}
