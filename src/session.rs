//! Operator session: loaded table, last clustering and current settings
//!
//! Every operator action is one synchronous method. A successful load bumps
//! the table generation and discards the previous clustering; failed actions
//! leave the session untouched.

use crate::ml::clustering::KMeansClusterer;
use crate::ml::interpolation::interpolator_for;
use crate::ml::{output, pipeline, render};
use crate::structs::{
    ClusterAssignment, Clusterer, FieldSelection, GeoError, InterpolatedGrid,
    InterpolationMethod, Rendering, Result, ScatteredInterpolator, SessionConfig, Table,
    VisualizationType,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Table currently owned by the session
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    /// File the table came from, if any
    #[allow(dead_code)]
    pub source: Option<PathBuf>,
    pub generation: u64,
}

/// Single-operator session holding all mutable state
pub struct Session {
    loaded: Option<LoadedTable>,
    assignment: Option<ClusterAssignment>,
    config: SessionConfig,
    generation: u64,
    clusterer: Box<dyn Clusterer>,
    // Overrides the configured interpolation method when set
    interpolator: Option<Box<dyn ScatteredInterpolator>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an empty session with default settings and k-means clustering
    #[must_use]
    pub fn new() -> Self {
        Self {
            loaded: None,
            assignment: None,
            config: SessionConfig::default(),
            generation: 0,
            clusterer: Box::new(KMeansClusterer::default()),
            interpolator: None,
        }
    }

    /// Create a session with explicit settings
    ///
    /// # Errors
    /// Returns error if the configuration is out of range
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Replace the clustering strategy
    #[must_use]
    #[allow(dead_code)]
    pub fn with_clusterer(mut self, clusterer: Box<dyn Clusterer>) -> Self {
        self.clusterer = clusterer;
        self
    }

    /// Replace the interpolation strategy, ignoring `interpolation_method`
    #[must_use]
    #[allow(dead_code)]
    pub fn with_interpolator(mut self, interpolator: Box<dyn ScatteredInterpolator>) -> Self {
        self.interpolator = Some(interpolator);
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Currently loaded table
    #[must_use]
    pub fn table(&self) -> Option<&Table> {
        self.loaded.as_ref().map(|l| &l.table)
    }

    #[must_use]
    #[allow(dead_code)]
    pub fn loaded(&self) -> Option<&LoadedTable> {
        self.loaded.as_ref()
    }

    /// Clustering computed against the current table, if any
    #[must_use]
    pub fn assignment(&self) -> Option<&ClusterAssignment> {
        self.assignment
            .as_ref()
            .filter(|a| a.generation == self.generation)
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Load a table file, replacing the current table
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed; the session keeps
    /// its previous table
    pub fn load_file(&mut self, path: &Path) -> Result<&Table> {
        let table = Table::from_file(path)?;
        Ok(self.install(table, Some(path.to_path_buf())))
    }

    /// Install an already parsed table
    #[allow(dead_code)]
    pub fn load_table(&mut self, table: Table) -> &Table {
        self.install(table, None)
    }

    fn install(&mut self, table: Table, source: Option<PathBuf>) -> &Table {
        self.generation += 1;
        if self.assignment.take().is_some() {
            debug!("previous clustering invalidated by reload");
        }
        info!(
            rows = table.n_rows(),
            columns = table.n_cols(),
            generation = self.generation,
            "table loaded"
        );

        let loaded = self.loaded.insert(LoadedTable {
            table,
            source,
            generation: self.generation,
        });
        &loaded.table
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    /// Select the mapped field by table column
    ///
    /// # Errors
    /// Returns error if the column is not a field column of the loaded table
    pub fn set_field(&mut self, column: usize) -> Result<()> {
        let field = FieldSelection::from_column(column)?;
        if let Some(table) = self.table() {
            if column >= table.n_cols() {
                return Err(GeoError::Config(format!(
                    "Column {column} is not in a table with {} columns",
                    table.n_cols()
                )));
            }
        }
        self.config.field_selection = Some(field);
        Ok(())
    }

    /// Select the mapped field by operator-facing number (1 = first field)
    ///
    /// # Errors
    /// Returns error if the field number is out of range
    pub fn set_field_number(&mut self, field: usize) -> Result<()> {
        self.set_field(FieldSelection::from_field_number(field)?.column())
    }

    /// # Errors
    /// Returns error if `k` is outside [2, 10]
    pub fn set_n_clusters(&mut self, k: usize) -> Result<()> {
        SessionConfig::validate_n_clusters(k)?;
        self.config.n_clusters = k;
        Ok(())
    }

    /// # Errors
    /// Returns error for negative or non-finite weights
    pub fn set_coordinate_weight(&mut self, weight: f64) -> Result<()> {
        SessionConfig::validate_coordinate_weight(weight)?;
        self.config.coordinate_weight = weight;
        Ok(())
    }

    pub fn set_visualization_type(&mut self, visualization: VisualizationType) {
        self.config.visualization_type = visualization;
    }

    pub fn set_interpolation_method(&mut self, method: InterpolationMethod) {
        self.config.interpolation_method = method;
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    /// Cluster the loaded table with the current k and coordinate weight
    ///
    /// # Errors
    /// Returns error if no table is loaded or clustering fails; a failed run
    /// keeps the previous assignment
    pub fn cluster(&mut self) -> Result<&ClusterAssignment> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| GeoError::Precondition("No data loaded to cluster".into()))?;

        let assignment = pipeline::run_clustering(
            &loaded.table,
            self.config.n_clusters,
            self.config.coordinate_weight,
            self.clusterer.as_ref(),
            loaded.generation,
        )?;

        info!(
            algorithm = self.clusterer.name(),
            k = assignment.k,
            nonempty = assignment.n_nonempty(),
            coordinate_weight = assignment.coordinate_weight,
            "clustering complete"
        );

        Ok(self.assignment.insert(assignment))
    }

    /// Interpolate the selected field onto the 100x100 lattice
    ///
    /// # Errors
    /// Returns error if no table is loaded, no field is selected, or
    /// interpolation fails
    pub fn interpolate(&self) -> Result<InterpolatedGrid> {
        let table = self
            .table()
            .ok_or_else(|| GeoError::Precondition("No data loaded to visualize".into()))?;
        let field = self
            .config
            .field_selection
            .ok_or_else(|| GeoError::Precondition("No field selected".into()))?;

        let grid = match &self.interpolator {
            Some(custom) => pipeline::run_interpolation(table, field, custom.as_ref())?,
            None => {
                let strategy = interpolator_for(self.config.interpolation_method);
                pipeline::run_interpolation(table, field, strategy.as_ref())?
            }
        };

        info!(
            field = field.field_number(),
            no_data = grid.no_data_count(),
            "interpolation complete"
        );
        Ok(grid)
    }

    /// Interpolate and render with the current visualization type
    ///
    /// # Errors
    /// Same as [`Session::interpolate`]
    pub fn visualize(&self) -> Result<Rendering> {
        let grid = self.interpolate()?;
        Ok(render::render(grid, self.config.visualization_type))
    }

    /// Write the current clustering to `path`, returning the rows written
    ///
    /// # Errors
    /// Returns error if there is no clustering for the current table or the
    /// file cannot be written
    pub fn export_clusters(&self, path: &Path) -> Result<usize> {
        let assignment = self.assignment().ok_or_else(|| {
            GeoError::Precondition("No clustering for the current data to export".into())
        })?;

        output::write_clusters(path, assignment)?;
        info!(rows = assignment.n_rows(), path = %path.display(), "clusters exported");
        Ok(assignment.n_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::interpolation::LinearInterpolator;
    use std::fs;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    /// 3x3 lattice over 0..=2; field1 = x + y, field2 = 10 - x
    fn lattice_table() -> Table {
        let mut rows = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                let (x, y) = (f64::from(i), f64::from(j));
                rows.push(vec![x, y, x + y, 10.0 - x]);
            }
        }
        Table::from_rows(rows).expect("table")
    }

    /// Nine rows with a single field, mixing the unit square with a 0..2 lattice
    fn scenario_table() -> Table {
        Table::from_rows(vec![
            vec![0.0, 0.0, 1.0],
            vec![0.0, 1.0, 2.0],
            vec![1.0, 0.0, 3.0],
            vec![1.0, 1.0, 4.0],
            vec![0.5, 0.5, 2.5],
            vec![2.0, 0.0, 2.0],
            vec![2.0, 1.0, 3.0],
            vec![0.0, 2.0, 2.0],
            vec![2.0, 2.0, 4.0],
        ])
        .expect("table")
    }

    fn write_table_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    fn labels_for(table: Table, k: usize, weight: f64) -> Vec<usize> {
        let mut session = Session::new();
        session.load_table(table);
        session.set_n_clusters(k).expect("k");
        session.set_coordinate_weight(weight).expect("weight");
        session.cluster().expect("cluster").labels.clone()
    }

    #[test]
    fn test_scenario_two_clusters() {
        let first = labels_for(scenario_table(), 2, 1.0);
        let second = labels_for(scenario_table(), 2, 1.0);

        assert_eq!(first, second);
        assert_eq!(first.len(), 9);
        let ones = first.iter().filter(|&&l| l == 1).count();
        assert!(ones > 0 && ones < 9);
        assert!(first.iter().all(|&l| l < 2));
    }

    #[test]
    fn test_positive_weights_match_unit_weight() {
        let unit = labels_for(lattice_table(), 3, 1.0);

        for weight in [0.5, 2.0, 0.25] {
            assert_eq!(labels_for(lattice_table(), 3, weight), unit);
        }
    }

    #[test]
    fn test_slider_weights_match_unit_weight() {
        let unit = labels_for(scenario_table(), 2, 1.0);

        // Weights on the 0.02 slider grid, none of them exact in binary
        for weight in [0.02, 0.34, 1.3, 1.98] {
            assert_eq!(labels_for(scenario_table(), 2, weight), unit, "weight {weight}");
        }
    }

    #[test]
    fn test_zero_weight_ignores_coordinates() {
        // Field values repeat in two spatially separated groups
        let table = Table::from_rows(vec![
            vec![0.0, 0.0, 1.0],
            vec![0.1, 0.0, 5.0],
            vec![10.0, 10.0, 1.0],
            vec![10.1, 10.0, 5.0],
        ])
        .expect("table");

        let spatial = labels_for(table.clone(), 2, 1.0);
        let attribute = labels_for(table, 2, 0.0);

        assert_eq!(attribute, vec![0, 1, 0, 1]);
        assert_ne!(spatial, attribute);
    }

    #[test]
    fn test_export_matches_rows() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("clusters.txt");

        let mut session = Session::new();
        session.load_table(lattice_table());
        session.set_n_clusters(4).expect("k");
        session.cluster().expect("cluster");

        let written = session.export_clusters(&path).expect("export");
        assert_eq!(written, 9);

        let content = fs::read_to_string(&path).expect("read");
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("cluster"));
        let labels: Vec<usize> = lines.map(|l| l.parse().expect("label")).collect();
        assert_eq!(labels.len(), 9);
        assert!(labels.iter().all(|&l| l < 4));
    }

    #[test]
    fn test_export_requires_clustering() {
        let dir = TempDir::new().expect("temp dir");
        let mut session = Session::new();
        session.load_table(lattice_table());

        let result = session.export_clusters(&dir.path().join("clusters.txt"));
        assert!(matches!(result, Err(GeoError::Precondition(_))));
    }

    #[test]
    fn test_reload_invalidates_assignment() {
        let dir = TempDir::new().expect("temp dir");
        let mut session = Session::new();
        session.load_table(lattice_table());
        session.cluster().expect("cluster");
        assert!(session.assignment().is_some());

        session.load_table(scenario_table());
        assert!(session.assignment().is_none());
        assert!(session.export_clusters(&dir.path().join("c.txt")).is_err());
    }

    #[test]
    fn test_failed_load_keeps_table() {
        let good = write_table_file("0 0 1\n1 0 2\n0 1 3\n");
        let bad = write_table_file("0 0 1\n1 0\n");

        let mut session = Session::new();
        session.load_file(good.path()).expect("load");
        session.cluster().expect("cluster");

        assert!(session.load_file(bad.path()).is_err());
        assert_eq!(session.table().map(Table::n_rows), Some(3));
        assert!(session.assignment().is_some());
        assert_eq!(
            session.loaded().and_then(|l| l.source.as_deref()),
            Some(good.path())
        );
    }

    #[test]
    fn test_unreadable_or_ragged_file_is_load_error() {
        let good = write_table_file("0 0 1\n1 0 2\n0 1 3\n");
        let ragged = write_table_file("0,0,1\n1,0\n");

        let mut session = Session::new();
        session.load_file(good.path()).expect("load");

        let missing = session.load_file(Path::new("/nonexistent/survey.dat"));
        assert!(matches!(missing, Err(GeoError::Load(_))));
        assert!(matches!(session.load_file(ragged.path()), Err(GeoError::Load(_))));
        assert_eq!(session.table().map(Table::n_rows), Some(3));
    }

    #[test]
    fn test_cluster_requires_table() {
        let mut session = Session::new();
        assert!(matches!(session.cluster(), Err(GeoError::Precondition(_))));
    }

    #[test]
    fn test_degenerate_clustering_keeps_previous() {
        let mut session = Session::new();
        session.load_table(scenario_table());
        session.set_n_clusters(2).expect("k");
        let previous = session.cluster().expect("cluster").clone();

        // Only 9 rows: ten clusters cannot be formed
        session.set_n_clusters(10).expect("k");
        assert!(matches!(session.cluster(), Err(GeoError::DegenerateInput(_))));
        assert_eq!(session.assignment(), Some(&previous));
    }

    #[test]
    fn test_visualize_requires_field_and_data() {
        let mut session = Session::new();
        assert!(matches!(session.visualize(), Err(GeoError::Precondition(_))));

        session.load_table(lattice_table());
        assert!(matches!(session.visualize(), Err(GeoError::Precondition(_))));

        session.set_field_number(1).expect("field");
        assert!(matches!(session.visualize(), Ok(Rendering::Heatmap(_))));

        session.set_visualization_type(VisualizationType::Contour);
        assert!(matches!(session.visualize(), Ok(Rendering::Contour(_))));
    }

    #[test]
    fn test_interpolate_lattice_centre() {
        let mut session = Session::new();
        session.load_table(lattice_table());
        session.set_field_number(1).expect("field");

        let grid = session.interpolate().expect("grid");
        assert_eq!(grid.values.dim(), (100, 100));
        assert!((grid.value(50, 50).expect("centre") - 2.0).abs() < 0.2);
    }

    #[test]
    fn test_field_outside_table_rejected() {
        let mut session = Session::new();
        session.load_table(lattice_table());

        assert!(session.set_field_number(3).is_err());
        assert!(session.set_field_number(2).is_ok());
        assert_eq!(session.config().field_selection.map(FieldSelection::column), Some(3));
    }

    #[test]
    fn test_invalid_settings_leave_config() {
        let mut session = Session::new();

        assert!(session.set_n_clusters(11).is_err());
        assert!(session.set_coordinate_weight(-1.0).is_err());
        assert_eq!(session.config(), &SessionConfig::default());
    }

    #[test]
    fn test_custom_strategies() {
        struct AllZero;

        impl Clusterer for AllZero {
            fn fit(&self, features: ndarray::ArrayView2<'_, f64>, _k: usize) -> Result<Vec<usize>> {
                Ok(vec![0; features.nrows()])
            }

            fn name(&self) -> &'static str {
                "all-zero"
            }
        }

        let mut session = Session::new()
            .with_clusterer(Box::new(AllZero))
            .with_interpolator(Box::new(LinearInterpolator));
        session.load_table(lattice_table());
        session.set_field_number(2).expect("field");

        let assignment = session.cluster().expect("cluster");
        assert_eq!(assignment.n_nonempty(), 1);

        let grid = session.interpolate().expect("grid");
        // field2 = 10 - x is linear, reproduced exactly at the first cell
        assert!((grid.value(0, 0).expect("corner") - 10.0).abs() < 1e-12);
    }
}
