use crate::structs::{Clusterer, GeoError, Result};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::{Array1, ArrayView2};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeSet, HashMap};

pub const DEFAULT_SEED: u64 = 0;
pub const DEFAULT_MAX_ITERATIONS: u64 = 300;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_N_RUNS: usize = 10;

/// K-means (k-means++ init, Lloyd refinement) with a fixed RNG seed
#[derive(Debug, Clone)]
pub struct KMeansClusterer {
    pub seed: u64,
    pub max_iterations: u64,
    pub tolerance: f64,
    pub n_runs: usize,
}

impl Default for KMeansClusterer {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            n_runs: DEFAULT_N_RUNS,
        }
    }
}

impl Clusterer for KMeansClusterer {
    fn fit(&self, features: ArrayView2<'_, f64>, k: usize) -> Result<Vec<usize>> {
        let n_samples = features.nrows();

        if k == 0 {
            return Err(GeoError::DegenerateInput("k must be at least 1".into()));
        }

        if n_samples < k {
            return Err(GeoError::DegenerateInput(format!(
                "Cannot create {k} clusters with only {n_samples} rows"
            )));
        }

        let distinct = count_distinct_rows(features);
        if distinct < k {
            return Err(GeoError::DegenerateInput(format!(
                "Cannot create {k} clusters from {distinct} distinct feature points"
            )));
        }

        let records = features.to_owned();
        let dataset = DatasetBase::from(records.clone());

        let model = KMeans::params_with_rng(k, ChaCha8Rng::seed_from_u64(self.seed))
            .n_runs(self.n_runs)
            .max_n_iterations(self.max_iterations)
            .tolerance(self.tolerance)
            .fit(&dataset)
            .map_err(|e| GeoError::Ml(format!("K-means failed: {e}")))?;

        let predictions: Array1<usize> = model.predict(&records);

        Ok(canonical_labels(predictions.iter().copied()))
    }

    fn name(&self) -> &'static str {
        "k-means"
    }
}

/// Count rows that differ in at least one feature
fn count_distinct_rows(features: ArrayView2<'_, f64>) -> usize {
    features
        .rows()
        .into_iter()
        // +0.0 folds -0.0 into 0.0 so equal values share a bit pattern
        .map(|row| row.iter().map(|v| (v + 0.0).to_bits()).collect::<Vec<u64>>())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Renumber labels in order of first appearance so row 0 is always cluster 0
fn canonical_labels(raw: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    raw.map(|label| {
        let next = mapping.len();
        *mapping.entry(label).or_insert(next)
    })
    .collect()
}
