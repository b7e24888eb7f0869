use crate::structs::{GeoError, Result, ScaledBlock};
use ndarray::{Array2, ArrayView2};

impl ScaledBlock {
    /// Min-max scale every column of a block to [0, 1] independently
    ///
    /// A constant column has no range to scale by and maps to 0 in every row.
    ///
    /// # Errors
    /// Returns error if the block has no rows
    pub fn from_block(block: ArrayView2<'_, f64>) -> Result<Self> {
        if block.nrows() == 0 {
            return Err(GeoError::DegenerateInput("Cannot scale an empty block".into()));
        }

        let n_features = block.ncols();
        let mut mins = vec![f64::MAX; n_features];
        let mut maxs = vec![f64::MIN; n_features];

        // Find min/max for each column
        for row in block.rows() {
            for (i, &val) in row.iter().enumerate() {
                mins[i] = mins[i].min(val);
                maxs[i] = maxs[i].max(val);
            }
        }

        let data = Array2::from_shape_fn(block.dim(), |(r, c)| {
            let range = maxs[c] - mins[c];
            if range > 0.0 {
                (block[[r, c]] - mins[c]) / range
            } else {
                0.0
            }
        });

        Ok(Self { data, mins, maxs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_columns_span_unit_interval() {
        let block = array![[1.0, 10.0, -3.0], [2.0, 40.0, 7.0], [3.0, 20.0, 2.0]];
        let scaled = ScaledBlock::from_block(block.view()).expect("scale");

        for col in scaled.data.columns() {
            let min = col.iter().copied().fold(f64::INFINITY, f64::min);
            let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(min.abs() < 1e-12);
            assert!((max - 1.0).abs() < 1e-12);
        }

        assert!((scaled.data[[2, 1]] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(scaled.mins, vec![1.0, 10.0, -3.0]);
        assert_eq!(scaled.maxs, vec![3.0, 40.0, 7.0]);
    }

    #[test]
    fn test_constant_column_scales_to_zero() {
        let block = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let scaled = ScaledBlock::from_block(block.view()).expect("scale");

        assert!(scaled.data.column(0).iter().all(|&v| v == 0.0));
        assert!((scaled.data[[2, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shape_preserved() {
        let block = Array2::<f64>::zeros((4, 3));
        let scaled = ScaledBlock::from_block(block.view()).expect("scale");

        assert_eq!(scaled.n_samples(), 4);
        assert_eq!(scaled.n_features(), 3);
    }

    #[test]
    fn test_empty_block_rejected() {
        let block = Array2::<f64>::zeros((0, 2));
        assert!(ScaledBlock::from_block(block.view()).is_err());
    }
}
