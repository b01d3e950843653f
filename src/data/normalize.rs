use machine_learning::MlErr;
use ndarray::{ArrayView2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use super::STATE_COLUMNS;
use crate::{ForecastErr, Result};

/// Standardizes columns of a feature matrix to zero mean and unit deviation, using statistics
/// fitted on the training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    columns: Vec<usize>,
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Standardizer {
    /// Fits the mean and sample standard deviation of `columns` of `x`.
    ///
    /// A deviation that is zero or not finite is replaced by 1, leaving the column centered only.
    pub fn fit(x: ArrayView2<f32>, columns: Vec<usize>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(MlErr::EmptyDataset.into());
        }
        check_columns(&columns, x.ncols())?;

        let n = x.nrows() as f32;
        let (mean, std) = columns
            .iter()
            .map(|&c| {
                let col = x.column(c);
                let mean = col.sum() / n;
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / (n - 1.).max(1.);
                let std = var.sqrt();

                if std.is_finite() && std > 0. {
                    (mean, std)
                } else {
                    (mean, 1.)
                }
            })
            .unzip();

        Ok(Self { columns, mean, std })
    }

    /// The columns to standardize out of the selected feature columns: every column but the
    /// one-hot states.
    ///
    /// # Arguments
    /// * `selected` - The table column of every selected feature.
    ///
    /// # Returns
    /// Positions into `selected`.
    pub fn default_columns(selected: &[usize]) -> Vec<usize> {
        selected
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c >= STATE_COLUMNS)
            .map(|(i, _)| i)
            .collect()
    }

    /// Standardizes `x` in place.
    pub fn transform(&self, mut x: ArrayViewMut2<f32>) -> Result<()> {
        check_columns(&self.columns, x.ncols())?;

        for ((&c, &mean), &std) in self.columns.iter().zip(&self.mean).zip(&self.std) {
            x.column_mut(c).mapv_inplace(|v| (v - mean) / std);
        }

        Ok(())
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn std(&self) -> &[f32] {
        &self.std
    }

    /// Checks a deserialized standardizer is consistent with a matrix of `ncols` columns.
    pub fn validate(&self, ncols: usize) -> Result<()> {
        if self.mean.len() != self.columns.len() || self.std.len() != self.columns.len() {
            return Err(ForecastErr::CheckpointMismatch(format!(
                "standardizer has {} columns but {} means and {} deviations",
                self.columns.len(),
                self.mean.len(),
                self.std.len()
            )));
        }

        check_columns(&self.columns, ncols)
    }
}

fn check_columns(columns: &[usize], ncols: usize) -> Result<()> {
    match columns.iter().find(|&&c| c >= ncols) {
        Some(&c) => Err(ForecastErr::FeatureCountMismatch {
            got: ncols,
            expected: c + 1,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn standardizes_selected_columns() {
        let mut x = array![[1., 2., 7.], [1., 4., 7.], [1., 6., 7.]];
        let standardizer = Standardizer::fit(x.view(), vec![1, 2]).unwrap();

        assert_eq!(standardizer.mean(), [4., 7.]);
        assert_eq!(standardizer.std(), [2., 1.]);

        standardizer.transform(x.view_mut()).unwrap();
        assert_eq!(x, array![[1., -1., 0.], [1., 0., 0.], [1., 1., 0.]]);
    }

    #[test]
    fn default_columns_skip_states() {
        let selected = [0, 39, 40, 41, 45];
        assert_eq!(Standardizer::default_columns(&selected), [2, 3, 4]);
    }

    #[test]
    fn single_row_is_only_centered() {
        let x = array![[3., 5.]];
        let standardizer = Standardizer::fit(x.view(), vec![0, 1]).unwrap();
        assert_eq!(standardizer.std(), [1., 1.]);
    }

    #[test]
    fn out_of_range_columns_fail() {
        let x = array![[1., 2.]];
        assert!(Standardizer::fit(x.view(), vec![2]).is_err());

        let standardizer = Standardizer::fit(x.view(), vec![1]).unwrap();
        let mut narrow = array![[1.]];
        assert!(standardizer.transform(narrow.view_mut()).is_err());
    }

    #[test]
    fn survives_a_json_round_trip() {
        let x = array![[1., 2.], [3., 5.]];
        let standardizer = Standardizer::fit(x.view(), vec![0, 1]).unwrap();

        let raw = serde_json::to_string(&standardizer).unwrap();
        let back: Standardizer = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, standardizer);
    }
}
