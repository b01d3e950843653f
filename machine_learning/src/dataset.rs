use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis, concatenate, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory supervised dataset.
///
/// Every row holds one sample: its `x_size` features followed by its `y_size` targets.
#[derive(Debug, Clone)]
pub struct Dataset {
    x_size: usize,
    y_size: usize,
    data: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset` out of a flat row-major buffer.
    ///
    /// # Arguments
    /// * `data` - The samples, each one being `x_size + y_size` contiguous values.
    /// * `x_size` - The amount of features per sample.
    /// * `y_size` - The amount of targets per sample.
    ///
    /// # Returns
    /// An error if either size is zero or the buffer doesn't hold a whole number of samples.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        if x_size == 0 || y_size == 0 {
            return Err(MlErr::InvalidShape(format!(
                "a dataset needs features and targets, got x_size {x_size} and y_size {y_size}"
            )));
        }

        let row_size = x_size + y_size;
        if data.len() % row_size != 0 {
            return Err(MlErr::InvalidShape(format!(
                "dataset length ({}) is not divisible by x_size + y_size ({row_size})",
                data.len()
            )));
        }

        let data = Array2::from_shape_vec((data.len() / row_size, row_size), data)?;
        Ok(Self {
            x_size,
            y_size,
            data,
        })
    }

    /// Creates a new `Dataset` joining the features `x` and targets `y` side by side.
    pub fn from_xy(x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "target rows",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        if x.ncols() == 0 || y.ncols() == 0 {
            return Err(MlErr::InvalidShape(
                "a dataset needs features and targets".into(),
            ));
        }

        Ok(Self {
            x_size: x.ncols(),
            y_size: y.ncols(),
            data: concatenate(Axis(1), &[x, y])?,
        })
    }

    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// The features of every sample.
    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., ..self.x_size])
    }

    /// The targets of every sample.
    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., self.x_size..])
    }

    /// A mutable view of the features, e.g. for normalizing them in place.
    pub fn x_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.data.slice_mut(s![.., ..self.x_size])
    }

    /// The features and targets of the `i`-th sample.
    pub fn row(&self, i: usize) -> Option<(ArrayView1<'_, f32>, ArrayView1<'_, f32>)> {
        if i >= self.len() {
            return None;
        }

        Some(self.data.row(i).split_at(Axis(0), self.x_size))
    }

    /// Splits the dataset in two by row index: row `i` goes to the second dataset when
    /// `i % k == 0` and to the first one otherwise.
    ///
    /// # Returns
    /// A `(train, valid)` tuple, or an error if `k < 2`.
    pub fn split_by_index(&self, k: usize) -> Result<(Self, Self)> {
        if k < 2 {
            return Err(MlErr::InvalidHyperparameter(format!(
                "the validation fold modulus must be at least 2, got {k}"
            )));
        }

        let (valid, train): (Vec<usize>, Vec<usize>) = (0..self.len()).partition(|i| i % k == 0);

        Ok((self.select(&train), self.select(&valid)))
    }

    /// Shuffles the samples in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.data = self.data.select(Axis(0), &order);
    }

    /// The amount of batches of `batch_size` samples.
    ///
    /// With `drop_last` a trailing incomplete batch isn't counted, unless the dataset is smaller
    /// than a single batch, in which case the whole dataset is the only batch.
    pub fn num_batches(&self, batch_size: usize, drop_last: bool) -> usize {
        let batch_size = batch_size.max(1);
        let full = self.len() / batch_size;

        match (drop_last, self.len() % batch_size) {
            (_, 0) => full,
            (true, _) if full > 0 => full,
            _ => full + 1,
        }
    }

    /// Returns the `index`-th batch of `batch_size` samples as an `(x, y)` pair of views.
    pub fn batch(
        &self,
        index: usize,
        batch_size: usize,
    ) -> Option<(ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let start = index.checked_mul(batch_size.max(1))?;
        if start >= self.len() {
            return None;
        }

        let end = (start + batch_size.max(1)).min(self.len());
        let rows = self.data.slice(s![start..end, ..]);
        Some(rows.split_at(Axis(1), self.x_size))
    }

    /// Iterates over every batch in order.
    pub fn batches(
        &self,
        batch_size: usize,
        drop_last: bool,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        (0..self.num_batches(batch_size, drop_last)).filter_map(move |i| self.batch(i, batch_size))
    }

    fn select(&self, rows: &[usize]) -> Self {
        Self {
            x_size: self.x_size,
            y_size: self.y_size,
            data: self.data.select(Axis(0), rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn dataset(len: usize) -> Dataset {
        let data = (0..len).flat_map(|i| [i as f32, 100. + i as f32]).collect();
        Dataset::new(data, 1, 1).unwrap()
    }

    #[test]
    fn ragged_data_is_rejected() {
        assert!(Dataset::new(vec![1., 2., 3.], 1, 1).is_err());
        assert!(Dataset::new(vec![1., 2.], 2, 0).is_err());
    }

    #[test]
    fn x_and_y_views() {
        let ds = Dataset::new(vec![1., 2., 3., 4., 5., 6.], 2, 1).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.x(), array![[1., 2.], [4., 5.]]);
        assert_eq!(ds.y(), array![[3.], [6.]]);

        let (x, y) = ds.row(1).unwrap();
        assert_eq!(x, array![4., 5.]);
        assert_eq!(y, array![6.]);
        assert!(ds.row(2).is_none());
    }

    #[test]
    fn from_xy_joins_columns() {
        let x = array![[1., 2.], [3., 4.]];
        let y = array![[5.], [6.]];
        let ds = Dataset::from_xy(x.view(), y.view()).unwrap();

        assert_eq!(ds.x(), x);
        assert_eq!(ds.y(), y);
        assert!(Dataset::from_xy(x.view(), array![[1.]].view()).is_err());
    }

    #[test]
    fn every_fifth_row_is_held_out() {
        let ds = dataset(12);
        let (train, valid) = ds.split_by_index(5).unwrap();

        assert_eq!(valid.x().column(0).to_vec(), [0., 5., 10.]);
        assert_eq!(train.len(), 9);
        assert!(train.x().iter().all(|&i| i as usize % 5 != 0));
    }

    #[test]
    fn fold_must_be_at_least_two() {
        assert!(dataset(4).split_by_index(1).is_err());
        assert!(dataset(4).split_by_index(0).is_err());
    }

    #[test]
    fn shuffle_keeps_samples_together() {
        let mut ds = dataset(20);
        ds.shuffle(&mut StdRng::seed_from_u64(3));

        let mut xs: Vec<_> = ds.x().iter().map(|&x| x as usize).collect();
        assert!(ds.x().iter().zip(ds.y()).all(|(x, y)| *y == x + 100.));

        xs.sort();
        assert_eq!(xs, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn batches_respect_drop_last() {
        let ds = dataset(7);

        assert_eq!(ds.num_batches(3, true), 2);
        assert_eq!(ds.num_batches(3, false), 3);
        assert_eq!(ds.num_batches(10, true), 1);

        let sizes: Vec<_> = ds.batches(3, false).map(|(x, _)| x.nrows()).collect();
        assert_eq!(sizes, [3, 3, 1]);

        let (x, y) = ds.batch(1, 3).unwrap();
        assert_eq!(x, array![[3.], [4.], [5.]]);
        assert_eq!(y, array![[103.], [104.], [105.]]);
        assert!(ds.batch(3, 3).is_none());
    }
}
