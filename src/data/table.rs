use std::{fs::File, io, path::Path};

use csv::{ReaderBuilder, Trim};
use machine_learning::MlErr;
use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::{ForecastErr, Result};

/// A COVID survey table: an id column, the feature columns and, for training data, the
/// `tested_positive` target as the last column.
#[derive(Debug, Clone)]
pub struct CovidTable {
    headers: Vec<String>,
    ids: Vec<String>,
    features: Array2<f32>,
    targets: Option<Vec<f32>>,
}

impl CovidTable {
    /// Reads the table from a CSV file.
    pub fn from_path<P: AsRef<Path>>(path: P, has_target: bool) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(io::BufReader::new(file), has_target)
    }

    /// Reads the table from CSV data with a header row.
    ///
    /// # Arguments
    /// * `reader` - The CSV source.
    /// * `has_target` - Whether the last column is the target rather than a feature.
    pub fn from_reader<R: io::Read>(reader: R, has_target: bool) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut headers: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        let needed = if has_target { 3 } else { 2 };
        if headers.len() < needed {
            return Err(ForecastErr::TooFewColumns {
                got: headers.len(),
                needed,
            });
        }

        let width = headers.len();
        let num_features = width - needed + 1;

        let mut ids = Vec::new();
        let mut features = Vec::new();
        let mut targets = has_target.then(Vec::new);

        for (i, record) in csv_reader.records().enumerate() {
            let record = record?;
            let row = i + 1;

            if record.len() != width {
                return Err(ForecastErr::RaggedRow {
                    row,
                    got: record.len(),
                    expected: width,
                });
            }

            ids.push(record[0].to_string());

            for (j, cell) in record.iter().enumerate().skip(1) {
                let value = cell.parse::<f32>().map_err(|_| ForecastErr::InvalidCell {
                    row,
                    column: headers[j].clone(),
                    value: cell.to_string(),
                })?;

                match targets.as_mut() {
                    Some(targets) if j == width - 1 => targets.push(value),
                    _ => features.push(value),
                }
            }
        }

        if ids.is_empty() {
            return Err(ForecastErr::EmptyTable);
        }

        headers.remove(0);
        headers.truncate(num_features);

        let features =
            Array2::from_shape_vec((ids.len(), num_features), features).map_err(MlErr::from)?;

        Ok(Self {
            headers,
            ids,
            features,
            targets,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The names of the feature columns.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn targets(&self) -> Option<ArrayView1<'_, f32>> {
        self.targets.as_deref().map(ArrayView1::from)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    const TRAIN: &str = "\
id,AL,cli,tested_positive
0,1,0.5,10.5
1,0,0.25,3
";

    #[test]
    fn reads_features_and_targets() {
        let table = CovidTable::from_reader(TRAIN.as_bytes(), true).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.headers(), ["AL", "cli"]);
        assert_eq!(table.ids(), ["0", "1"]);
        assert_eq!(table.features(), array![[1., 0.5], [0., 0.25]]);
        assert_eq!(table.targets().unwrap(), array![10.5, 3.]);
    }

    #[test]
    fn without_target_every_column_is_a_feature() {
        let table = CovidTable::from_reader(TRAIN.as_bytes(), false).unwrap();

        assert_eq!(table.headers(), ["AL", "cli", "tested_positive"]);
        assert_eq!(table.features().ncols(), 3);
        assert!(table.targets().is_none());
    }

    #[test]
    fn reports_bad_cells() {
        let raw = "id,a,b\n0,1,2\n1,x,2\n";
        let err = CovidTable::from_reader(raw.as_bytes(), true).unwrap_err();

        assert!(matches!(
            err,
            ForecastErr::InvalidCell { row: 2, ref column, ref value } if column == "a" && value == "x"
        ));
    }

    #[test]
    fn reports_ragged_rows() {
        let raw = "id,a,b\n0,1,2\n1,2\n";
        let err = CovidTable::from_reader(raw.as_bytes(), true).unwrap_err();

        assert!(matches!(
            err,
            ForecastErr::RaggedRow {
                row: 2,
                got: 2,
                expected: 3
            }
        ));
    }

    #[test]
    fn rejects_empty_and_narrow_tables() {
        let err = CovidTable::from_reader("id,a,b\n".as_bytes(), true).unwrap_err();
        assert!(matches!(err, ForecastErr::EmptyTable));

        let err = CovidTable::from_reader("id,y\n0,1\n".as_bytes(), true).unwrap_err();
        assert!(matches!(err, ForecastErr::TooFewColumns { got: 2, needed: 3 }));
    }
}
