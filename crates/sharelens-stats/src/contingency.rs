//! Cross-tabulation and the chi-squared test of independence.
//!
//! Rows are the observed (language bucket, model) combinations in level
//! order; columns are the observed outcome values. Combinations that never
//! occur get no row, so every row and column total is positive.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use sharelens_core::{LanguageBucket, ModelBucket, ShareLensError};
use sharelens_dataset::DerivedRow;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Observed counts indexed by (bucket, model) × outcome.
///
/// # Examples
///
/// ```
/// use sharelens_core::{LanguageBucket, ModelBucket};
/// use sharelens_dataset::DerivedRow;
/// use sharelens_stats::contingency::ContingencyTable;
///
/// let rows = [
///     DerivedRow { model: ModelBucket::Gpt4, language_bucket: LanguageBucket::Systems, state_bin: 1 },
///     DerivedRow { model: ModelBucket::Gpt4, language_bucket: LanguageBucket::Systems, state_bin: 0 },
/// ];
/// let table = ContingencyTable::from_rows(&rows);
/// assert_eq!(table.counts, vec![vec![1, 1]]);
/// assert_eq!(table.columns, vec![0, 1]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContingencyTable {
    /// Row index: (language bucket, model).
    pub index: Vec<(LanguageBucket, ModelBucket)>,
    /// Column index: outcome values.
    pub columns: Vec<u8>,
    /// `counts[i][j]` = rows with `index[i]` and outcome `columns[j]`.
    pub counts: Vec<Vec<u64>>,
}

impl ContingencyTable {
    /// Cross-tabulate derived rows.
    pub fn from_rows(rows: &[DerivedRow]) -> Self {
        let mut cells: BTreeMap<(LanguageBucket, ModelBucket), BTreeMap<u8, u64>> = BTreeMap::new();
        let mut columns: BTreeSet<u8> = BTreeSet::new();
        for row in rows {
            *cells
                .entry((row.language_bucket, row.model))
                .or_default()
                .entry(row.state_bin)
                .or_default() += 1;
            columns.insert(row.state_bin);
        }

        let columns: Vec<u8> = columns.into_iter().collect();
        let index: Vec<_> = cells.keys().copied().collect();
        let counts = cells
            .values()
            .map(|by_outcome| {
                columns
                    .iter()
                    .map(|c| by_outcome.get(c).copied().unwrap_or(0))
                    .collect()
            })
            .collect();

        Self {
            index,
            columns,
            counts,
        }
    }

    /// Build an unlabelled table from raw counts; columns are numbered from 0.
    ///
    /// # Errors
    ///
    /// Returns [`ShareLensError::Statistics`] if the rows differ in length or
    /// there are more than 256 columns.
    pub fn from_counts(counts: Vec<Vec<u64>>) -> Result<Self, ShareLensError> {
        let width = counts.first().map_or(0, Vec::len);
        check_rectangular(&counts, width)?;
        let columns = (0..width)
            .map(u8::try_from)
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| {
                ShareLensError::Statistics(format!(
                    "contingency table has {width} columns; at most 256 are supported"
                ))
            })?;
        Ok(Self {
            index: Vec::new(),
            columns,
            counts,
        })
    }

    fn row_totals(&self) -> Vec<f64> {
        self.counts
            .iter()
            .map(|r| r.iter().sum::<u64>() as f64)
            .collect()
    }

    fn column_totals(&self) -> Vec<f64> {
        (0..self.columns.len())
            .map(|j| self.counts.iter().map(|r| r[j]).sum::<u64>() as f64)
            .collect()
    }
}

fn check_rectangular(counts: &[Vec<u64>], width: usize) -> Result<(), ShareLensError> {
    if let Some((i, row)) = counts.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(ShareLensError::Statistics(format!(
            "contingency table row {i} has {} cells, expected {width}",
            row.len()
        )));
    }
    Ok(())
}

/// Result of a chi-squared test of independence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChiSquaredResult {
    /// Test statistic.
    pub statistic: f64,
    /// Upper-tail p-value.
    pub p_value: f64,
    /// Degrees of freedom, `(rows - 1) * (columns - 1)`.
    pub dof: usize,
    /// Expected frequencies under independence, same shape as the table.
    pub expected: Vec<Vec<f64>>,
    /// Whether Yates' continuity correction was applied.
    pub yates_corrected: bool,
    /// Number of expected cells below `min_expected_frequency`.
    pub low_expected_cells: usize,
    /// Threshold used to flag low expected cells.
    pub min_expected_frequency: f64,
    /// The table the test was computed on.
    pub table: ContingencyTable,
}

impl ChiSquaredResult {
    /// Whether every expected cell meets the validity threshold.
    pub fn is_reliable(&self) -> bool {
        self.low_expected_cells == 0
    }
}

impl fmt::Display for ChiSquaredResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chi-squared: {}, P-value: {}, Degrees of freedom: {}, Expected frequencies: [",
            self.statistic, self.p_value, self.dof
        )?;
        for (i, row) in self.expected.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            let cells: Vec<String> = row.iter().map(|e| format!("{e:.4}")).collect();
            write!(f, "[{}]", cells.join(" "))?;
        }
        write!(f, "]")
    }
}

/// Chi-squared test of independence on `table`.
///
/// Yates' continuity correction is applied when there is exactly one degree
/// of freedom. Expected cells below `min_expected_frequency` are counted in
/// the result.
///
/// # Errors
///
/// Returns [`ShareLensError::Statistics`] if a row's length differs from the
/// number of columns, if the table has fewer than two rows or columns, or if
/// any row or column sums to zero.
///
/// # Examples
///
/// ```
/// use sharelens_stats::contingency::{chi2_contingency, ContingencyTable};
///
/// let table = ContingencyTable::from_counts(vec![vec![2, 2], vec![4, 4], vec![1, 1]]).unwrap();
/// let result = chi2_contingency(table, 5.0).unwrap();
/// assert!(result.statistic.abs() < 1e-12);
/// assert_eq!(result.dof, 2);
/// ```
pub fn chi2_contingency(
    table: ContingencyTable,
    min_expected_frequency: f64,
) -> Result<ChiSquaredResult, ShareLensError> {
    let n_rows = table.counts.len();
    let n_cols = table.columns.len();
    check_rectangular(&table.counts, n_cols)?;
    if n_rows < 2 || n_cols < 2 {
        return Err(ShareLensError::Statistics(format!(
            "contingency table is {n_rows}x{n_cols}; need at least 2x2 for a chi-squared test"
        )));
    }

    let row_totals = table.row_totals();
    let col_totals = table.column_totals();
    if row_totals.iter().chain(&col_totals).any(|t| *t == 0.0) {
        return Err(ShareLensError::Statistics(
            "contingency table has an empty row or column".into(),
        ));
    }
    let n: f64 = row_totals.iter().sum();

    let expected: Vec<Vec<f64>> = row_totals
        .iter()
        .map(|r| col_totals.iter().map(|c| r * c / n).collect())
        .collect();

    let dof = (n_rows - 1) * (n_cols - 1);
    let yates_corrected = dof == 1;

    let mut statistic = 0.0;
    for (observed_row, expected_row) in table.counts.iter().zip(&expected) {
        for (&observed, &expected) in observed_row.iter().zip(expected_row) {
            let mut diff = (observed as f64 - expected).abs();
            if yates_corrected {
                diff = (diff - 0.5).max(0.0);
            }
            statistic += diff * diff / expected;
        }
    }

    let dist = ChiSquared::new(dof as f64)
        .map_err(|e| ShareLensError::Statistics(format!("chi-squared with dof={dof}: {e}")))?;
    let p_value = dist.sf(statistic);

    let low_expected_cells = expected
        .iter()
        .flatten()
        .filter(|e| **e < min_expected_frequency)
        .count();

    Ok(ChiSquaredResult {
        statistic,
        p_value,
        dof,
        expected,
        yates_corrected,
        low_expected_cells,
        min_expected_frequency,
        table,
    })
}

/// Cross-tabulate `rows` by (bucket, model) × outcome and test independence.
///
/// # Errors
///
/// See [`chi2_contingency`].
pub fn bucket_model_independence(
    rows: &[DerivedRow],
    min_expected_frequency: f64,
) -> Result<ChiSquaredResult, ShareLensError> {
    let table = ContingencyTable::from_rows(rows);
    tracing::debug!(
        rows = table.index.len(),
        columns = table.columns.len(),
        "built contingency table"
    );
    chi2_contingency(table, min_expected_frequency)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(cells: &[(LanguageBucket, ModelBucket, u8, usize)]) -> Vec<DerivedRow> {
        cells.iter()
            .flat_map(|&(language_bucket, model, state_bin, count)| {
                std::iter::repeat(DerivedRow {
                    model,
                    language_bucket,
                    state_bin,
                })
                .take(count)
            })
            .collect()
    }

    #[test]
    fn crosstab_orders_rows_by_bucket_then_model() {
        use LanguageBucket::{ScriptingOrWeb, Systems};
        use ModelBucket::{Gpt35, Gpt4};

        let data = rows(&[
            (Systems, Gpt4, 1, 2),
            (ScriptingOrWeb, Gpt4, 0, 1),
            (Systems, Gpt35, 0, 3),
            (ScriptingOrWeb, Gpt35, 1, 4),
        ]);
        let table = ContingencyTable::from_rows(&data);
        assert_eq!(
            table.index,
            vec![
                (ScriptingOrWeb, Gpt35),
                (ScriptingOrWeb, Gpt4),
                (Systems, Gpt35),
                (Systems, Gpt4),
            ]
        );
        assert_eq!(table.columns, vec![0, 1]);
        assert_eq!(
            table.counts,
            vec![vec![0, 4], vec![1, 0], vec![3, 0], vec![0, 2]]
        );
    }

    #[test]
    fn unobserved_combinations_get_no_row() {
        use LanguageBucket::ScriptingOrWeb;
        use ModelBucket::{Gpt35, Gpt4};

        let data = rows(&[(ScriptingOrWeb, Gpt35, 1, 1), (ScriptingOrWeb, Gpt4, 0, 1)]);
        let table = ContingencyTable::from_rows(&data);
        assert_eq!(table.index.len(), 2);
    }

    #[test]
    fn proportional_table_has_zero_statistic() {
        let table = ContingencyTable::from_counts(vec![
            vec![2, 2],
            vec![4, 4],
            vec![1, 1],
            vec![3, 3],
        ])
        .unwrap();
        let result = chi2_contingency(table, 5.0).unwrap();
        assert!(result.statistic.abs() < 1e-12);
        assert!((result.p_value - 1.0).abs() < 1e-9);
        assert_eq!(result.dof, 3);
        assert!(!result.yates_corrected);
        assert!((result.expected[1][0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn two_by_two_applies_yates_correction() {
        let table = ContingencyTable::from_counts(vec![vec![10, 20], vec![20, 10]]).unwrap();
        let result = chi2_contingency(table, 5.0).unwrap();
        assert!(result.yates_corrected);
        assert_eq!(result.dof, 1);
        // |o - e| = 5, corrected to 4.5; 4 * 4.5^2 / 15
        assert!((result.statistic - 5.4).abs() < 1e-12);
        assert!(result.p_value > 0.015 && result.p_value < 0.025, "{}", result.p_value);
        assert!(result.is_reliable());
    }

    #[test]
    fn uncorrected_statistic_for_larger_tables() {
        let table = ContingencyTable::from_counts(vec![vec![10, 20], vec![20, 10], vec![15, 15]]).unwrap();
        let result = chi2_contingency(table, 5.0).unwrap();
        // expected 15 everywhere; deviations 5,5,5,5,0,0
        assert!((result.statistic - 4.0 * 25.0 / 15.0).abs() < 1e-12);
        assert_eq!(result.dof, 2);
        // chi2(2) survival is exp(-x/2)
        assert!((result.p_value - (-result.statistic / 2.0).exp()).abs() < 1e-8);
    }

    #[test]
    fn low_expected_cells_are_counted() {
        let table = ContingencyTable::from_counts(vec![vec![1, 3], vec![3, 1], vec![10, 10]]).unwrap();
        let result = chi2_contingency(table, 5.0).unwrap();
        // expected: rows of 4 split 14/28 and 14/28 -> 2.0 each
        assert_eq!(result.low_expected_cells, 4);
        assert!(!result.is_reliable());
    }

    #[test]
    fn display_lists_expected_matrix() {
        let table = ContingencyTable::from_counts(vec![vec![1, 1], vec![2, 2]]).unwrap();
        let line = chi2_contingency(table, 5.0).unwrap().to_string();
        assert!(line.starts_with("Chi-squared: 0, P-value: "));
        assert!(line.contains("Degrees of freedom: 1,"));
        assert!(line.ends_with("Expected frequencies: [[1.0000 1.0000] [2.0000 2.0000]]"));
    }

    #[test]
    fn single_column_fails() {
        let table = ContingencyTable::from_counts(vec![vec![3], vec![4]]).unwrap();
        assert!(matches!(
            chi2_contingency(table, 5.0),
            Err(ShareLensError::Statistics(_))
        ));
    }

    #[test]
    fn single_row_fails() {
        let table = ContingencyTable::from_counts(vec![vec![3, 4]]).unwrap();
        assert!(chi2_contingency(table, 5.0).is_err());
    }

    #[test]
    fn empty_column_fails() {
        let table = ContingencyTable::from_counts(vec![vec![3, 0], vec![4, 0]]).unwrap();
        let err = chi2_contingency(table, 5.0).unwrap_err();
        assert!(err.to_string().contains("empty row or column"));
    }

    #[test]
    fn jagged_counts_are_rejected() {
        let err = ContingencyTable::from_counts(vec![vec![1, 2], vec![3]]).unwrap_err();
        assert!(err.to_string().contains("row 1 has 1 cells"), "{err}");
    }

    #[test]
    fn jagged_table_fails_the_test_instead_of_panicking() {
        let table = ContingencyTable {
            index: Vec::new(),
            columns: vec![0, 1],
            counts: vec![vec![1, 2], vec![3]],
        };
        assert!(matches!(
            chi2_contingency(table, 5.0),
            Err(ShareLensError::Statistics(_))
        ));
    }

    #[test]
    fn too_many_columns_are_rejected() {
        let wide = vec![vec![1; 300], vec![1; 300]];
        assert!(ContingencyTable::from_counts(wide).is_err());
        let widest = vec![vec![1; 256], vec![1; 256]];
        assert_eq!(ContingencyTable::from_counts(widest).unwrap().columns.len(), 256);
    }
}
