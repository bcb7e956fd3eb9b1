//! Welch two-sample t-test of merge rate between model groups.

use std::fmt;

use serde::Serialize;
use sharelens_core::{ModelBucket, ShareLensError};
use sharelens_dataset::DerivedRow;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Size, mean, and sample variance of one group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    /// Group label, e.g. `"3.5"`.
    pub label: String,
    /// Number of observations.
    pub n: usize,
    /// Sample mean.
    pub mean: f64,
    /// Sample variance with one delta degree of freedom.
    pub variance: f64,
}

impl GroupStats {
    fn from_values(label: &str, values: &[f64]) -> Result<Self, ShareLensError> {
        let n = values.len();
        if n == 0 {
            return Err(ShareLensError::Statistics(format!(
                "t-test group '{label}' is empty"
            )));
        }
        if n < 2 {
            return Err(ShareLensError::Statistics(format!(
                "t-test group '{label}' has a single observation; sample variance is undefined"
            )));
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Ok(Self {
            label: label.into(),
            n,
            mean,
            variance,
        })
    }
}

/// Result of a Welch (unequal variance) two-sample t-test.
///
/// # Examples
///
/// ```
/// use sharelens_stats::ttest::welch_t_test;
///
/// let result = welch_t_test("a", &[0.0, 1.0, 0.0, 1.0], "b", &[1.0, 0.0, 1.0, 0.0]).unwrap();
/// assert!(result.statistic.abs() < 1e-12);
/// assert!((result.p_value - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TTestResult {
    /// t statistic for `mean(a) - mean(b)`.
    pub statistic: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Welch-Satterthwaite degrees of freedom.
    pub df: f64,
    /// First group.
    pub group_a: GroupStats,
    /// Second group.
    pub group_b: GroupStats,
}

impl fmt::Display for TTestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-statistic: {}, P-value: {}", self.statistic, self.p_value)
    }
}

/// Welch's t-test on two labelled samples.
///
/// # Errors
///
/// Returns [`ShareLensError::Statistics`] if either group has fewer than two
/// observations or if both groups have zero variance.
pub fn welch_t_test(
    label_a: &str,
    a: &[f64],
    label_b: &str,
    b: &[f64],
) -> Result<TTestResult, ShareLensError> {
    let group_a = GroupStats::from_values(label_a, a)?;
    let group_b = GroupStats::from_values(label_b, b)?;

    let se_a = group_a.variance / group_a.n as f64;
    let se_b = group_b.variance / group_b.n as f64;
    let se_sum = se_a + se_b;
    if se_sum <= 0.0 {
        return Err(ShareLensError::Statistics(format!(
            "t-test groups '{}' and '{}' both have zero variance",
            group_a.label, group_b.label
        )));
    }

    let statistic = (group_a.mean - group_b.mean) / se_sum.sqrt();
    let df = se_sum.powi(2)
        / (se_a.powi(2) / (group_a.n - 1) as f64 + se_b.powi(2) / (group_b.n - 1) as f64);

    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| ShareLensError::Statistics(format!("t distribution with df={df}: {e}")))?;
    let p_value = (2.0 * dist.sf(statistic.abs())).min(1.0);

    Ok(TTestResult {
        statistic,
        p_value,
        df,
        group_a,
        group_b,
    })
}

/// Compare merge rates of model `3.5` against model `4`.
///
/// Rows of any other model bucket are not part of either group.
///
/// # Errors
///
/// See [`welch_t_test`].
pub fn model_t_test(rows: &[DerivedRow]) -> Result<TTestResult, ShareLensError> {
    let outcomes = |model: ModelBucket| -> Vec<f64> {
        rows.iter()
            .filter(|r| r.model == model)
            .map(|r| f64::from(r.state_bin))
            .collect()
    };
    let gpt35 = outcomes(ModelBucket::Gpt35);
    let gpt4 = outcomes(ModelBucket::Gpt4);
    let ignored = rows.len() - gpt35.len() - gpt4.len();
    if ignored > 0 {
        tracing::debug!(ignored, "rows outside the 3.5/4 groups skipped by t-test");
    }

    welch_t_test(
        ModelBucket::Gpt35.as_str(),
        &gpt35,
        ModelBucket::Gpt4.as_str(),
        &gpt4,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharelens_core::LanguageBucket;

    fn row(model: ModelBucket, state_bin: u8) -> DerivedRow {
        DerivedRow {
            model,
            language_bucket: LanguageBucket::ScriptingOrWeb,
            state_bin,
        }
    }

    #[test]
    fn identical_distributions_give_p_one() {
        let rows = [
            row(ModelBucket::Gpt35, 0),
            row(ModelBucket::Gpt35, 1),
            row(ModelBucket::Gpt35, 1),
            row(ModelBucket::Gpt4, 1),
            row(ModelBucket::Gpt4, 0),
            row(ModelBucket::Gpt4, 1),
        ];
        let result = model_t_test(&rows).unwrap();
        assert!(result.statistic.abs() < 1e-12);
        assert!((result.p_value - 1.0).abs() < 1e-9);
        assert_eq!(result.group_a.label, "3.5");
        assert_eq!(result.group_b.label, "4");
    }

    #[test]
    fn welch_statistic_and_df() {
        let a = [1.0, 1.0, 1.0, 0.0];
        let b = [0.0, 0.0, 0.0, 1.0];
        let result = welch_t_test("a", &a, "b", &b).unwrap();
        assert!((result.statistic - 2f64.sqrt()).abs() < 1e-12);
        assert!((result.df - 6.0).abs() < 1e-9);
        assert!(result.p_value > 0.18 && result.p_value < 0.23, "{}", result.p_value);
        assert!((result.group_a.mean - 0.75).abs() < 1e-12);
        assert!((result.group_a.variance - 0.25).abs() < 1e-12);

        let swapped = welch_t_test("b", &b, "a", &a).unwrap();
        assert!((swapped.statistic + result.statistic).abs() < 1e-12);
        assert!((swapped.p_value - result.p_value).abs() < 1e-12);
    }

    #[test]
    fn unequal_sizes_use_satterthwaite_df() {
        let a = [1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let b = [1.0, 1.0, 0.0];
        let result = welch_t_test("a", &a, "b", &b).unwrap();
        // var_a = 0.3, var_b = 1/3; se_a = 0.05, se_b = 1/9
        let se_a: f64 = 0.05;
        let se_b: f64 = 1.0 / 9.0;
        let expected_df = (se_a + se_b).powi(2) / (se_a.powi(2) / 5.0 + se_b.powi(2) / 2.0);
        assert!((result.df - expected_df).abs() < 1e-9);
        assert!(result.statistic < 0.0);
    }

    #[test]
    fn empty_group_fails() {
        let rows = [row(ModelBucket::Gpt35, 1), row(ModelBucket::Gpt35, 0)];
        let err = model_t_test(&rows).unwrap_err();
        assert!(err.to_string().contains("'4' is empty"));
    }

    #[test]
    fn single_observation_fails() {
        let err = welch_t_test("a", &[1.0], "b", &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, ShareLensError::Statistics(_)));
    }

    #[test]
    fn zero_variance_in_both_groups_fails() {
        let err = welch_t_test("a", &[1.0, 1.0], "b", &[0.0, 0.0]).unwrap_err();
        assert!(err.to_string().contains("zero variance"));
    }

    #[test]
    fn display_matches_report_line() {
        let result = welch_t_test("a", &[0.0, 1.0], "b", &[1.0, 0.0]).unwrap();
        assert!(result.to_string().starts_with("T-statistic: 0, P-value: "));
    }

    #[test]
    fn unknown_rows_are_not_grouped() {
        let rows = [
            row(ModelBucket::Gpt35, 0),
            row(ModelBucket::Gpt35, 1),
            row(ModelBucket::Gpt4, 0),
            row(ModelBucket::Gpt4, 1),
            row(ModelBucket::Unknown, 1),
        ];
        let result = model_t_test(&rows).unwrap();
        assert_eq!(result.group_a.n + result.group_b.n, 4);
    }
}
