//! Running the three analyses and rendering their results.

use std::fmt;

use serde::Serialize;
use sharelens_core::{AnalysisConfig, ShareLensError, UnknownModelPolicy};
use sharelens_dataset::{DatasetSummary, DerivedRow};

use crate::contingency::{bucket_model_independence, ChiSquaredResult};
use crate::logit::{bucket_model_logit, LogitResult};
use crate::sample::AnalysisSample;
use crate::ttest::{model_t_test, TTestResult};

/// Everything one run of the analyzer produces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Counts over the full derived table, before the unknown-model policy.
    pub dataset: DatasetSummary,
    /// Policy applied to rows without a transcript.
    pub unknown_model_policy: UnknownModelPolicy,
    /// Rows dropped by the policy.
    pub excluded_unknown: usize,
    /// Merge rate of `3.5` against `4`.
    pub t_test: TTestResult,
    /// Independence of (bucket, model) and outcome.
    pub chi_squared: ChiSquaredResult,
    /// Bucket × model logistic regression.
    pub logit: LogitResult,
    /// Caveats about the validity of the results.
    pub notes: Vec<String>,
}

/// Apply the unknown-model policy to `rows` and run every analysis.
///
/// # Errors
///
/// Returns [`ShareLensError::Statistics`] if any analysis fails on the
/// sample, or if `config.strict_expected_frequency` is set and an expected
/// cell of the contingency table falls below `config.min_expected_frequency`.
///
/// # Examples
///
/// ```
/// use sharelens_core::{AnalysisConfig, LanguageBucket, ModelBucket};
/// use sharelens_dataset::DerivedRow;
/// use sharelens_stats::run_analysis;
///
/// let mut rows = Vec::new();
/// for (language_bucket, model, merged) in [
///     (LanguageBucket::ScriptingOrWeb, ModelBucket::Gpt35, 2),
///     (LanguageBucket::Systems, ModelBucket::Gpt35, 3),
///     (LanguageBucket::ScriptingOrWeb, ModelBucket::Gpt4, 1),
///     (LanguageBucket::Systems, ModelBucket::Gpt4, 2),
/// ] {
///     for i in 0..4 {
///         rows.push(DerivedRow { model, language_bucket, state_bin: u8::from(i < merged) });
///     }
/// }
/// let report = run_analysis(&rows, &AnalysisConfig::default()).unwrap();
/// assert_eq!(report.dataset.total, 16);
/// assert_eq!(report.logit.coefficients.len(), 4);
/// ```
pub fn run_analysis(
    rows: &[DerivedRow],
    config: &AnalysisConfig,
) -> Result<AnalysisReport, ShareLensError> {
    let dataset = DatasetSummary::from_rows(rows);
    let sample = AnalysisSample::new(rows, config.unknown_model);
    let mut notes = Vec::new();
    if sample.excluded > 0 {
        notes.push(format!(
            "{} rows without a transcript were excluded (unknown model policy: {})",
            sample.excluded, sample.policy
        ));
    }

    let t_test = model_t_test(&sample.rows)?;
    tracing::debug!(statistic = t_test.statistic, p = t_test.p_value, "t-test done");

    let chi_squared = bucket_model_independence(&sample.rows, config.min_expected_frequency)?;
    if !chi_squared.is_reliable() {
        let message = format!(
            "{} expected frequencies are below {}; the chi-squared approximation may be unreliable",
            chi_squared.low_expected_cells, chi_squared.min_expected_frequency
        );
        if config.strict_expected_frequency {
            return Err(ShareLensError::Statistics(message));
        }
        tracing::warn!(
            low_cells = chi_squared.low_expected_cells,
            threshold = chi_squared.min_expected_frequency,
            "low expected frequencies in contingency table"
        );
        notes.push(message);
    }

    let logit = bucket_model_logit(&sample.rows, &config.logit)?;
    if logit.quasi_separation {
        let terms = if logit.separated_terms.is_empty() {
            "some terms".to_string()
        } else {
            logit.separated_terms.join(", ")
        };
        notes.push(format!(
            "quasi-complete separation: {} of {} observations are perfectly predicted; \
             estimates for {terms} are unbounded and their standard errors are not meaningful",
            logit.perfectly_predicted, logit.n_obs
        ));
    } else if !logit.converged {
        notes.push(format!(
            "logistic regression did not converge after {} iterations",
            logit.iterations
        ));
    }

    Ok(AnalysisReport {
        dataset,
        unknown_model_policy: sample.policy,
        excluded_unknown: sample.excluded,
        t_test,
        chi_squared,
        logit,
        notes,
    })
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.t_test)?;
        writeln!(f, "{}", self.chi_squared)?;
        for note in &self.notes {
            writeln!(f, "Note: {note}")?;
        }
        writeln!(f, "{}", self.logit)
    }
}

impl AnalysisReport {
    /// Render the report as a markdown string.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Merge Rate Analysis\n\n");

        let d = &self.dataset;
        out.push_str("## Dataset\n\n");
        out.push_str("| Rows | 3.5 | 4 | Unknown | Systems | Scripting/Web | Merged |\n");
        out.push_str("|------|-----|---|---------|---------|---------------|--------|\n");
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n\n",
            d.total, d.gpt35, d.gpt4, d.unknown_model, d.systems, d.scripting_or_web, d.merged
        ));
        out.push_str(&format!(
            "**Unknown model policy:** {} ({} rows excluded)\n\n",
            self.unknown_model_policy, self.excluded_unknown
        ));

        let t = &self.t_test;
        out.push_str("## Welch t-test\n\n");
        out.push_str("| Group | n | Merge rate |\n");
        out.push_str("|-------|---|------------|\n");
        for g in [&t.group_a, &t.group_b] {
            out.push_str(&format!("| {} | {} | {:.4} |\n", g.label, g.n, g.mean));
        }
        out.push_str(&format!(
            "\n**t** = {:.4}, **df** = {:.2}, **p** = {:.4}\n\n",
            t.statistic, t.df, t.p_value
        ));

        let c = &self.chi_squared;
        out.push_str("## Chi-squared test of independence\n\n");
        out.push_str("| Bucket | Model | Observed | Expected |\n");
        out.push_str("|--------|-------|----------|----------|\n");
        for (i, (bucket, model)) in c.table.index.iter().enumerate() {
            let observed: Vec<String> = c.table.counts[i].iter().map(u64::to_string).collect();
            let expected: Vec<String> = c.expected[i].iter().map(|e| format!("{e:.2}")).collect();
            out.push_str(&format!(
                "| {bucket} | {model} | {} | {} |\n",
                observed.join(" / "),
                expected.join(" / ")
            ));
        }
        out.push_str(&format!(
            "\n**χ²** = {:.4}, **dof** = {}, **p** = {:.4}{}\n\n",
            c.statistic,
            c.dof,
            c.p_value,
            if c.yates_corrected {
                " (Yates corrected)"
            } else {
                ""
            }
        ));

        let l = &self.logit;
        out.push_str("## Logistic regression\n\n");
        out.push_str(&format!("`{}`\n\n", l.formula));
        out.push_str("| Term | Coef | Std err | z | P>\\|z\\| | 95% CI |\n");
        out.push_str("|------|------|---------|---|---------|--------|\n");
        for co in &l.coefficients {
            out.push_str(&format!(
                "| `{}` | {:.4} | {:.4} | {:.3} | {:.4} | [{:.3}, {:.3}] |\n",
                co.term, co.estimate, co.std_error, co.z, co.p_value, co.ci_lower, co.ci_upper
            ));
        }
        out.push_str(&format!(
            "\n**Observations:** {}, **Pseudo R²:** {:.4}, **Log-likelihood:** {:.3}, \
             **LLR p-value:** {:.4e}, **AIC:** {:.3}, **BIC:** {:.3}, **Converged:** {}\n",
            l.n_obs, l.pseudo_r_squared, l.log_likelihood, l.llr_p_value, l.aic, l.bic, l.converged
        ));

        if !self.notes.is_empty() {
            out.push_str("\n## Notes\n\n");
            for note in &self.notes {
                out.push_str(&format!("- {note}\n"));
            }
        }
        out
    }
}
