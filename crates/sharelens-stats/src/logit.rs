//! Binomial logistic regression with treatment-coded categorical factors.
//!
//! The model is `State_bin ~ C(RepoLanguageBucket) * C(Model)`: an intercept,
//! one indicator per non-reference level of each factor, and one indicator per
//! pair of non-reference levels. The reference level of each factor is the
//! first observed level in its natural order. Coefficients are the maximum
//! likelihood estimate found by Newton-Raphson; standard errors come from the
//! inverse of the observed information at the optimum.

use std::collections::BTreeSet;
use std::fmt;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use serde::Serialize;
use sharelens_core::{LanguageBucket, LogitConfig, ModelBucket, ShareLensError};
use sharelens_dataset::DerivedRow;
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

const DEPENDENT_VARIABLE: &str = "State_bin";
const FORMULA: &str = "State_bin ~ C(RepoLanguageBucket) * C(Model)";

/// Fitted values this close to the outcomes everywhere mean the likelihood
/// has no finite maximum.
const SEPARATION_TOLERANCE: f64 = 1e-8;

/// An observation whose Newton weight `p (1 - p)` drops below this has a
/// fitted probability of 0 or 1 to working precision.
const SATURATION_WEIGHT: f64 = 1e-8;

/// Under separation a diverging coefficient moves by about one unit per
/// Newton step, while identified ones have long since settled.
const DIVERGING_STEP: f64 = 1e-3;

/// Design matrix and response for a logistic fit.
#[derive(Debug, Clone)]
pub struct Design {
    /// Column names, one per coefficient.
    pub names: Vec<String>,
    /// `n × k` design matrix.
    pub x: DMatrix<f64>,
    /// Binary response of length `n`.
    pub y: DVector<f64>,
}

impl Design {
    /// Treatment-coded design for bucket, model, and their interaction.
    ///
    /// # Errors
    ///
    /// Returns [`ShareLensError::Statistics`] if `rows` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharelens_core::{LanguageBucket, ModelBucket};
    /// use sharelens_dataset::DerivedRow;
    /// use sharelens_stats::logit::Design;
    ///
    /// let rows: Vec<DerivedRow> = [
    ///     (LanguageBucket::ScriptingOrWeb, ModelBucket::Gpt35),
    ///     (LanguageBucket::Systems, ModelBucket::Gpt4),
    /// ]
    /// .into_iter()
    /// .map(|(language_bucket, model)| DerivedRow { model, language_bucket, state_bin: 0 })
    /// .collect();
    /// let design = Design::bucket_by_model(&rows).unwrap();
    /// assert_eq!(design.names, vec![
    ///     "Intercept",
    ///     "C(RepoLanguageBucket)[T.systems]",
    ///     "C(Model)[T.4]",
    ///     "C(RepoLanguageBucket)[T.systems]:C(Model)[T.4]",
    /// ]);
    /// ```
    pub fn bucket_by_model(rows: &[DerivedRow]) -> Result<Self, ShareLensError> {
        if rows.is_empty() {
            return Err(ShareLensError::Statistics(
                "logistic regression needs at least one observation".into(),
            ));
        }

        let buckets: Vec<LanguageBucket> = rows
            .iter()
            .map(|r| r.language_bucket)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let models: Vec<ModelBucket> = rows
            .iter()
            .map(|r| r.model)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let bucket_levels = &buckets[1..];
        let model_levels = &models[1..];

        let bucket_term = |b: LanguageBucket| format!("C(RepoLanguageBucket)[T.{b}]");
        let model_term = |m: ModelBucket| format!("C(Model)[T.{m}]");

        let mut names = vec!["Intercept".to_string()];
        names.extend(bucket_levels.iter().map(|&b| bucket_term(b)));
        names.extend(model_levels.iter().map(|&m| model_term(m)));
        for &m in model_levels {
            for &b in bucket_levels {
                names.push(format!("{}:{}", bucket_term(b), model_term(m)));
            }
        }

        let k = names.len();
        let mut x = DMatrix::zeros(rows.len(), k);
        for (i, row) in rows.iter().enumerate() {
            x[(i, 0)] = 1.0;
            let mut col = 1;
            for &b in bucket_levels {
                x[(i, col)] = indicator(row.language_bucket == b);
                col += 1;
            }
            for &m in model_levels {
                x[(i, col)] = indicator(row.model == m);
                col += 1;
            }
            for &m in model_levels {
                for &b in bucket_levels {
                    x[(i, col)] = indicator(row.language_bucket == b && row.model == m);
                    col += 1;
                }
            }
        }

        let y = DVector::from_iterator(rows.len(), rows.iter().map(|r| f64::from(r.state_bin)));
        Ok(Self { names, x, y })
    }
}

fn indicator(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

/// One row of the coefficient table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coefficient {
    /// Term name, e.g. `C(Model)[T.4]`.
    pub term: String,
    /// Estimated log-odds coefficient.
    pub estimate: f64,
    /// Standard error.
    pub std_error: f64,
    /// Wald z statistic.
    pub z: f64,
    /// Two-sided p-value of `z`.
    pub p_value: f64,
    /// Lower bound of the 95% confidence interval.
    pub ci_lower: f64,
    /// Upper bound of the 95% confidence interval.
    pub ci_upper: f64,
}

/// A fitted logistic regression and its summary statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogitResult {
    /// Name of the response column.
    pub dependent_variable: String,
    /// Model formula.
    pub formula: String,
    /// Number of observations.
    pub n_obs: usize,
    /// Model degrees of freedom (coefficients minus intercept).
    pub df_model: usize,
    /// Residual degrees of freedom.
    pub df_resid: usize,
    /// Coefficient table.
    pub coefficients: Vec<Coefficient>,
    /// Log-likelihood at the estimate.
    pub log_likelihood: f64,
    /// Log-likelihood of the intercept-only model.
    pub ll_null: f64,
    /// McFadden's pseudo R-squared.
    pub pseudo_r_squared: f64,
    /// Likelihood ratio statistic against the intercept-only model.
    pub llr: f64,
    /// p-value of the likelihood ratio statistic.
    pub llr_p_value: f64,
    /// Akaike information criterion.
    pub aic: f64,
    /// Bayesian information criterion.
    pub bic: f64,
    /// Newton iterations performed.
    pub iterations: usize,
    /// Whether the coefficient updates fell below the tolerance.
    pub converged: bool,
    /// Whether some, but not all, observations are perfectly predicted.
    /// Fitting stops at the first iteration where this is seen.
    pub quasi_separation: bool,
    /// Observations whose fitted probability saturated at 0 or 1.
    pub perfectly_predicted: usize,
    /// Terms whose estimates were still growing without bound when fitting
    /// stopped on quasi-separation.
    pub separated_terms: Vec<String>,
}

impl LogitResult {
    /// Coefficient for `term`, if the design had that column.
    pub fn coefficient(&self, term: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.term == term)
    }
}

impl fmt::Display for LogitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(78);
        let thin = "-".repeat(78);
        writeln!(f, "{:^78}", "Logit Regression Results")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Dep. Variable: {:>20}   No. Observations: {:>18}", self.dependent_variable, self.n_obs)?;
        writeln!(f, "Method: {:>27}   Df Residuals: {:>22}", "MLE", self.df_resid)?;
        writeln!(f, "Converged: {:>24}   Df Model: {:>26}", self.converged, self.df_model)?;
        writeln!(f, "Iterations: {:>23}   Pseudo R-squ.: {:>21.4}", self.iterations, self.pseudo_r_squared)?;
        writeln!(f, "Log-Likelihood: {:>19.3}   LL-Null: {:>27.3}", self.log_likelihood, self.ll_null)?;
        writeln!(f, "AIC: {:>30.3}   LLR p-value: {:>23.4e}", self.aic, self.llr_p_value)?;
        writeln!(f, "BIC: {:>30.3}", self.bic)?;
        writeln!(f, "{rule}")?;

        let width = self
            .coefficients
            .iter()
            .map(|c| c.term.len())
            .max()
            .unwrap_or(0)
            .max(9);
        writeln!(
            f,
            "{:<width$} {:>10} {:>10} {:>8} {:>8} {:>10} {:>10}",
            "", "coef", "std err", "z", "P>|z|", "[0.025", "0.975]"
        )?;
        writeln!(f, "{thin}")?;
        for c in &self.coefficients {
            writeln!(
                f,
                "{:<width$} {:>10.4} {:>10.3} {:>8.3} {:>8.3} {:>10.3} {:>10.3}",
                c.term, c.estimate, c.std_error, c.z, c.p_value, c.ci_lower, c.ci_upper
            )?;
        }
        write!(f, "{rule}")?;
        if self.quasi_separation {
            write!(
                f,
                "\n\nPossibly complete quasi-separation: a fraction {:.2} of observations can be\n\
                 perfectly predicted. This might indicate that there is complete\n\
                 quasi-separation. In this case some parameters will not be identified.",
                self.perfectly_predicted as f64 / self.n_obs as f64
            )?;
        }
        Ok(())
    }
}

/// Fit the bucket × model logistic regression on `rows`.
///
/// # Errors
///
/// See [`Design::bucket_by_model`] and [`fit`].
pub fn bucket_model_logit(
    rows: &[DerivedRow],
    config: &LogitConfig,
) -> Result<LogitResult, ShareLensError> {
    let design = Design::bucket_by_model(rows)?;
    tracing::debug!(terms = design.names.len(), n = rows.len(), "fitting logit");
    fit(&design, config)
}

/// Fit a logistic regression by Newton-Raphson.
///
/// Failing to converge within `config.max_iterations` is not an error; the
/// result reports `converged = false`. Neither is quasi-complete separation,
/// where a subset of observations (e.g. a cell in which every pull request
/// was merged) is perfectly predicted: iteration stops as soon as any fitted
/// probability saturates, and the result reports `quasi_separation = true`
/// with the affected terms in `separated_terms`.
///
/// # Errors
///
/// Returns [`ShareLensError::Statistics`] when the outcome does not vary,
/// when the information matrix is singular (a column is constant zero or
/// collinear with others), or when the outcomes are perfectly separated.
pub fn fit(design: &Design, config: &LogitConfig) -> Result<LogitResult, ShareLensError> {
    let x = &design.x;
    let y = &design.y;
    let (n, k) = x.shape();

    let positives = y.sum();
    if positives == 0.0 || positives == n as f64 {
        return Err(ShareLensError::Statistics(
            "logistic regression outcome has no variation".into(),
        ));
    }

    let mut beta = DVector::zeros(k);
    let mut iterations = 0;
    let mut converged = false;
    let mut last_step = DVector::zeros(k);

    while iterations < config.max_iterations {
        let p = probabilities(x, &beta);
        check_separation(&p, y)?;
        if saturated_mask(&p).contains(&true) {
            break;
        }

        let gradient = x.transpose() * (y - &p);
        let step = factorize(information(x, &p))?.solve(&gradient);
        beta += &step;
        iterations += 1;

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(ShareLensError::Statistics(
                "logistic regression diverged to non-finite coefficients".into(),
            ));
        }
        if step.amax() < config.tolerance {
            converged = true;
            break;
        }
        last_step = step;
    }

    let p = probabilities(x, &beta);
    check_separation(&p, y)?;
    let perfectly_predicted = saturated_mask(&p).into_iter().filter(|s| *s).count();
    if perfectly_predicted > 0 && correctly_classified(&p, y) {
        return Err(perfect_separation());
    }
    let separated_terms = if perfectly_predicted > 0 {
        diverging_terms(design, &last_step)
    } else {
        Vec::new()
    };
    if perfectly_predicted > 0 {
        tracing::warn!(
            iterations,
            perfectly_predicted,
            terms = ?separated_terms,
            "quasi-complete separation; estimates for separated terms are unbounded"
        );
    } else if converged {
        tracing::debug!(iterations, "logit converged");
    } else {
        tracing::warn!(iterations, "logistic regression did not converge");
    }

    let covariance = factorize(information(x, &p))?.inverse();

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ShareLensError::Statistics(format!("standard normal: {e}")))?;
    let z_crit = normal.inverse_cdf(0.975);

    let coefficients = design
        .names
        .iter()
        .enumerate()
        .map(|(j, term)| {
            let estimate = beta[j];
            let std_error = covariance[(j, j)].sqrt();
            let z = estimate / std_error;
            Coefficient {
                term: term.clone(),
                estimate,
                std_error,
                z,
                p_value: 2.0 * normal.sf(z.abs()),
                ci_lower: estimate - z_crit * std_error,
                ci_upper: estimate + z_crit * std_error,
            }
        })
        .collect();

    let log_likelihood = log_likelihood(x, &beta, y);
    let mean = positives / n as f64;
    let ll_null = positives * mean.ln() + (n as f64 - positives) * (1.0 - mean).ln();
    let df_model = k - 1;
    let llr = 2.0 * (log_likelihood - ll_null);
    let llr_p_value = if df_model == 0 {
        1.0
    } else {
        ChiSquared::new(df_model as f64)
            .map_err(|e| ShareLensError::Statistics(format!("chi-squared: {e}")))?
            .sf(llr.max(0.0))
    };

    Ok(LogitResult {
        dependent_variable: DEPENDENT_VARIABLE.into(),
        formula: FORMULA.into(),
        n_obs: n,
        df_model,
        df_resid: n.saturating_sub(k),
        coefficients,
        log_likelihood,
        ll_null,
        pseudo_r_squared: 1.0 - log_likelihood / ll_null,
        llr,
        llr_p_value,
        aic: -2.0 * log_likelihood + 2.0 * k as f64,
        bic: -2.0 * log_likelihood + k as f64 * (n as f64).ln(),
        iterations,
        converged,
        quasi_separation: perfectly_predicted > 0,
        perfectly_predicted,
        separated_terms,
    })
}

fn probabilities(x: &DMatrix<f64>, beta: &DVector<f64>) -> DVector<f64> {
    (x * beta).map(|eta| 1.0 / (1.0 + (-eta).exp()))
}

/// `Xᵀ W X` with `W = diag(p (1 - p))`.
fn information(x: &DMatrix<f64>, p: &DVector<f64>) -> DMatrix<f64> {
    let mut weighted = x.clone();
    for (i, mut row) in weighted.row_iter_mut().enumerate() {
        row *= p[i] * (1.0 - p[i]);
    }
    x.transpose() * weighted
}

/// `Σ y·η − log(1 + e^η)`, evaluated without overflow.
fn log_likelihood(x: &DMatrix<f64>, beta: &DVector<f64>, y: &DVector<f64>) -> f64 {
    (x * beta)
        .iter()
        .zip(y.iter())
        .map(|(eta, yi)| yi * eta - (eta.max(0.0) + (-eta.abs()).exp().ln_1p()))
        .sum()
}

fn perfect_separation() -> ShareLensError {
    ShareLensError::Statistics(
        "perfect separation detected; logistic regression estimates do not exist".into(),
    )
}

fn check_separation(p: &DVector<f64>, y: &DVector<f64>) -> Result<(), ShareLensError> {
    if (p - y).amax() < SEPARATION_TOLERANCE {
        return Err(perfect_separation());
    }
    Ok(())
}

fn saturated_mask(p: &DVector<f64>) -> Vec<bool> {
    p.iter().map(|pi| pi * (1.0 - pi) < SATURATION_WEIGHT).collect()
}

/// Every fitted probability is on the same side of 0.5 as its outcome.
fn correctly_classified(p: &DVector<f64>, y: &DVector<f64>) -> bool {
    p.iter().zip(y.iter()).all(|(pi, yi)| (*pi > 0.5) == (*yi > 0.5))
}

fn diverging_terms(design: &Design, last_step: &DVector<f64>) -> Vec<String> {
    design
        .names
        .iter()
        .zip(last_step.iter())
        .filter(|(_, step)| step.abs() > DIVERGING_STEP)
        .map(|(name, _)| name.clone())
        .collect()
}

fn factorize(information: DMatrix<f64>) -> Result<Cholesky<f64, Dyn>, ShareLensError> {
    let singular = || {
        ShareLensError::Statistics(
            "singular information matrix; a factor level combination may be unobserved".into(),
        )
    };
    let scale = information.diagonal().amax();
    if information.diagonal().iter().any(|d| *d <= scale * f64::EPSILON) {
        return Err(singular());
    }
    information.cholesky().ok_or_else(singular)
}
