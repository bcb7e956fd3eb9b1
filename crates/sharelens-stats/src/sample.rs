//! Applying the unknown-model policy to a derived table.

use serde::Serialize;
use sharelens_core::UnknownModelPolicy;
use sharelens_dataset::DerivedRow;

/// Rows that take part in the analyses after the unknown-model policy.
///
/// # Examples
///
/// ```
/// use sharelens_core::{LanguageBucket, ModelBucket, UnknownModelPolicy};
/// use sharelens_dataset::DerivedRow;
/// use sharelens_stats::sample::AnalysisSample;
///
/// let rows = [
///     DerivedRow { model: ModelBucket::Gpt4, language_bucket: LanguageBucket::Systems, state_bin: 1 },
///     DerivedRow { model: ModelBucket::Unknown, language_bucket: LanguageBucket::Systems, state_bin: 0 },
/// ];
/// let sample = AnalysisSample::new(&rows, UnknownModelPolicy::Exclude);
/// assert_eq!(sample.rows.len(), 1);
/// assert_eq!(sample.excluded, 1);
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSample {
    /// Rows with their model resolved through the policy.
    pub rows: Vec<DerivedRow>,
    /// Rows dropped because their model was unknown.
    pub excluded: usize,
    /// The policy that produced this sample.
    pub policy: UnknownModelPolicy,
}

impl AnalysisSample {
    /// Resolve every row's model through `policy`, dropping rows it rejects.
    pub fn new(rows: &[DerivedRow], policy: UnknownModelPolicy) -> Self {
        let resolved: Vec<DerivedRow> = rows
            .iter()
            .filter_map(|row| {
                policy.resolve(row.model).map(|model| DerivedRow { model, ..*row })
            })
            .collect();
        let excluded = rows.len() - resolved.len();
        if excluded > 0 {
            tracing::warn!(
                excluded,
                %policy,
                "rows without a transcript were excluded from the analyses"
            );
        }
        Self {
            rows: resolved,
            excluded,
            policy,
        }
    }
}
