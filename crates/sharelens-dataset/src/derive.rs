//! Per-record field derivation.
//!
//! Every derivation is total: missing or unrecognized inputs fall into a
//! documented default rather than failing. The one gap is a record with no
//! transcript at all, which becomes [`ModelBucket::Unknown`] and is left for
//! each analysis to handle through its [`sharelens_core::UnknownModelPolicy`].

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sharelens_core::{LanguageBucket, LanguageConfig, ModelBucket};

use crate::loader::{Sharing, SourceRecord};

/// Model labels that denote the default (3.5) model.
const DEFAULT_MODEL_LABELS: [&str; 2] = ["Default (GPT-3.5)", "Default"];

/// Pull request state counted as a positive outcome.
const MERGED_STATE: &str = "MERGED";

/// One analysis row derived from a [`SourceRecord`].
///
/// # Examples
///
/// ```
/// use sharelens_core::{LanguageBucket, ModelBucket};
/// use sharelens_dataset::DerivedRow;
///
/// let row = DerivedRow {
///     model: ModelBucket::Gpt4,
///     language_bucket: LanguageBucket::Systems,
///     state_bin: 1,
/// };
/// assert_eq!(row.state_bin, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRow {
    /// Normalized model bucket.
    pub model: ModelBucket,
    /// Coarse repository language category.
    pub language_bucket: LanguageBucket,
    /// `1` if the pull request was merged, else `0`.
    pub state_bin: u8,
}

/// Immutable lookup from exact language name to bucket.
///
/// Built once by inverting a bucket-to-languages grouping. Languages not in
/// the table map to [`LanguageBucket::ScriptingOrWeb`].
///
/// # Examples
///
/// ```
/// use sharelens_core::LanguageBucket;
/// use sharelens_dataset::LanguageTable;
///
/// let table = LanguageTable::default();
/// assert_eq!(table.bucket(Some("Rust")), LanguageBucket::Systems);
/// assert_eq!(table.bucket(Some("Haskell")), LanguageBucket::ScriptingOrWeb);
/// assert_eq!(table.bucket(None), LanguageBucket::ScriptingOrWeb);
/// ```
#[derive(Debug, Clone)]
pub struct LanguageTable {
    buckets: HashMap<String, LanguageBucket>,
}

impl LanguageTable {
    /// Build the table from a language grouping.
    pub fn from_config(config: &LanguageConfig) -> Self {
        let grouping = [
            (LanguageBucket::Systems, &config.systems),
            (LanguageBucket::ScriptingOrWeb, &config.scripting_or_web),
        ];
        let buckets = grouping
            .into_iter()
            .flat_map(|(bucket, langs)| langs.iter().map(move |lang| (lang.clone(), bucket)))
            .collect();
        Self { buckets }
    }

    /// Bucket for `language`, defaulting to `scripting_or_web`.
    pub fn bucket(&self, language: Option<&str>) -> LanguageBucket {
        language
            .and_then(|lang| self.buckets.get(lang).copied())
            .unwrap_or_default()
    }

    /// Number of languages with an explicit bucket.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the table has no explicit entries.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::from_config(&LanguageConfig::default())
    }
}

fn default_table() -> &'static LanguageTable {
    static TABLE: OnceLock<LanguageTable> = OnceLock::new();
    TABLE.get_or_init(LanguageTable::default)
}

/// The `Model` field of the first transcript, if any.
///
/// Returns `None` both for an empty list and for a first entry without a
/// model; callers that need to tell these apart must check the list.
///
/// # Examples
///
/// ```
/// use sharelens_dataset::{extract_model, Sharing};
///
/// let sharings = vec![Sharing { model: Some("GPT-4".into()) }];
/// assert_eq!(extract_model(&sharings), Some("GPT-4"));
/// assert_eq!(extract_model(&[]), None);
/// ```
pub fn extract_model(sharings: &[Sharing]) -> Option<&str> {
    sharings.first().and_then(|s| s.model.as_deref())
}

/// Collapse a raw model label into the two-valued model bucket.
///
/// `"Default (GPT-3.5)"`, `"Default"`, and `None` are the default model;
/// every other label is `4`. The bucket labels themselves (`"3.5"`, `"4"`)
/// map to their own bucket, so re-applying this to its output is a no-op.
///
/// # Examples
///
/// ```
/// use sharelens_core::ModelBucket;
/// use sharelens_dataset::merge_model_values;
///
/// assert_eq!(merge_model_values(Some("Default")), ModelBucket::Gpt35);
/// assert_eq!(merge_model_values(None), ModelBucket::Gpt35);
/// assert_eq!(merge_model_values(Some("GPT-4")), ModelBucket::Gpt4);
/// assert_eq!(merge_model_values(Some("3.5")), ModelBucket::Gpt35);
/// ```
pub fn merge_model_values(model: Option<&str>) -> ModelBucket {
    match model {
        None => ModelBucket::Gpt35,
        Some(label) if DEFAULT_MODEL_LABELS.contains(&label) => ModelBucket::Gpt35,
        Some(label) if label == ModelBucket::Gpt35.as_str() => ModelBucket::Gpt35,
        Some(_) => ModelBucket::Gpt4,
    }
}

/// Bucket for `language` using the built-in grouping.
///
/// # Examples
///
/// ```
/// use sharelens_core::LanguageBucket;
/// use sharelens_dataset::map_language_to_bucket;
///
/// assert_eq!(map_language_to_bucket(Some("C++")), LanguageBucket::Systems);
/// assert_eq!(map_language_to_bucket(Some("rust")), LanguageBucket::ScriptingOrWeb);
/// ```
pub fn map_language_to_bucket(language: Option<&str>) -> LanguageBucket {
    default_table().bucket(language)
}

/// `1` iff the pull request state is exactly `MERGED`.
pub fn state_bin(state: Option<&str>) -> u8 {
    u8::from(state == Some(MERGED_STATE))
}

/// Derive one row per record.
///
/// A record whose transcript list is absent or empty gets
/// [`ModelBucket::Unknown`]; otherwise the first transcript's model label is
/// merged with [`merge_model_values`].
pub fn derive_rows(records: &[SourceRecord], table: &LanguageTable) -> Vec<DerivedRow> {
    records
        .iter()
        .map(|record| derive_row(record, table))
        .collect()
}

fn derive_row(record: &SourceRecord, table: &LanguageTable) -> DerivedRow {
    let sharings = record.sharings();
    let model = if sharings.is_empty() {
        tracing::trace!(
            url = record.url.as_deref().unwrap_or("<no url>"),
            "record has no transcript"
        );
        ModelBucket::Unknown
    } else {
        merge_model_values(extract_model(sharings))
    };

    DerivedRow {
        model,
        language_bucket: table.bucket(record.repo_language.as_deref()),
        state_bin: state_bin(record.state.as_deref()),
    }
}

/// Row counts of a derived table.
///
/// # Examples
///
/// ```
/// use sharelens_core::{LanguageBucket, ModelBucket};
/// use sharelens_dataset::{DatasetSummary, DerivedRow};
///
/// let rows = [DerivedRow {
///     model: ModelBucket::Unknown,
///     language_bucket: LanguageBucket::ScriptingOrWeb,
///     state_bin: 0,
/// }];
/// let summary = DatasetSummary::from_rows(&rows);
/// assert_eq!(summary.unknown_model, 1);
/// assert_eq!(summary.merged, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    /// Total rows.
    pub total: usize,
    /// Rows with model `3.5`.
    pub gpt35: usize,
    /// Rows with model `4`.
    pub gpt4: usize,
    /// Rows with no transcript.
    pub unknown_model: usize,
    /// Rows in the `systems` bucket.
    pub systems: usize,
    /// Rows in the `scripting_or_web` bucket.
    pub scripting_or_web: usize,
    /// Rows whose pull request was merged.
    pub merged: usize,
}

impl DatasetSummary {
    /// Count rows by category.
    pub fn from_rows(rows: &[DerivedRow]) -> Self {
        let mut summary = Self {
            total: rows.len(),
            ..Self::default()
        };
        for row in rows {
            match row.model {
                ModelBucket::Gpt35 => summary.gpt35 += 1,
                ModelBucket::Gpt4 => summary.gpt4 += 1,
                ModelBucket::Unknown => summary.unknown_model += 1,
            }
            match row.language_bucket {
                LanguageBucket::Systems => summary.systems += 1,
                LanguageBucket::ScriptingOrWeb => summary.scripting_or_web += 1,
            }
            summary.merged += usize::from(row.state_bin);
        }
        summary
    }
}
