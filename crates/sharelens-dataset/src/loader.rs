//! Snapshot loading and shape validation.
//!
//! The snapshot is a single JSON object whose `Sources` key holds one object
//! per pull request. Only the fields the analysis reads are validated; any
//! other keys are ignored.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use sharelens_core::ShareLensError;

/// One `Sources` entry from the snapshot.
///
/// # Examples
///
/// ```
/// use sharelens_dataset::loader::SourceRecord;
///
/// let record = SourceRecord {
///     state: Some("MERGED".into()),
///     repo_language: Some("Rust".into()),
///     ..SourceRecord::default()
/// };
/// assert!(record.sharings().is_empty());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceRecord {
    /// Pull request URL, when present.
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    /// `owner/name` of the repository, when present.
    #[serde(rename = "RepoName", default)]
    pub repo_name: Option<String>,
    /// Primary repository language as reported by GitHub.
    #[serde(rename = "RepoLanguage", default)]
    pub repo_language: Option<String>,
    /// Pull request state, e.g. `MERGED`, `CLOSED`, `OPEN`.
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    /// Shared transcripts linked from the pull request.
    #[serde(rename = "ChatgptSharing", default)]
    pub chatgpt_sharing: Option<Vec<Sharing>>,
}

impl SourceRecord {
    /// The transcript entries, treating an absent or null list as empty.
    pub fn sharings(&self) -> &[Sharing] {
        self.chatgpt_sharing.as_deref().unwrap_or(&[])
    }
}

/// Metadata for one shared transcript.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sharing {
    /// Model label shown on the shared page, e.g. `"Default (GPT-3.5)"` or `"GPT-4"`.
    #[serde(rename = "Model", default)]
    pub model: Option<String>,
}

#[derive(Deserialize)]
struct Snapshot {
    #[serde(rename = "Sources")]
    sources: Vec<SourceRecord>,
}

/// Load and validate the `Sources` records of a snapshot file.
///
/// The file is read fully into memory and closed before parsing.
///
/// # Errors
///
/// Returns [`ShareLensError::FileNotFound`] if `path` does not exist,
/// [`ShareLensError::Io`] if it cannot be read, and the errors of
/// [`parse_sources`] for its content.
pub fn load_sources(path: &Path) -> Result<Vec<SourceRecord>, ShareLensError> {
    if !path.exists() {
        return Err(ShareLensError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "read snapshot");
    parse_sources(&content)
}

/// Parse and validate the `Sources` records of a snapshot document.
///
/// # Errors
///
/// Returns [`ShareLensError::Serialization`] for malformed JSON and
/// [`ShareLensError::Schema`] when the document does not have the expected
/// shape.
///
/// # Examples
///
/// ```
/// use sharelens_dataset::loader::parse_sources;
///
/// let json = r#"{"Sources": [{"State": "MERGED", "RepoLanguage": "Go", "ChatgptSharing": []}]}"#;
/// let records = parse_sources(json).unwrap();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].repo_language.as_deref(), Some("Go"));
///
/// assert!(parse_sources(r#"{"Sources": {}}"#).is_err());
/// ```
pub fn parse_sources(content: &str) -> Result<Vec<SourceRecord>, ShareLensError> {
    let document: Value = serde_json::from_str(content)?;
    validate_document(&document)?;
    let snapshot: Snapshot = serde_json::from_value(document)?;
    Ok(snapshot.sources)
}

fn validate_document(document: &Value) -> Result<(), ShareLensError> {
    let root = document
        .as_object()
        .ok_or_else(|| ShareLensError::schema("$", "object"))?;
    let sources = root
        .get("Sources")
        .ok_or_else(|| ShareLensError::schema("Sources", "array (key is missing)"))?
        .as_array()
        .ok_or_else(|| ShareLensError::schema("Sources", "array"))?;

    for (i, source) in sources.iter().enumerate() {
        let location = format!("Sources[{i}]");
        let record = source
            .as_object()
            .ok_or_else(|| ShareLensError::schema(&location, "object"))?;
        validate_record(record, &location)?;
    }
    Ok(())
}

fn validate_record(record: &Map<String, Value>, location: &str) -> Result<(), ShareLensError> {
    for key in ["URL", "RepoName", "RepoLanguage", "State"] {
        expect_optional_string(record, key, location)?;
    }

    let Some(sharings) = record.get("ChatgptSharing") else {
        return Ok(());
    };
    let sharings = match sharings {
        Value::Null => return Ok(()),
        Value::Array(items) => items,
        _ => {
            return Err(ShareLensError::schema(
                format!("{location}.ChatgptSharing"),
                "array or null",
            ))
        }
    };
    for (j, sharing) in sharings.iter().enumerate() {
        let sharing_location = format!("{location}.ChatgptSharing[{j}]");
        let sharing = sharing
            .as_object()
            .ok_or_else(|| ShareLensError::schema(&sharing_location, "object"))?;
        expect_optional_string(sharing, "Model", &sharing_location)?;
    }
    Ok(())
}

fn expect_optional_string(
    object: &Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<(), ShareLensError> {
    match object.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(ShareLensError::schema(
            format!("{location}.{key}"),
            "string or null",
        )),
    }
}
