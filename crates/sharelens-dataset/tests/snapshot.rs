use sharelens_core::{LanguageBucket, LanguageConfig, ModelBucket, ShareLensError};
use sharelens_dataset::{derive_rows, load_sources, DatasetSummary, LanguageTable};

const SNAPSHOT: &str = r#"{
  "Sources": [
    {
      "Type": "pull request",
      "URL": "https://github.com/a/b/pull/1",
      "RepoName": "a/b",
      "RepoLanguage": "Python",
      "State": "MERGED",
      "ChatgptSharing": [{"Model": "GPT-4"}]
    },
    {
      "URL": "https://github.com/a/c/pull/2",
      "RepoName": "a/c",
      "RepoLanguage": "Kotlin",
      "State": "CLOSED",
      "ChatgptSharing": [{"Model": null}]
    },
    {
      "URL": "https://github.com/a/d/pull/3",
      "RepoLanguage": "Rust",
      "State": "OPEN",
      "ChatgptSharing": [{"Model": "Default (GPT-3.5)"}, {"Model": "GPT-4"}]
    },
    {
      "RepoLanguage": "Go",
      "State": "MERGED",
      "ChatgptSharing": []
    }
  ]
}"#;

#[test]
fn load_and_derive_snapshot_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pr_sharings.json");
    std::fs::write(&path, SNAPSHOT).unwrap();

    let records = load_sources(&path).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].repo_name.as_deref(), Some("a/b"));

    let rows = derive_rows(&records, &LanguageTable::default());
    let models: Vec<ModelBucket> = rows.iter().map(|r| r.model).collect();
    assert_eq!(
        models,
        vec![
            ModelBucket::Gpt4,
            ModelBucket::Gpt35,
            ModelBucket::Gpt35,
            ModelBucket::Unknown,
        ]
    );
    let buckets: Vec<LanguageBucket> = rows.iter().map(|r| r.language_bucket).collect();
    assert_eq!(
        buckets,
        vec![
            LanguageBucket::ScriptingOrWeb,
            LanguageBucket::ScriptingOrWeb,
            LanguageBucket::Systems,
            LanguageBucket::Systems,
        ]
    );
    let states: Vec<u8> = rows.iter().map(|r| r.state_bin).collect();
    assert_eq!(states, vec![1, 0, 0, 1]);

    let summary = DatasetSummary::from_rows(&rows);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.unknown_model, 1);
    assert_eq!(summary.merged, 2);
}

#[test]
fn custom_language_table_moves_languages() {
    let config = LanguageConfig {
        systems: vec!["Kotlin".into()],
        scripting_or_web: vec!["Rust".into()],
    };
    let records = sharelens_dataset::parse_sources(SNAPSHOT).unwrap();
    let rows = derive_rows(&records, &LanguageTable::from_config(&config));
    assert_eq!(rows[1].language_bucket, LanguageBucket::Systems);
    assert_eq!(rows[2].language_bucket, LanguageBucket::ScriptingOrWeb);
    // Go is not listed in this table
    assert_eq!(rows[3].language_bucket, LanguageBucket::ScriptingOrWeb);
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    match load_sources(&path) {
        Err(ShareLensError::FileNotFound(p)) => assert_eq!(p, path),
        other => panic!("expected FileNotFound, got {other:?}"),
    }
}

#[test]
fn truncated_file_is_a_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.json");
    std::fs::write(&path, &SNAPSHOT[..SNAPSHOT.len() / 2]).unwrap();
    assert!(matches!(
        load_sources(&path),
        Err(ShareLensError::Serialization(_))
    ));
}
