//! Loading and field derivation for pull-request sharing snapshots.
//!
//! Reads the `Sources` array of a pr_sharings JSON snapshot, validates its
//! shape, and derives one analysis row per record: the model bucket, the
//! repository language bucket, and the merged/not-merged outcome flag.

pub mod derive;
pub mod loader;

pub use derive::{
    derive_rows, extract_model, map_language_to_bucket, merge_model_values, state_bin,
    DatasetSummary, DerivedRow, LanguageTable,
};
pub use loader::{load_sources, parse_sources, Sharing, SourceRecord};
