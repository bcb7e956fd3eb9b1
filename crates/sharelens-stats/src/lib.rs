//! Statistical analyses over derived pull-request sharing rows.
//!
//! Three independent, read-only procedures: a Welch two-sample t-test of merge
//! rate by model, a chi-squared independence test over the
//! (language bucket, model) × outcome cross-tabulation, and a logistic
//! regression of outcome on language bucket, model, and their interaction.
//! [`report`] runs all three and renders the results.

pub mod contingency;
pub mod logit;
pub mod report;
pub mod sample;
pub mod ttest;

pub use report::{run_analysis, AnalysisReport};
