//! Core types, configuration, and error handling for sharelens.
//!
//! This crate provides the shared foundation used by the other sharelens crates:
//! - [`ShareLensError`]: unified error type using `thiserror`
//! - [`ShareLensConfig`]: configuration loaded from `.sharelens.toml`
//! - Shared categories: [`ModelBucket`], [`LanguageBucket`],
//!   [`UnknownModelPolicy`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{AnalysisConfig, DatasetConfig, LanguageConfig, LogitConfig, ShareLensConfig};
pub use error::ShareLensError;
pub use types::{LanguageBucket, ModelBucket, OutputFormat, UnknownModelPolicy};

/// A convenience `Result` type for sharelens operations.
pub type Result<T> = std::result::Result<T, ShareLensError>;
