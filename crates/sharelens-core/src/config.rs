use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ShareLensError;
use crate::types::UnknownModelPolicy;

/// Top-level configuration loaded from `.sharelens.toml`.
///
/// Supports layered resolution: CLI flags > config file > defaults.
///
/// # Examples
///
/// ```
/// use sharelens_core::ShareLensConfig;
///
/// let config = ShareLensConfig::default();
/// assert_eq!(config.analysis.min_expected_frequency, 5.0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareLensConfig {
    /// Input dataset settings.
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Language-to-bucket grouping.
    #[serde(default)]
    pub languages: LanguageConfig,
    /// Analysis behavior settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl ShareLensConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ShareLensError::FileNotFound`] if `path` does not exist,
    /// [`ShareLensError::Toml`] if the content is not valid TOML, or
    /// [`ShareLensError::Config`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ShareLensError> {
        if !path.exists() {
            return Err(ShareLensError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ShareLensError::Toml`] if parsing fails, or
    /// [`ShareLensError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharelens_core::{ShareLensConfig, UnknownModelPolicy};
    ///
    /// let toml = r#"
    /// [analysis]
    /// unknown_model = "separate"
    /// "#;
    /// let config = ShareLensConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.analysis.unknown_model, UnknownModelPolicy::Separate);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ShareLensError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ShareLensError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<(), ShareLensError> {
        let systems: HashSet<&str> = self.languages.systems.iter().map(String::as_str).collect();
        if let Some(dup) = self
            .languages
            .scripting_or_web
            .iter()
            .find(|lang| systems.contains(lang.as_str()))
        {
            return Err(ShareLensError::Config(format!(
                "language '{dup}' is listed in both systems and scripting_or_web"
            )));
        }

        let min = self.analysis.min_expected_frequency;
        if !min.is_finite() || min < 0.0 {
            return Err(ShareLensError::Config(format!(
                "min_expected_frequency must be a non-negative number, got {min}"
            )));
        }

        let logit = &self.analysis.logit;
        if logit.max_iterations == 0 {
            return Err(ShareLensError::Config(
                "logit.max_iterations must be at least 1".into(),
            ));
        }
        if logit.tolerance.is_nan() || logit.tolerance <= 0.0 {
            return Err(ShareLensError::Config(format!(
                "logit.tolerance must be positive, got {}",
                logit.tolerance
            )));
        }
        Ok(())
    }
}

/// Input dataset configuration.
///
/// # Examples
///
/// ```
/// use sharelens_core::DatasetConfig;
///
/// let config = DatasetConfig::default();
/// assert!(config.path.ends_with("20231012_233628_pr_sharings.json"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the pr_sharings JSON snapshot.
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("./snapshot_20231012/20231012_233628_pr_sharings.json")
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
        }
    }
}

/// Grouping of repository languages into buckets.
///
/// Languages are matched exactly (case-sensitive). Anything not listed falls
/// into `scripting_or_web`.
///
/// # Examples
///
/// ```
/// use sharelens_core::LanguageConfig;
///
/// let config = LanguageConfig::default();
/// assert_eq!(config.systems, vec!["C", "C++", "Rust", "Go"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Languages classified as `systems`.
    #[serde(default = "default_systems_languages")]
    pub systems: Vec<String>,
    /// Languages classified as `scripting_or_web`.
    #[serde(default = "default_scripting_languages")]
    pub scripting_or_web: Vec<String>,
}

fn default_systems_languages() -> Vec<String> {
    ["C", "C++", "Rust", "Go"].map(String::from).to_vec()
}

fn default_scripting_languages() -> Vec<String> {
    [
        "Python",
        "JavaScript",
        "Ruby",
        "PHP",
        "HTML",
        "CSS",
        "SCSS",
        "TypeScript",
        "Shell",
    ]
    .map(String::from)
    .to_vec()
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            systems: default_systems_languages(),
            scripting_or_web: default_scripting_languages(),
        }
    }
}

/// Analysis behavior configuration.
///
/// # Examples
///
/// ```
/// use sharelens_core::{AnalysisConfig, UnknownModelPolicy};
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.unknown_model, UnknownModelPolicy::AsDefault);
/// assert!(!config.strict_expected_frequency);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Treatment of rows without any transcript (default: as-default).
    #[serde(default)]
    pub unknown_model: UnknownModelPolicy,
    /// Expected cell count below which the chi-squared test is flagged (default: 5.0).
    #[serde(default = "default_min_expected_frequency")]
    pub min_expected_frequency: f64,
    /// Fail instead of warning when an expected cell is below the threshold.
    #[serde(default)]
    pub strict_expected_frequency: bool,
    /// Logistic regression solver settings.
    #[serde(default)]
    pub logit: LogitConfig,
}

fn default_min_expected_frequency() -> f64 {
    5.0
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            unknown_model: UnknownModelPolicy::default(),
            min_expected_frequency: default_min_expected_frequency(),
            strict_expected_frequency: false,
            logit: LogitConfig::default(),
        }
    }
}

/// Newton-Raphson settings for the logistic regression fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogitConfig {
    /// Maximum Newton iterations (default: 35).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence tolerance on the largest coefficient change (default: 1e-8).
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_max_iterations() -> usize {
    35
}

fn default_tolerance() -> f64 {
    1e-8
}

impl Default for LogitConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}
