use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which model family a sharing's transcript was produced with.
///
/// Variant order is the level order used by grouping and regression coding:
/// `3.5 < 4 < unknown`.
///
/// # Examples
///
/// ```
/// use sharelens_core::ModelBucket;
///
/// assert_eq!(ModelBucket::Gpt4.to_string(), "4");
/// assert!(ModelBucket::Gpt35 < ModelBucket::Gpt4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelBucket {
    /// The default model (`"Default"`, `"Default (GPT-3.5)"`, or unset).
    #[serde(rename = "3.5")]
    Gpt35,
    /// Any explicitly selected non-default model.
    #[serde(rename = "4")]
    Gpt4,
    /// The record carried no transcript entries at all.
    #[serde(rename = "unknown")]
    Unknown,
}

impl ModelBucket {
    /// The label used in reports and regression term names.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelBucket::Gpt35 => "3.5",
            ModelBucket::Gpt4 => "4",
            ModelBucket::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ModelBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category of a repository's primary language.
///
/// Variants are declared in label order (`scripting_or_web` sorts before
/// `systems`) so the derived `Ord` matches lexicographic level ordering.
///
/// # Examples
///
/// ```
/// use sharelens_core::LanguageBucket;
///
/// assert_eq!(LanguageBucket::default(), LanguageBucket::ScriptingOrWeb);
/// assert_eq!(LanguageBucket::Systems.to_string(), "systems");
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LanguageBucket {
    /// Scripting and web languages, plus anything unrecognized.
    #[default]
    ScriptingOrWeb,
    /// Compiled systems languages.
    Systems,
}

impl LanguageBucket {
    /// The label used in reports and regression term names.
    pub fn as_str(self) -> &'static str {
        match self {
            LanguageBucket::ScriptingOrWeb => "scripting_or_web",
            LanguageBucket::Systems => "systems",
        }
    }
}

impl fmt::Display for LanguageBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How analyses treat rows whose model is [`ModelBucket::Unknown`].
///
/// # Examples
///
/// ```
/// use sharelens_core::{ModelBucket, UnknownModelPolicy};
///
/// let policy: UnknownModelPolicy = "as-default".parse().unwrap();
/// assert_eq!(policy.resolve(ModelBucket::Unknown), Some(ModelBucket::Gpt35));
/// assert_eq!(UnknownModelPolicy::Exclude.resolve(ModelBucket::Unknown), None);
/// assert_eq!(UnknownModelPolicy::default(), UnknownModelPolicy::AsDefault);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownModelPolicy {
    /// Drop unknown rows from every analysis.
    Exclude,
    /// Count unknown rows as the default model (`3.5`).
    #[default]
    AsDefault,
    /// Keep unknown as its own level where the analysis allows it.
    Separate,
}

impl UnknownModelPolicy {
    /// Map a row's model through this policy; `None` means the row is dropped.
    pub fn resolve(self, model: ModelBucket) -> Option<ModelBucket> {
        match (self, model) {
            (_, ModelBucket::Gpt35 | ModelBucket::Gpt4) => Some(model),
            (UnknownModelPolicy::Exclude, ModelBucket::Unknown) => None,
            (UnknownModelPolicy::AsDefault, ModelBucket::Unknown) => Some(ModelBucket::Gpt35),
            (UnknownModelPolicy::Separate, ModelBucket::Unknown) => Some(ModelBucket::Unknown),
        }
    }
}

impl fmt::Display for UnknownModelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownModelPolicy::Exclude => write!(f, "exclude"),
            UnknownModelPolicy::AsDefault => write!(f, "as-default"),
            UnknownModelPolicy::Separate => write!(f, "separate"),
        }
    }
}

impl FromStr for UnknownModelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exclude" => Ok(UnknownModelPolicy::Exclude),
            "as-default" | "as_default" | "default" => Ok(UnknownModelPolicy::AsDefault),
            "separate" => Ok(UnknownModelPolicy::Separate),
            other => Err(format!("unknown model policy: {other}")),
        }
    }
}

/// Output format for the report.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use sharelens_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_default_is_text() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn model_bucket_serializes_as_label() {
        assert_eq!(serde_json::to_string(&ModelBucket::Gpt35).unwrap(), "\"3.5\"");
        assert_eq!(serde_json::to_string(&ModelBucket::Gpt4).unwrap(), "\"4\"");
        let parsed: ModelBucket = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(parsed, ModelBucket::Unknown);
    }

    #[test]
    fn language_bucket_order_is_lexicographic() {
        assert!(LanguageBucket::ScriptingOrWeb < LanguageBucket::Systems);
        assert!(LanguageBucket::ScriptingOrWeb.as_str() < LanguageBucket::Systems.as_str());
        assert_eq!(
            serde_json::to_string(&LanguageBucket::ScriptingOrWeb).unwrap(),
            "\"scripting_or_web\""
        );
    }

    #[test]
    fn policy_keeps_known_models_untouched() {
        for policy in [
            UnknownModelPolicy::Exclude,
            UnknownModelPolicy::AsDefault,
            UnknownModelPolicy::Separate,
        ] {
            assert_eq!(policy.resolve(ModelBucket::Gpt35), Some(ModelBucket::Gpt35));
            assert_eq!(policy.resolve(ModelBucket::Gpt4), Some(ModelBucket::Gpt4));
        }
    }

    #[test]
    fn policy_decides_unknown() {
        assert_eq!(UnknownModelPolicy::Exclude.resolve(ModelBucket::Unknown), None);
        assert_eq!(
            UnknownModelPolicy::AsDefault.resolve(ModelBucket::Unknown),
            Some(ModelBucket::Gpt35)
        );
        assert_eq!(
            UnknownModelPolicy::Separate.resolve(ModelBucket::Unknown),
            Some(ModelBucket::Unknown)
        );
    }

    #[test]
    fn default_policy_counts_unknown_as_35() {
        let policy = UnknownModelPolicy::default();
        assert_eq!(policy, UnknownModelPolicy::AsDefault);
        assert_eq!(policy.resolve(ModelBucket::Unknown), Some(ModelBucket::Gpt35));
    }

    #[test]
    fn policy_from_str_and_display() {
        assert_eq!(
            "Separate".parse::<UnknownModelPolicy>().unwrap(),
            UnknownModelPolicy::Separate
        );
        assert_eq!(UnknownModelPolicy::AsDefault.to_string(), "as-default");
        assert!("drop".parse::<UnknownModelPolicy>().is_err());
    }
}
