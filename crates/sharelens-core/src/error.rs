use std::path::PathBuf;

/// Errors that can occur across sharelens.
///
/// Each variant wraps a specific error domain. Library crates return this
/// type directly; the binary renders it through `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use sharelens_core::ShareLensError;
///
/// let err = ShareLensError::Schema {
///     location: "Sources[3].State".into(),
///     expected: "string or null".into(),
/// };
/// assert!(err.to_string().contains("Sources[3].State"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ShareLensError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(sharelens::io))]
    Io(#[from] std::io::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(
        code(sharelens::file_not_found),
        help("pass --input to point at the pr_sharings JSON snapshot")
    )]
    FileNotFound(PathBuf),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(sharelens::json))]
    Serialization(#[from] serde_json::Error),

    /// The input document does not have the expected shape.
    #[error("schema error at {location}: expected {expected}")]
    #[diagnostic(code(sharelens::schema))]
    Schema {
        /// JSON path of the offending value, e.g. `Sources[2].ChatgptSharing`.
        location: String,
        /// Description of what was expected there.
        expected: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(sharelens::config))]
    Config(String),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(sharelens::toml))]
    Toml(#[from] toml::de::Error),

    /// Degenerate input to a statistical procedure.
    #[error("statistics error: {0}")]
    #[diagnostic(code(sharelens::statistics))]
    Statistics(String),
}

impl ShareLensError {
    /// Build a [`ShareLensError::Schema`] from anything string-like.
    pub fn schema(location: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::Schema {
            location: location.into(),
            expected: expected.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ShareLensError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = ShareLensError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = ShareLensError::FileNotFound(PathBuf::from("/tmp/missing.json"));
        assert!(err.to_string().contains("/tmp/missing.json"));
    }

    #[test]
    fn schema_error_names_location_and_expectation() {
        let err = ShareLensError::schema("Sources", "array");
        assert_eq!(err.to_string(), "schema error at Sources: expected array");
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ShareLensError = json_err.into();
        assert!(err.to_string().starts_with("serialization error"));
    }
}
