use thiserror::Error;

/// Top-level error type for the Scoptics workspace.
///
/// Subsystem crates define their own error types for the failures they
/// own and convert into `ScopticsError` where a cross-crate `?` is needed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScopticsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ScopticsError {
    fn from(err: toml::de::Error) -> Self {
        ScopticsError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ScopticsError {
    fn from(err: toml::ser::Error) -> Self {
        ScopticsError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ScopticsError {
    fn from(err: serde_json::Error) -> Self {
        ScopticsError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Scoptics operations.
pub type Result<T> = std::result::Result<T, ScopticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScopticsError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(ScopticsError, &str)> = vec![
            (
                ScopticsError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                ScopticsError::Storage("locked".to_string()),
                "Storage error: locked",
            ),
            (
                ScopticsError::Agent("no classifier".to_string()),
                "Agent error: no classifier",
            ),
            (
                ScopticsError::Api("bind failed".to_string()),
                "API error: bind failed",
            ),
            (
                ScopticsError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ScopticsError = io_err.into();
        assert!(matches!(err, ScopticsError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: ScopticsError = err.unwrap_err().into();
        assert!(matches!(err, ScopticsError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: ScopticsError = err.unwrap_err().into();
        assert!(matches!(err, ScopticsError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
