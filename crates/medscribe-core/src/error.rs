//! Error types for the MedScribe core.

/// Core error type for guard infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An environment variable holds a value that cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// The variable name.
        key: String,
        /// The raw value that failed to parse.
        value: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
