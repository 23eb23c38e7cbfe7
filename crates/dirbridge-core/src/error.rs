//! Error types for directory normalization.
//!
//! Each component crate keeps a narrow error enum for its own failure modes and converts into
//! [`Error`] at the crate boundary, so callers can handle every failure through one type.

use thiserror::Error;

/// Main error type for directory normalization operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A distinguished name could not be parsed
    #[error("Invalid distinguished name: {0}")]
    InvalidDn(String),

    /// A directory URL was structurally invalid
    #[error("Invalid directory URL: {0}")]
    InvalidUrl(String),

    /// Percent-decoding or character decoding failed
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A sequence was advanced past its last element
    #[error("Sequence exhausted: {0}")]
    Exhausted(String),

    /// An operation was attempted in a state that forbids it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Specialized result type for directory normalization operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidDn(_) => "INVALID_DN",
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::Encoding(_) => "ENCODING_ERROR",
            Self::Exhausted(_) => "EXHAUSTED",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    ///
    /// Caller mistakes (exhausted sequences, bad names) are expected and stay quiet.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(self, Self::ConfigError(_) | Self::Encoding(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(format!("Invalid configuration: {err}"))
    }
}
