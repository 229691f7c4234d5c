//! Error types for cuebridge-core

use thiserror::Error;

/// Result type alias for cuebridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the bridge core.
///
/// Partial application (some snapshot entries or cue actions failing) is not
/// an error: it is reported through [`crate::snapshot::ApplyReport`] and
/// [`crate::actions::ActionOutcome`] on a successful result.
#[derive(Debug, Error)]
pub enum Error {
    /// A path, id or name did not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// The host application did not answer in time or refused the connection
    #[error("Host unreachable: {0}")]
    HostUnreachable(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Module registration or setup error
    #[error("Module error: {0}")]
    Module(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    /// Short machine-readable kind, used by the transport layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation_error",
            Error::HostUnreachable(_) => "host_unreachable",
            Error::Config(_) => "config_error",
            Error::Module(_) => "module_error",
            Error::Io(_) | Error::Json(_) | Error::TomlParse(_) | Error::TomlSerialize(_) => {
                "internal_error"
            }
        }
    }
}
