//! Error types for xpisign

use thiserror::Error;

/// Result type alias using xpisign Error
pub type Result<T> = std::result::Result<T, Error>;

/// xpisign error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input archive could not be read as a zip container.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Malformed manifest or signature text. `line` is 1-based.
    #[error("Manifest parsing error: {reason} (line {line})")]
    Parse { line: usize, reason: String },

    /// An entry path that cannot be written into a manifest and read back
    /// unchanged.
    #[error("Unsupported entry name {name:?}: {reason}")]
    UnsupportedName { name: String, reason: &'static str },

    #[error("Output conflict: {0}")]
    OutputConflict(String),

    #[error("Signing provider error: {0}")]
    Signing(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Line number for parse errors
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Parse { line, .. } => Some(*line),
            _ => None,
        }
    }
}

impl From<ed25519_dalek::SignatureError> for Error {
    fn from(e: ed25519_dalek::SignatureError) -> Self {
        Error::Crypto(e.to_string())
    }
}
