//! Error types for bk-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for bk-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bk-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (credentials file layout, schema version)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials are missing or malformed
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    /// Invalid path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication or permission failure reported by the store
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or service error
    #[error("Network error: {0}")]
    Network(String),

    /// Listing iteration failed part way through.
    ///
    /// Partial results are discarded. Callers must not retry.
    #[error("Listing failed for {bucket}/{prefix}: {message}")]
    Listing {
        bucket: String,
        prefix: String,
        message: String,
    },

    /// Opening or creating a local file failed
    #[error("Failed to open {}: {source}", path.display())]
    LocalOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading from a local file failed
    #[error("Failed to read {}: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing to a local file failed
    #[error("Failed to write {}: {source}", path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Opening or reading a remote object stream failed
    #[error("Failed to read {object}: {message}")]
    RemoteRead { object: String, message: String },

    /// Opening, writing or closing a remote object stream failed
    #[error("Failed to write {object}: {message}")]
    RemoteWrite { object: String, message: String },

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) => 2,                        // UsageError
            Error::Config(_) | Error::Credentials(_) => 2,     // UsageError
            Error::Network(_) | Error::Listing { .. } => 3,    // NetworkError
            Error::RemoteRead { .. } | Error::RemoteWrite { .. } => 3,
            Error::Auth(_) => 4,                               // AuthError
            Error::NotFound(_) => 5,                           // NotFound
            _ => 1,                                            // GeneralError
        }
    }

    /// Whether a caller may reasonably reissue the failed operation.
    ///
    /// Nothing in this crate retries; this only classifies.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::RemoteRead { .. } | Error::RemoteWrite { .. }
        )
    }
}
