//! # Error Handling
//!
//! Error types for the ZTS identity core. Validation outcomes are not errors:
//! the CSR validator reports them as booleans. The types here cover
//! configuration, CSR decoding, and TLS credential loading.

pub mod csr;
pub mod tls;

pub use csr::CsrError;
pub use tls::{TlsError, TlsErrorKind};

/// Custom result type for ZTS identity operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ZTS identity core
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// TLS context construction errors
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Certificate signing request decoding errors
    #[error(transparent)]
    Csr(#[from] CsrError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Config(errors.to_string())
    }
}
