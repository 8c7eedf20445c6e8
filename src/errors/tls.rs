use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Coarse classification of [`TlsError`] used when reporting why a context
/// could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsErrorKind {
    /// A required path, credential or runtime was not available.
    ConfigurationIncomplete,
    /// Credential material exists but could not be read or trusted.
    CredentialLoadFailure,
}

/// TLS-specific error variants surfaced during configuration and credential loading.
#[derive(Debug, Error)]
pub enum TlsError {
    /// Keystore mode was selected but no keystore path was configured.
    #[error("Keystore path is not configured")]
    MissingKeyStorePath,

    /// A truststore is required for the selected mode but none was configured.
    #[error("Truststore path is not configured")]
    MissingTrustStorePath,

    /// File mode was selected but the public certificate path was not provided.
    #[error("Public certificate path is not configured")]
    MissingCertificatePath,

    /// File mode was selected but the private key path was not provided.
    #[error("Private key path is not configured")]
    MissingPrivateKeyPath,

    /// A configured path does not exist on disk.
    #[error("Configured {what} does not exist: {path}")]
    PathNotFound { what: &'static str, path: PathBuf },

    /// The credential refresher needs a tokio runtime to run on.
    #[error("No async runtime available to run the credential refresher")]
    RuntimeUnavailable,

    /// Store type other than PKCS12 or PEM.
    #[error("Unsupported store type '{0}', expected PKCS12 or PEM")]
    UnsupportedStoreType(String),

    /// The keystore or truststore file could not be read.
    #[error("Failed to read store at {path}: {source}")]
    StoreReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PKCS#12 container is corrupt or the password is wrong.
    #[error("Failed to open PKCS12 store at {path}: {source}")]
    StoreLoadError {
        path: PathBuf,
        #[source]
        source: p12_keystore::error::Error,
    },

    /// The keystore holds no private key entry.
    #[error("Keystore {path} does not contain a private key entry")]
    NoPrivateKeyEntry { path: PathBuf },

    /// The truststore holds no usable trust anchors.
    #[error("Truststore {path} does not contain any trusted certificates")]
    EmptyTrustStore { path: PathBuf },

    /// A trust anchor was rejected by the root store.
    #[error("Truststore {path} contains an unusable certificate: {source}")]
    InvalidTrustAnchor {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },

    /// The certificate file could not be read.
    #[error("Failed to read certificate at {path}: {source}")]
    CertificateReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The private key file could not be read.
    #[error("Failed to read private key at {path}: {source}")]
    PrivateKeyReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No certificates were found in the supplied PEM file.
    #[error("Certificate file {path} does not contain any certificates")]
    EmptyCertificateChain { path: PathBuf },

    /// The certificate PEM contents were invalid or unreadable.
    #[error("Certificate file {path} is not a valid PEM: {source}")]
    InvalidCertificatePem {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The private key PEM contents were invalid or unsupported.
    #[error("Private key file {path} does not contain a supported private key")]
    InvalidPrivateKey {
        path: PathBuf,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The supplied certificate and key do not match.
    #[error("Certificate and private key do not match")]
    CertificateKeyMismatch,

    /// The certificate is not yet valid.
    #[error("Certificate at {path} is not valid before {not_before}")]
    CertificateNotYetValid { path: PathBuf, not_before: DateTime<Utc> },

    /// The certificate is expired.
    #[error("Certificate at {path} expired at {not_after}")]
    CertificateExpired { path: PathBuf, not_after: DateTime<Utc> },

    /// Generic metadata extraction failure.
    #[error("Failed to extract certificate metadata from {path}: {source}")]
    CertificateMetadata {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Every protocol version was excluded or not allow-listed.
    #[error("No TLS protocol version remains after applying allow and exclude lists")]
    NoUsableProtocols,

    /// Every cipher suite was excluded.
    #[error("No cipher suite remains after applying the exclusion list")]
    NoUsableCipherSuites,

    /// rustls refused the assembled configuration.
    #[error("Failed to build TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),

    /// The client certificate verifier could not be built.
    #[error("Failed to build client certificate verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),

    /// A blocking load task did not complete.
    #[error("Credential load task failed: {0}")]
    LoadTask(String),
}

impl TlsError {
    /// Classify this error for reporting.
    pub fn kind(&self) -> TlsErrorKind {
        match self {
            TlsError::MissingKeyStorePath
            | TlsError::MissingTrustStorePath
            | TlsError::MissingCertificatePath
            | TlsError::MissingPrivateKeyPath
            | TlsError::PathNotFound { .. }
            | TlsError::RuntimeUnavailable
            | TlsError::UnsupportedStoreType(_)
            | TlsError::NoUsableProtocols
            | TlsError::NoUsableCipherSuites => TlsErrorKind::ConfigurationIncomplete,
            _ => TlsErrorKind::CredentialLoadFailure,
        }
    }
}
