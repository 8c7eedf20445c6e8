use thiserror::Error;

/// A certificate signing request could not be decoded.
///
/// Callers of the validator never see this as a hard failure; a CSR that
/// cannot be parsed is simply rejected.
#[derive(Debug, Error)]
pub enum CsrError {
    /// The input is not PEM at all.
    #[error("CSR is not valid PEM: {0}")]
    InvalidPem(String),

    /// The PEM block carries something other than a certificate request.
    #[error("Unexpected PEM label '{0}', expected CERTIFICATE REQUEST")]
    UnexpectedLabel(String),

    /// The DER body is not a PKCS#10 structure.
    #[error("CSR is not a valid PKCS#10 structure: {0}")]
    InvalidDer(String),
}
