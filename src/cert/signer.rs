//! Seam to the external certificate signing backend.

use tracing::debug;

use super::identity::{CertUsage, IssuedIdentity};

/// An external X.509 signing backend.
///
/// Returns the signed certificate as PEM, or `None` (or an empty string) when
/// the backend declines. The backend reports its own diagnostics.
pub trait CertSigner: Send + Sync {
    fn generate_x509_certificate(
        &self,
        provider: &str,
        issuer: Option<&str>,
        csr_pem: &str,
        usage: CertUsage,
        expiry_mins: u32,
    ) -> Option<String>;
}

/// Sign `csr_pem` and wrap the result as an identity named `common_name`.
///
/// The CSR must already have passed
/// [`CsrValidator::verify_certificate_request`](super::CsrValidator::verify_certificate_request).
/// A refusal by the signer is a normal outcome and yields `None`.
pub fn generate_identity(
    signer: &dyn CertSigner,
    provider: &str,
    issuer: Option<&str>,
    csr_pem: &str,
    common_name: &str,
    usage: CertUsage,
    expiry_mins: u32,
) -> Option<IssuedIdentity> {
    let pem = signer.generate_x509_certificate(provider, issuer, csr_pem, usage, expiry_mins)?;
    let identity = IssuedIdentity::new(common_name, pem);
    if identity.is_none() {
        debug!(common_name = %common_name, provider = %provider, "Signer returned an empty certificate");
    }
    identity
}
