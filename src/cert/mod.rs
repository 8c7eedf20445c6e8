//! # Certificate Requests
//!
//! Validation of PKCS#10 requests against a claimed domain/service identity
//! and the hand-off to an external signer once a request is accepted.

pub mod csr;
pub mod identity;
pub mod signer;
pub mod validator;

pub use csr::CertificateSigningRequest;
pub use identity::{CertUsage, IdentityClaim, InstanceRecord, IssuedIdentity};
pub use signer::{generate_identity, CertSigner};
pub use validator::{
    extract_common_name, extract_instance_id, validate_common_name, validate_instance_id,
    CsrValidator, ValidationFailure, INSTANCE_ID_MARKER,
};
