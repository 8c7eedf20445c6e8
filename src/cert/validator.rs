//! CSR identity validation.
//!
//! A CSR is acceptable for `(domain, service)` when:
//!
//! 1. its CN equals `service.domain`, ignoring case;
//! 2. every SAN dNSName is either `service.<domain with dashes>.<suffix>` or an
//!    instance-bound name containing [`INSTANCE_ID_MARKER`];
//! 3. when an instance record is supplied, the record belongs to the same
//!    service and the instance id carried in the SAN matches it.
//!
//! All checks are pure. The boolean entry points log the reason for a
//! rejection and never fail.

use thiserror::Error;
use tracing::error;

use super::csr::CertificateSigningRequest;
use super::identity::{IdentityClaim, InstanceRecord};
use crate::config::CertSettings;

/// Marks a SAN entry as instance-bound; the instance id precedes it.
pub const INSTANCE_ID_MARKER: &str = ".instanceid.athenz.";

/// Why a CSR was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("CSR has no usable common name")]
    CommonNameMissing,

    #[error("CSR common name '{actual}' does not match expected '{expected}'")]
    CommonNameMismatch { expected: String, actual: String },

    #[error("CSR SAN entry '{name}' is neither a service hostname nor an instance id")]
    InvalidSanEntry { name: String },

    #[error("Instance record service '{actual}' does not match expected '{expected}'")]
    InstanceServiceMismatch { expected: String, actual: String },

    #[error("CSR carries no instance id SAN entry")]
    InstanceIdMissing,

    #[error("CSR instance id '{actual}' does not match expected '{expected}'")]
    InstanceIdMismatch { expected: String, actual: String },
}

pub fn extract_common_name(csr: &CertificateSigningRequest) -> Option<String> {
    csr.common_name().map(str::to_string)
}

/// The text before the marker in the first SAN entry that contains it.
pub fn extract_instance_id(csr: &CertificateSigningRequest) -> Option<String> {
    csr.dns_names()
        .iter()
        .find_map(|name| name.find(INSTANCE_ID_MARKER).map(|idx| name[..idx].to_string()))
}

pub fn check_common_name(
    csr: &CertificateSigningRequest,
    expected_cn: &str,
) -> Result<(), ValidationFailure> {
    let actual = csr.common_name().ok_or(ValidationFailure::CommonNameMissing)?;
    if actual.to_lowercase() != expected_cn.to_lowercase() {
        return Err(ValidationFailure::CommonNameMismatch {
            expected: expected_cn.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

pub fn validate_common_name(csr: &CertificateSigningRequest, expected_cn: &str) -> bool {
    report(check_common_name(csr, expected_cn))
}

pub fn check_instance_id(
    csr: &CertificateSigningRequest,
    expected_instance_id: &str,
) -> Result<(), ValidationFailure> {
    let actual = extract_instance_id(csr).ok_or(ValidationFailure::InstanceIdMissing)?;
    if actual != expected_instance_id {
        return Err(ValidationFailure::InstanceIdMismatch {
            expected: expected_instance_id.to_string(),
            actual,
        });
    }
    Ok(())
}

pub fn validate_instance_id(csr: &CertificateSigningRequest, expected_instance_id: &str) -> bool {
    report(check_instance_id(csr, expected_instance_id))
}

fn report(outcome: Result<(), ValidationFailure>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(failure) => {
            error!(reason = %failure, "CSR validation failed");
            false
        }
    }
}

/// Validates CSRs against the provider's DNS naming grammar.
#[derive(Debug, Clone)]
pub struct CsrValidator {
    dns_suffix: String,
}

impl CsrValidator {
    pub fn new(dns_suffix: impl Into<String>) -> Self {
        Self { dns_suffix: dns_suffix.into() }
    }

    pub fn from_settings(settings: &CertSettings) -> Self {
        Self::new(settings.dns_suffix.clone())
    }

    pub fn dns_suffix(&self) -> &str {
        &self.dns_suffix
    }

    pub fn check_dns_names(
        &self,
        csr: &CertificateSigningRequest,
        claim: &IdentityClaim,
    ) -> Result<(), ValidationFailure> {
        // No SAN entries means no SAN restriction.
        let prefix = claim.dns_prefix();
        for name in csr.dns_names() {
            let service_hostname =
                name.starts_with(&prefix) && name.ends_with(self.dns_suffix.as_str());
            if !service_hostname && !name.contains(INSTANCE_ID_MARKER) {
                return Err(ValidationFailure::InvalidSanEntry { name: name.clone() });
            }
        }
        Ok(())
    }

    pub fn validate_dns_names(&self, csr: &CertificateSigningRequest, claim: &IdentityClaim) -> bool {
        report(self.check_dns_names(csr, claim))
    }

    /// Run every check in order, stopping at the first failure.
    pub fn check_certificate_request(
        &self,
        csr: &CertificateSigningRequest,
        claim: &IdentityClaim,
        instance: Option<&InstanceRecord>,
    ) -> Result<(), ValidationFailure> {
        let expected_cn = claim.expected_common_name();
        check_common_name(csr, &expected_cn)?;
        self.check_dns_names(csr, claim)?;

        if let Some(record) = instance {
            if expected_cn != record.service {
                return Err(ValidationFailure::InstanceServiceMismatch {
                    expected: expected_cn,
                    actual: record.service.clone(),
                });
            }
            check_instance_id(csr, &record.instance_id)?;
        }
        Ok(())
    }

    pub fn verify_certificate_request(
        &self,
        csr: &CertificateSigningRequest,
        claim: &IdentityClaim,
        instance: Option<&InstanceRecord>,
    ) -> bool {
        let _span = crate::csr_span!(claim.domain, claim.service).entered();
        report(self.check_certificate_request(csr, claim, instance))
    }

    /// Parse then verify. A CSR that cannot be decoded is rejected.
    pub fn verify_certificate_request_pem(
        &self,
        csr_pem: &str,
        claim: &IdentityClaim,
        instance: Option<&InstanceRecord>,
    ) -> bool {
        match CertificateSigningRequest::from_pem(csr_pem) {
            Ok(csr) => self.verify_certificate_request(&csr, claim, instance),
            Err(e) => {
                error!(domain = %claim.domain, service = %claim.service, error = %e, "Unable to parse CSR");
                false
            }
        }
    }
}
