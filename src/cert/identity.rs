//! Identity data carried through validation and signing.

use std::fmt;

use serde::Serialize;

/// The domain/service identity a caller asks a certificate for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IdentityClaim {
    pub domain: String,
    pub service: String,
}

impl IdentityClaim {
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self { domain: domain.into(), service: service.into() }
    }

    /// `service.domain`
    pub fn expected_common_name(&self) -> String {
        format!("{}.{}", self.service, self.domain)
    }

    /// `service.domain-with-dashes.`, the required start of a hostname SAN.
    pub fn dns_prefix(&self) -> String {
        format!("{}.{}.", self.service, self.domain.replace('.', "-"))
    }
}

impl fmt::Display for IdentityClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}

/// A previously registered workload instance, looked up by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceRecord {
    /// Full service identity (`service.domain`) the instance was issued for.
    pub service: String,
    pub instance_id: String,
}

impl InstanceRecord {
    pub fn new(service: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self { service: service.into(), instance_id: instance_id.into() }
    }
}

/// Intended key usage of the certificate being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertUsage {
    Client,
    Server,
}

impl fmt::Display for CertUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertUsage::Client => write!(f, "client"),
            CertUsage::Server => write!(f, "server"),
        }
    }
}

/// A signed identity certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedIdentity {
    name: String,
    #[serde(rename = "certificate")]
    certificate_pem: String,
}

impl IssuedIdentity {
    /// Returns `None` for an empty certificate, which is never a valid identity.
    pub fn new(name: impl Into<String>, certificate_pem: impl Into<String>) -> Option<Self> {
        let certificate_pem = certificate_pem.into();
        if certificate_pem.is_empty() {
            return None;
        }
        Some(Self { name: name.into(), certificate_pem })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }
}
