//! Parsed view of a PKCS#10 certificate signing request.

use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::cri_attributes::ParsedCriAttribute;
use x509_parser::der_parser::asn1_rs::Tag;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::oid_registry::OID_X509_EXT_SUBJECT_ALT_NAME;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;
use x509_parser::x509::AttributeTypeAndValue;

use crate::errors::CsrError;

const CSR_PEM_LABELS: &[&str] = &["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

/// The identity-relevant fields of a CSR, extracted once at parse time.
///
/// Immutable after construction. `common_name` is `None` when the subject has
/// no CN, when the CN is not a string type, or when the subject carries more
/// than one CN. BMPString and UniversalString CNs are decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSigningRequest {
    common_name: Option<String>,
    dns_names: Vec<String>,
    der: Vec<u8>,
}

impl CertificateSigningRequest {
    /// Parse a PEM-encoded request.
    pub fn from_pem(pem: &str) -> Result<Self, CsrError> {
        let (_, block) =
            parse_x509_pem(pem.as_bytes()).map_err(|e| CsrError::InvalidPem(e.to_string()))?;

        if !CSR_PEM_LABELS.contains(&block.label.as_str()) {
            return Err(CsrError::UnexpectedLabel(block.label));
        }

        Self::from_der(&block.contents)
    }

    /// Parse a DER-encoded request.
    pub fn from_der(der: &[u8]) -> Result<Self, CsrError> {
        let (_, csr) = X509CertificationRequest::from_der(der)
            .map_err(|e| CsrError::InvalidDer(e.to_string()))?;

        let common_name = single_common_name(&csr);
        let dns_names = san_dns_names(&csr)?;

        Ok(Self { common_name, dns_names, der: der.to_vec() })
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    /// SAN dNSName entries in the order they appear in the request.
    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Check the request's self-signature (proof of possession of the key).
    pub fn verify_signature(&self) -> bool {
        match X509CertificationRequest::from_der(&self.der) {
            Ok((_, csr)) => csr.verify_signature().is_ok(),
            Err(_) => false,
        }
    }
}

fn single_common_name(csr: &X509CertificationRequest<'_>) -> Option<String> {
    let mut names = csr.certification_request_info.subject.iter_common_name();
    let first = names.next()?;
    if names.next().is_some() {
        return None;
    }
    attribute_string(first)
}

fn attribute_string(attr: &AttributeTypeAndValue<'_>) -> Option<String> {
    if let Ok(value) = attr.as_str() {
        return Some(value.to_string());
    }
    let value = attr.attr_value();
    match value.tag() {
        Tag::BmpString => {
            if value.data.len() % 2 != 0 {
                return None;
            }
            let units = value.data.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units).collect::<Result<String, _>>().ok()
        }
        Tag::UniversalString => {
            if value.data.len() % 4 != 0 {
                return None;
            }
            value
                .data
                .chunks_exact(4)
                .map(|quad| char::from_u32(u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]])))
                .collect()
        }
        _ => None,
    }
}

/// SAN dNSNames in request order. A SAN extension that does not decode
/// fails the whole request.
fn san_dns_names(csr: &X509CertificationRequest<'_>) -> Result<Vec<String>, CsrError> {
    let mut names = Vec::new();
    for attribute in csr.certification_request_info.iter_attributes() {
        let ParsedCriAttribute::ExtensionRequest(request) = attribute.parsed_attribute() else {
            continue;
        };
        for extension in &request.extensions {
            match extension.parsed_extension() {
                ParsedExtension::SubjectAlternativeName(san) => {
                    for name in &san.general_names {
                        if let GeneralName::DNSName(dns) = name {
                            names.push((*dns).to_string());
                        }
                    }
                }
                _ if extension.oid == OID_X509_EXT_SUBJECT_ALT_NAME => {
                    return Err(CsrError::InvalidDer("malformed subjectAltName extension".into()));
                }
                _ => {}
            }
        }
    }
    Ok(names)
}
