//! Protocol version and cipher suite selection.
//!
//! Names follow the JSSE conventions used in configuration (`TLSv1.2`,
//! `TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256`). TLS 1.3 suites match both their
//! IANA name (`TLS_AES_128_GCM_SHA256`) and the rustls name
//! (`TLS13_AES_128_GCM_SHA256`). Legacy names such as `SSLv3` never match a
//! supported version, so excluding them is a no-op.

use rustls::crypto::{ring, CryptoProvider};
use rustls::{SupportedCipherSuite, SupportedProtocolVersion};

use crate::errors::TlsError;

/// Versions rustls can negotiate, newest first.
pub static SUPPORTED_PROTOCOLS: &[&SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

pub fn protocol_name(version: &SupportedProtocolVersion) -> &'static str {
    match version.version {
        rustls::ProtocolVersion::TLSv1_3 => "TLSv1.3",
        rustls::ProtocolVersion::TLSv1_2 => "TLSv1.2",
        _ => "unknown",
    }
}

fn listed(list: &[String], name: &str) -> bool {
    list.iter().any(|entry| entry.eq_ignore_ascii_case(name))
}

/// Apply the optional allow-list then the exclusion list.
pub fn select_protocol_versions(
    allow: Option<&[String]>,
    excluded: &[String],
) -> Result<Vec<&'static SupportedProtocolVersion>, TlsError> {
    let versions: Vec<&'static SupportedProtocolVersion> = SUPPORTED_PROTOCOLS
        .iter()
        .copied()
        .filter(|version| allow.map_or(true, |allow| listed(allow, protocol_name(version))))
        .filter(|version| !listed(excluded, protocol_name(version)))
        .collect();

    if versions.is_empty() {
        return Err(TlsError::NoUsableProtocols);
    }
    Ok(versions)
}

/// Names a cipher suite answers to.
pub fn cipher_suite_names(suite: &SupportedCipherSuite) -> Vec<String> {
    let name = format!("{:?}", suite.suite());
    match name.strip_prefix("TLS13_") {
        Some(rest) => vec![format!("TLS_{rest}"), name],
        None => vec![name],
    }
}

/// The ring provider minus every excluded cipher suite.
pub fn filtered_provider(excluded: &[String]) -> Result<CryptoProvider, TlsError> {
    let mut provider = ring::default_provider();
    provider
        .cipher_suites
        .retain(|suite| !cipher_suite_names(suite).iter().any(|name| listed(excluded, name)));

    if provider.cipher_suites.is_empty() {
        return Err(TlsError::NoUsableCipherSuites);
    }
    Ok(provider)
}
