use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use rustls::crypto::ring;
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use tracing::error;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::errors::TlsError;

/// Metadata extracted from the leaf certificate for logging and validation.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// A certificate chain with its matching private key.
#[derive(Debug)]
pub struct CertificateBundle {
    pub source: PathBuf,
    pub chain: Vec<CertificateDer<'static>>,
    pub private_key: PrivateKeyDer<'static>,
    pub info: CertificateInfo,
}

impl Clone for CertificateBundle {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            chain: self.chain.clone(),
            private_key: self.private_key.clone_key(),
            info: self.info.clone(),
        }
    }
}

/// Load and validate a PEM certificate chain and PEM private key from disk.
pub fn load_certificate_bundle(
    cert_path: &Path,
    key_path: &Path,
) -> Result<CertificateBundle, TlsError> {
    let cert_bytes = fs::read(cert_path)
        .map_err(|e| TlsError::CertificateReadError { path: cert_path.to_path_buf(), source: e })?;
    let key_bytes = fs::read(key_path)
        .map_err(|e| TlsError::PrivateKeyReadError { path: key_path.to_path_buf(), source: e })?;

    bundle_from_pem(&cert_bytes, cert_path, &key_bytes, key_path)
}

/// Build a bundle from PEM contents already read from `cert_path` and `key_path`.
pub fn bundle_from_pem(
    cert_bytes: &[u8],
    cert_path: &Path,
    key_bytes: &[u8],
    key_path: &Path,
) -> Result<CertificateBundle, TlsError> {
    let chain = parse_pem_certificates(cert_bytes, cert_path)?;

    let private_key = PrivateKeyDer::from_pem_slice(key_bytes).map_err(|err| {
        TlsError::InvalidPrivateKey { path: key_path.to_path_buf(), source: Some(anyhow!(err)) }
    })?;

    bundle_from_der(chain, private_key, cert_path, key_path)
}

/// Validate a DER chain and key, e.g. taken out of a PKCS#12 keystore.
pub fn bundle_from_der(
    chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
    cert_path: &Path,
    key_path: &Path,
) -> Result<CertificateBundle, TlsError> {
    let leaf = chain
        .first()
        .ok_or_else(|| TlsError::EmptyCertificateChain { path: cert_path.to_path_buf() })?;

    let info = certificate_info(leaf, cert_path)?;
    validate_certificate_dates(&info, cert_path)?;
    validate_key_pair(&chain, &private_key, key_path)?;

    Ok(CertificateBundle { source: cert_path.to_path_buf(), chain, private_key, info })
}

/// Every certificate in a PEM file, in order.
pub fn parse_pem_certificates(
    bytes: &[u8],
    path: &Path,
) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(bytes)
        .map(|result| {
            result.map_err(|err| TlsError::InvalidCertificatePem {
                path: path.to_path_buf(),
                source: anyhow!(err),
            })
        })
        .collect::<Result<_, _>>()?;

    if certs.is_empty() {
        return Err(TlsError::EmptyCertificateChain { path: path.to_path_buf() });
    }
    Ok(certs)
}

pub fn certificate_info(
    cert: &CertificateDer<'_>,
    path: &Path,
) -> Result<CertificateInfo, TlsError> {
    let (_, parsed) = X509Certificate::from_der(cert.as_ref()).map_err(|err| {
        TlsError::CertificateMetadata { path: path.to_path_buf(), source: anyhow!(err) }
    })?;

    let validity = parsed.validity();
    Ok(CertificateInfo {
        subject: parsed.subject().to_string(),
        issuer: parsed.issuer().to_string(),
        not_before: to_chrono(validity.not_before.timestamp(), path)?,
        not_after: to_chrono(validity.not_after.timestamp(), path)?,
    })
}

fn to_chrono(timestamp: i64, path: &Path) -> Result<DateTime<Utc>, TlsError> {
    Utc.timestamp_opt(timestamp, 0).single().ok_or_else(|| TlsError::CertificateMetadata {
        path: path.to_path_buf(),
        source: anyhow!("timestamp {timestamp} out of range"),
    })
}

fn validate_certificate_dates(info: &CertificateInfo, path: &Path) -> Result<(), TlsError> {
    let now = current_time();
    if info.not_before > now {
        return Err(TlsError::CertificateNotYetValid {
            path: path.to_path_buf(),
            not_before: info.not_before,
        });
    }
    if info.not_after <= now {
        return Err(TlsError::CertificateExpired {
            path: path.to_path_buf(),
            not_after: info.not_after,
        });
    }
    Ok(())
}

fn validate_key_pair(
    chain: &[CertificateDer<'static>],
    private_key: &PrivateKeyDer<'static>,
    key_path: &Path,
) -> Result<(), TlsError> {
    let provider = ring::default_provider();
    match CertifiedKey::from_der(chain.to_vec(), private_key.clone_key(), &provider) {
        Ok(_) => Ok(()),
        Err(rustls::Error::InconsistentKeys(_)) => Err(TlsError::CertificateKeyMismatch),
        Err(err) => Err(TlsError::InvalidPrivateKey {
            path: key_path.to_path_buf(),
            source: Some(anyhow!(err)),
        }),
    }
}

/// Read a whole file as UTF-8, logging and returning `None` on failure.
pub fn read_file_contents(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Unable to read file");
            None
        }
    }
}

fn current_time() -> DateTime<Utc> {
    #[cfg(test)]
    {
        if let Some(now) = NOW_OVERRIDE.with(|cell| cell.get()) {
            return now;
        }
    }
    Utc::now()
}

#[cfg(test)]
thread_local! {
    static NOW_OVERRIDE: std::cell::Cell<Option<DateTime<Utc>>> = const { std::cell::Cell::new(None) };
}

/// Pin the clock seen by date validation on the current thread.
#[cfg(test)]
pub fn set_mock_time(moment: Option<DateTime<Utc>>) {
    NOW_OVERRIDE.with(|cell| cell.set(moment));
}
