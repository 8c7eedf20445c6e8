//! Keystore and truststore loading.
//!
//! PKCS#12 containers are opened with `p12-keystore`, which checks the MAC so
//! a wrong password is reported as a load failure. PEM stores are plain
//! concatenations of certificates (and, for a keystore, one private key).

use std::fs;
use std::path::Path;

use p12_keystore::{KeyStore, KeyStoreEntry};
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::RootCertStore;
use tracing::{debug, info, warn};

use crate::config::{StoreLocation, StoreType};
use crate::errors::TlsError;
use crate::secrets::SecretString;
use crate::utils::certificates::{bundle_from_der, parse_pem_certificates, CertificateBundle};

fn password_str(password: Option<&SecretString>) -> &str {
    password.map(SecretString::expose_secret).unwrap_or_default()
}

pub fn read_store(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|e| TlsError::StoreReadError { path: path.to_path_buf(), source: e })
}

/// Load the private key and its certificate chain.
///
/// The keystore password opens the container. When that fails and a
/// separate key-manager password is configured, it is tried as well.
pub fn load_key_store(
    location: &StoreLocation,
    password: Option<&SecretString>,
    key_password: Option<&SecretString>,
) -> Result<CertificateBundle, TlsError> {
    let path = location.path.as_path();
    let data = read_store(path)?;

    match location.store_type {
        StoreType::Pkcs12 => {
            let keystore = match open_pkcs12(&data, path, password) {
                Ok(keystore) => keystore,
                Err(err) => match key_password.filter(|kp| Some(*kp) != password) {
                    Some(key_password) => {
                        debug!(path = %path.display(), "Retrying keystore with key manager password");
                        open_pkcs12(&data, path, Some(key_password)).map_err(|_| err)?
                    }
                    None => return Err(err),
                },
            };
            key_entry_from_pkcs12(&keystore, path)
        }
        StoreType::Pem => {
            if password.is_some() {
                warn!(path = %path.display(), "PEM keystores are not encrypted, ignoring password");
            }
            let chain = parse_pem_certificates(&data, path)?;
            let key = PrivateKeyDer::from_pem_slice(&data).map_err(|err| {
                TlsError::InvalidPrivateKey { path: path.to_path_buf(), source: Some(anyhow::anyhow!(err)) }
            })?;
            bundle_from_der(chain, key, path, path)
        }
    }
}

fn open_pkcs12(data: &[u8], path: &Path, password: Option<&SecretString>) -> Result<KeyStore, TlsError> {
    KeyStore::from_pkcs12(data, password_str(password))
        .map_err(|e| TlsError::StoreLoadError { path: path.to_path_buf(), source: e })
}

fn key_entry_from_pkcs12(keystore: &KeyStore, path: &Path) -> Result<CertificateBundle, TlsError> {
    let (alias, entry) = keystore
        .private_key_chain()
        .ok_or_else(|| TlsError::NoPrivateKeyEntry { path: path.to_path_buf() })?;

    let chain: Vec<CertificateDer<'static>> =
        entry.chain().iter().map(|cert| CertificateDer::from(cert.as_der().to_vec())).collect();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(entry.key().to_vec()));

    let bundle = bundle_from_der(chain, key, path, path)?;
    info!(
        path = %path.display(),
        alias = %alias,
        subject = %bundle.info.subject,
        not_after = %bundle.info.not_after,
        "Loaded key entry from keystore"
    );
    Ok(bundle)
}

/// Load trust anchors from a truststore on disk.
pub fn load_trust_store(
    location: &StoreLocation,
    password: Option<&SecretString>,
) -> Result<RootCertStore, TlsError> {
    let data = read_store(&location.path)?;
    trust_store_from_bytes(&data, &location.path, location.store_type, password)
}

/// Build a root store from truststore contents already read from `path`.
pub fn trust_store_from_bytes(
    data: &[u8],
    path: &Path,
    store_type: StoreType,
    password: Option<&SecretString>,
) -> Result<RootCertStore, TlsError> {
    let anchors: Vec<CertificateDer<'static>> = match store_type {
        StoreType::Pkcs12 => {
            let keystore = open_pkcs12(data, path, password)?;
            keystore
                .entries()
                .filter_map(|(_, entry)| match entry {
                    KeyStoreEntry::Certificate(cert) => Some(CertificateDer::from(cert.as_der().to_vec())),
                    KeyStoreEntry::PrivateKeyChain(_) => None,
                })
                .collect()
        }
        StoreType::Pem => parse_pem_certificates(data, path)?,
    };

    if anchors.is_empty() {
        return Err(TlsError::EmptyTrustStore { path: path.to_path_buf() });
    }

    let mut roots = RootCertStore::empty();
    for anchor in anchors {
        roots
            .add(anchor)
            .map_err(|e| TlsError::InvalidTrustAnchor { path: path.to_path_buf(), source: e })?;
    }

    debug!(path = %path.display(), anchors = roots.len(), "Loaded truststore");
    Ok(roots)
}
