//! Atomically replaceable TLS credentials.
//!
//! A [`CredentialGeneration`] is built completely (key, chain, trust roots,
//! and the rustls configs derived from them) before it is published. The
//! [`LiveCredentialSet`] swaps whole generations through an [`ArcSwap`], so a
//! handshake that took a snapshot keeps one consistent certificate, key and
//! trust set for its whole lifetime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rustls::crypto::{ring, CryptoProvider};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tracing::info;

use crate::errors::TlsError;
use crate::utils::certificates::{CertificateBundle, CertificateInfo};

/// Protocol version the client/server context is fixed at.
pub static CONTEXT_PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS12];

/// Loaded but not yet published credentials.
#[derive(Debug, Clone)]
pub struct CredentialMaterial {
    pub bundle: CertificateBundle,
    pub roots: Arc<RootCertStore>,
    /// Digest of the sources this material was read from, if known.
    pub fingerprint: Option<String>,
}

/// One immutable set of credentials and the configs built from it.
#[derive(Debug)]
pub struct CredentialGeneration {
    generation: u64,
    loaded_at: DateTime<Utc>,
    fingerprint: Option<String>,
    info: CertificateInfo,
    server_config: Arc<ServerConfig>,
    client_config: Arc<ClientConfig>,
}

impl CredentialGeneration {
    fn build(generation: u64, material: CredentialMaterial) -> Result<Self, TlsError> {
        let provider = Arc::new(ring::default_provider());
        let server_config = build_server_config(&provider, &material)?;
        let client_config = build_client_config(&provider, &material)?;

        Ok(Self {
            generation,
            loaded_at: Utc::now(),
            fingerprint: material.fingerprint,
            info: material.bundle.info,
            server_config: Arc::new(server_config),
            client_config: Arc::new(client_config),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn certificate_info(&self) -> &CertificateInfo {
        &self.info
    }

    pub fn server_config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.server_config)
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client_config)
    }
}

/// Server side requires a client certificate chaining to the trust roots.
fn build_server_config(
    provider: &Arc<CryptoProvider>,
    material: &CredentialMaterial,
) -> Result<ServerConfig, TlsError> {
    let verifier =
        WebPkiClientVerifier::builder_with_provider(Arc::clone(&material.roots), Arc::clone(provider))
            .build()?;

    let config = ServerConfig::builder_with_provider(Arc::clone(provider))
        .with_protocol_versions(CONTEXT_PROTOCOL_VERSIONS)?
        .with_client_cert_verifier(verifier)
        .with_single_cert(material.bundle.chain.clone(), material.bundle.private_key.clone_key())?;
    Ok(config)
}

fn build_client_config(
    provider: &Arc<CryptoProvider>,
    material: &CredentialMaterial,
) -> Result<ClientConfig, TlsError> {
    let config = ClientConfig::builder_with_provider(Arc::clone(provider))
        .with_protocol_versions(CONTEXT_PROTOCOL_VERSIONS)?
        .with_root_certificates(Arc::clone(&material.roots))
        .with_client_auth_cert(material.bundle.chain.clone(), material.bundle.private_key.clone_key())?;
    Ok(config)
}

/// The active credential generation, replaced as a whole on rotation.
#[derive(Debug)]
pub struct LiveCredentialSet {
    current: ArcSwap<CredentialGeneration>,
    last_generation: AtomicU64,
}

impl LiveCredentialSet {
    /// Build the first generation.
    pub fn new(material: CredentialMaterial) -> Result<Self, TlsError> {
        let first = CredentialGeneration::build(1, material)?;
        Ok(Self { current: ArcSwap::from_pointee(first), last_generation: AtomicU64::new(1) })
    }

    /// The generation a handshake should use from start to finish.
    pub fn snapshot(&self) -> Arc<CredentialGeneration> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Build a new generation and publish it in one swap.
    ///
    /// If building fails the current generation stays in place.
    pub fn install(&self, material: CredentialMaterial) -> Result<u64, TlsError> {
        let generation = self.last_generation.load(Ordering::Acquire) + 1;
        let next = CredentialGeneration::build(generation, material)?;

        info!(
            generation,
            subject = %next.info.subject,
            not_after = %next.info.not_after,
            "Installing new TLS credential generation"
        );

        self.current.store(Arc::new(next));
        self.last_generation.store(generation, Ordering::Release);
        Ok(generation)
    }
}
