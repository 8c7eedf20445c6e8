//! Listener-side TLS context factory.
//!
//! [`build_server_context_factory`] captures the server TLS settings once,
//! resolving passwords through the configured secret backend. It never
//! fails: anything missing is left out and logged. The rustls
//! [`ServerConfig`] is produced later by
//! [`ServerContextFactory::build_server_config`], which is where missing or
//! unloadable stores surface as errors.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::server::WebPkiClientVerifier;
use rustls::ServerConfig;
use tracing::{debug, info, warn};

use super::keystore::{load_key_store, load_trust_store};
use super::protocols::{filtered_provider, protocol_name, select_protocol_versions};
use crate::config::{PasswordSetting, StoreLocation, StoreType, TlsSettings};
use crate::errors::TlsError;
use crate::secrets::{SecretResolver, SecretString};

/// Reusable server TLS configuration.
#[derive(Debug, Clone)]
pub struct ServerContextFactory {
    key_store_path: Option<PathBuf>,
    key_store_type: String,
    key_store_password: Option<SecretString>,
    key_manager_password: Option<SecretString>,
    trust_store_path: Option<PathBuf>,
    trust_store_type: String,
    trust_store_password: Option<SecretString>,
    excluded_cipher_suites: Vec<String>,
    excluded_protocols: Vec<String>,
    included_protocols: Option<Vec<String>>,
    want_client_auth: bool,
}

/// Capture the server TLS settings.
///
/// `client_protocols`, when given and non-empty, restricts the protocol
/// versions offered before the exclusion list is applied.
pub fn build_server_context_factory(
    settings: &TlsSettings,
    client_protocols: Option<&[String]>,
    resolver: Option<&dyn SecretResolver>,
) -> ServerContextFactory {
    let _span = crate::tls_span!("server_factory").entered();

    let key_store_path = settings.key_store.path.clone();
    match &key_store_path {
        Some(path) => info!(
            path = %path.display(),
            store_type = %settings.key_store.store_type,
            "Using SSL keystore"
        ),
        None => debug!("No SSL keystore configured"),
    }

    let key_store_password = settings.key_store.password.resolve(resolver);
    let key_manager_password = settings.key_manager_password.resolve(resolver);
    if key_manager_password.is_some() {
        debug!("Key manager password configured");
    }

    let trust_store_path = settings.trust_store.path.clone();
    match &trust_store_path {
        Some(path) => info!(
            path = %path.display(),
            store_type = %settings.trust_store.store_type,
            "Using SSL truststore"
        ),
        None => debug!("No SSL truststore configured"),
    }
    let trust_store_password = settings.trust_store.password.resolve(resolver);

    if !settings.excluded_cipher_suites.is_empty() {
        debug!(suites = ?settings.excluded_cipher_suites, "Excluding cipher suites");
    }
    if !settings.excluded_protocols.is_empty() {
        debug!(protocols = ?settings.excluded_protocols, "Excluding protocols");
    }

    let included_protocols = client_protocols.filter(|protocols| !protocols.is_empty()).map(|protocols| {
        info!(protocols = ?protocols, "Restricting SSL protocols");
        protocols.to_vec()
    });

    if settings.want_client_auth {
        info!("Requesting optional client certificates");
    }

    ServerContextFactory {
        key_store_path,
        key_store_type: settings.key_store.store_type.clone(),
        key_store_password,
        key_manager_password,
        trust_store_path,
        trust_store_type: settings.trust_store.store_type.clone(),
        trust_store_password,
        excluded_cipher_suites: settings.excluded_cipher_suites.clone(),
        excluded_protocols: settings.excluded_protocols.clone(),
        included_protocols,
        want_client_auth: settings.want_client_auth,
    }
}

impl ServerContextFactory {
    pub fn key_store_path(&self) -> Option<&Path> {
        self.key_store_path.as_deref()
    }

    pub fn trust_store_path(&self) -> Option<&Path> {
        self.trust_store_path.as_deref()
    }

    pub fn key_store_password(&self) -> Option<&SecretString> {
        self.key_store_password.as_ref()
    }

    pub fn key_manager_password(&self) -> Option<&SecretString> {
        self.key_manager_password.as_ref()
    }

    pub fn trust_store_password(&self) -> Option<&SecretString> {
        self.trust_store_password.as_ref()
    }

    pub fn excluded_cipher_suites(&self) -> &[String] {
        &self.excluded_cipher_suites
    }

    pub fn excluded_protocols(&self) -> &[String] {
        &self.excluded_protocols
    }

    pub fn included_protocols(&self) -> Option<&[String]> {
        self.included_protocols.as_deref()
    }

    pub fn want_client_auth(&self) -> bool {
        self.want_client_auth
    }

    fn location(path: &Path, store_type: &str) -> Result<StoreLocation, TlsError> {
        Ok(StoreLocation {
            path: path.to_path_buf(),
            store_type: store_type.parse::<StoreType>()?,
            password: PasswordSetting::default(),
        })
    }

    /// Load the stores and build a rustls server configuration.
    pub fn build_server_config(&self) -> Result<Arc<ServerConfig>, TlsError> {
        let _span = crate::tls_span!("server_config").entered();

        let key_store_path = self.key_store_path.as_deref().ok_or(TlsError::MissingKeyStorePath)?;
        let key_store = Self::location(key_store_path, &self.key_store_type)?;
        let bundle = load_key_store(
            &key_store,
            self.key_store_password.as_ref(),
            self.key_manager_password.as_ref(),
        )?;

        let provider = Arc::new(filtered_provider(&self.excluded_cipher_suites)?);
        let versions =
            select_protocol_versions(self.included_protocols.as_deref(), &self.excluded_protocols)?;
        debug!(
            protocols = ?versions.iter().map(|v| protocol_name(v)).collect::<Vec<_>>(),
            cipher_suites = provider.cipher_suites.len(),
            "Negotiable TLS parameters"
        );

        let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(&versions)?;

        let builder = match (&self.trust_store_path, self.want_client_auth) {
            (Some(trust_store_path), true) => {
                let trust_store = Self::location(trust_store_path, &self.trust_store_type)?;
                let roots = load_trust_store(&trust_store, self.trust_store_password.as_ref())?;
                let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                    .allow_unauthenticated()
                    .build()?;
                builder.with_client_cert_verifier(verifier)
            }
            (None, true) => {
                warn!("Client certificates requested but no truststore is configured");
                builder.with_no_client_auth()
            }
            (_, false) => builder.with_no_client_auth(),
        };

        let config = builder.with_single_cert(bundle.chain, bundle.private_key)?;
        info!(subject = %bundle.info.subject, "Built server TLS configuration");
        Ok(Arc::new(config))
    }
}
