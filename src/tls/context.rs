//! Mutually authenticated client/server TLS context.
//!
//! The same credentials back both directions: the server side requires a
//! client certificate that chains to the truststore, and the client side
//! presents the same certificate when connecting out.

use std::fmt;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ServerConfig};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};
use tracing::{error, info};

use super::credentials::{CredentialMaterial, LiveCredentialSet};
use super::keystore::{load_key_store, load_trust_store};
use super::refresher::{CredentialRefresher, FileCredentialSource, RefresherHandle};
use crate::config::{CredentialMode, FileCertKeyPairConfig, KeystorePairConfig, TlsSettings};
use crate::errors::TlsError;
use crate::secrets::SecretResolver;

/// Where a context's credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    KeystorePair,
    FileCertKeyPair,
}

impl fmt::Display for ContextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextMode::KeystorePair => write!(f, "keystore-pair"),
            ContextMode::FileCertKeyPair => write!(f, "file-cert-key-pair"),
        }
    }
}

/// A TLS context whose credentials may be rotated underneath it.
///
/// Every accessor takes a fresh snapshot of the active generation, so obtain
/// the acceptor or connector per connection to pick up rotated credentials.
#[derive(Debug)]
pub struct TlsContext {
    mode: ContextMode,
    credentials: Arc<LiveCredentialSet>,
    refresher: Option<RefresherHandle>,
}

impl TlsContext {
    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    pub fn credentials(&self) -> &Arc<LiveCredentialSet> {
        &self.credentials
    }

    pub fn generation(&self) -> u64 {
        self.credentials.generation()
    }

    pub fn server_config(&self) -> Arc<ServerConfig> {
        self.credentials.snapshot().server_config()
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.credentials.snapshot().client_config()
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(self.server_config())
    }

    pub fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.client_config())
    }

    /// Accept one inbound connection with the current generation.
    pub async fn accept<IO>(&self, stream: IO) -> std::io::Result<server::TlsStream<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        self.acceptor().accept(stream).await
    }

    /// Open one outbound connection with the current generation.
    pub async fn connect<IO>(
        &self,
        server_name: ServerName<'static>,
        stream: IO,
    ) -> std::io::Result<client::TlsStream<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        self.connector().connect(server_name, stream).await
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.as_ref().is_some_and(|handle| !handle.is_stopped())
    }

    /// Stop the credential refresher, if any. The last installed generation
    /// stays in effect.
    pub async fn shutdown(&mut self) {
        if let Some(refresher) = self.refresher.take() {
            refresher.shutdown().await;
            info!(mode = %self.mode, generation = self.generation(), "TLS credential refresh stopped");
        }
    }
}

/// Build the client/server context selected by the settings.
///
/// Returns `None`, after logging the cause, when the configuration is
/// incomplete or any credential fails to load. File mode must be called
/// from within a tokio runtime so the refresher can be started.
pub fn build_client_or_server_context(
    settings: &TlsSettings,
    resolver: Option<&dyn SecretResolver>,
) -> Option<TlsContext> {
    let _span = crate::tls_span!("client_server_context").entered();

    let built = settings.credential_mode().and_then(|mode| match mode {
        CredentialMode::FileCertKeyPair(config) => from_files(config, resolver),
        CredentialMode::KeystorePair(config) => from_keystores(config, resolver),
    });

    match built {
        Ok(context) => {
            info!(
                mode = %context.mode,
                generation = context.generation(),
                subject = %context.credentials.snapshot().certificate_info().subject,
                "TLS context ready"
            );
            Some(context)
        }
        Err(e) => {
            error!(kind = ?e.kind(), error = %e, "Unable to build TLS context");
            None
        }
    }
}

fn from_files(
    config: FileCertKeyPairConfig,
    resolver: Option<&dyn SecretResolver>,
) -> Result<TlsContext, TlsError> {
    let required = [
        ("truststore", &config.trust_store.path),
        ("certificate", &config.cert_path),
        ("private key", &config.key_path),
    ];
    for (what, path) in required {
        if !path.exists() {
            return Err(TlsError::PathNotFound { what, path: path.clone() });
        }
    }

    let runtime = tokio::runtime::Handle::try_current().map_err(|_| TlsError::RuntimeUnavailable)?;

    let source = FileCredentialSource {
        trust_store_password: config.trust_store.password.resolve_with_lookup(resolver),
        trust_store: config.trust_store,
        cert_path: config.cert_path,
        key_path: config.key_path,
    };
    let material = source.load()?;
    let credentials = Arc::new(LiveCredentialSet::new(material)?);

    let refresher =
        CredentialRefresher::new(source, Arc::clone(&credentials), config.refresh_interval).spawn(&runtime);

    Ok(TlsContext { mode: ContextMode::FileCertKeyPair, credentials, refresher: Some(refresher) })
}

fn from_keystores(
    config: KeystorePairConfig,
    resolver: Option<&dyn SecretResolver>,
) -> Result<TlsContext, TlsError> {
    let key_store_password = config.key_store.password.resolve_with_lookup(resolver);
    let key_manager_password = config.key_manager_password.resolve_with_lookup(resolver);
    let trust_store_password = config.trust_store.password.resolve_with_lookup(resolver);

    let bundle =
        load_key_store(&config.key_store, key_store_password.as_ref(), key_manager_password.as_ref())?;
    let roots = load_trust_store(&config.trust_store, trust_store_password.as_ref())?;

    let credentials = Arc::new(LiveCredentialSet::new(CredentialMaterial {
        bundle,
        roots: Arc::new(roots),
        fingerprint: None,
    })?);

    Ok(TlsContext { mode: ContextMode::KeystorePair, credentials, refresher: None })
}
