//! Background reload of file-based credentials.
//!
//! Every interval the certificate, key and truststore files are read on the
//! blocking pool and hashed. When the digest differs from the active
//! generation, the new material is validated, built into a generation and
//! swapped in. A failed reload is logged and the previous generation keeps
//! serving handshakes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::credentials::{CredentialMaterial, LiveCredentialSet};
use super::keystore::{read_store, trust_store_from_bytes};
use crate::config::StoreLocation;
use crate::errors::TlsError;
use crate::secrets::SecretString;
use crate::utils::certificates::bundle_from_pem;

/// Where file-mode credentials are read from.
#[derive(Debug, Clone)]
pub struct FileCredentialSource {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub trust_store: StoreLocation,
    pub trust_store_password: Option<SecretString>,
}

impl FileCredentialSource {
    /// Read and validate everything. Blocking.
    pub fn load(&self) -> Result<CredentialMaterial, TlsError> {
        self.load_if_changed(None)?.ok_or_else(|| TlsError::LoadTask("no material loaded".into()))
    }

    /// Read the files and, unless their digest equals `current`, build new
    /// material. Blocking.
    pub fn load_if_changed(
        &self,
        current: Option<&str>,
    ) -> Result<Option<CredentialMaterial>, TlsError> {
        let cert_bytes = std::fs::read(&self.cert_path).map_err(|e| TlsError::CertificateReadError {
            path: self.cert_path.clone(),
            source: e,
        })?;
        let key_bytes = std::fs::read(&self.key_path).map_err(|e| TlsError::PrivateKeyReadError {
            path: self.key_path.clone(),
            source: e,
        })?;
        let trust_bytes = read_store(&self.trust_store.path)?;

        let digest = fingerprint(&[cert_bytes.as_slice(), key_bytes.as_slice(), trust_bytes.as_slice()]);
        if current == Some(digest.as_str()) {
            return Ok(None);
        }

        let bundle = bundle_from_pem(&cert_bytes, &self.cert_path, &key_bytes, &self.key_path)?;
        let roots = trust_store_from_bytes(
            &trust_bytes,
            &self.trust_store.path,
            self.trust_store.store_type,
            self.trust_store_password.as_ref(),
        )?;

        Ok(Some(CredentialMaterial { bundle, roots: Arc::new(roots), fingerprint: Some(digest) }))
    }
}

/// SHA-256 over length-prefixed parts, hex encoded.
pub fn fingerprint(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Periodically reloads a [`FileCredentialSource`] into a [`LiveCredentialSet`].
#[derive(Debug)]
pub struct CredentialRefresher {
    source: Arc<FileCredentialSource>,
    credentials: Arc<LiveCredentialSet>,
    interval: Duration,
}

impl CredentialRefresher {
    pub fn new(
        source: FileCredentialSource,
        credentials: Arc<LiveCredentialSet>,
        interval: Duration,
    ) -> Self {
        Self { source: Arc::new(source), credentials, interval }
    }

    /// Check the files once. Returns the new generation if one was installed.
    pub async fn refresh_once(&self) -> Result<Option<u64>, TlsError> {
        let current = self.credentials.snapshot().fingerprint().map(str::to_string);
        let source = Arc::clone(&self.source);

        let material =
            tokio::task::spawn_blocking(move || source.load_if_changed(current.as_deref()))
                .await
                .map_err(|e| TlsError::LoadTask(e.to_string()))??;

        let Some(material) = material else {
            return Ok(None);
        };

        let credentials = Arc::clone(&self.credentials);
        let generation = tokio::task::spawn_blocking(move || credentials.install(material))
            .await
            .map_err(|e| TlsError::LoadTask(e.to_string()))??;
        Ok(Some(generation))
    }

    /// Run on `runtime` until the returned handle is stopped or dropped.
    pub fn spawn(self, runtime: &tokio::runtime::Handle) -> RefresherHandle {
        let token = CancellationToken::new();
        let task = runtime.spawn(self.run(token.clone()));
        RefresherHandle { token, task: Some(task) }
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and the initial load already happened.
        ticker.tick().await;

        info!(
            cert_path = %self.source.cert_path.display(),
            key_path = %self.source.key_path.display(),
            interval_secs = self.interval.as_secs(),
            "Credential refresher started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!(generation = self.credentials.generation(), "Credential refresher stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.refresh_once().instrument(crate::tls_span!("refresh")).await {
                        Ok(Some(generation)) => info!(generation, "Reloaded TLS credentials"),
                        Ok(None) => debug!("TLS credential files unchanged"),
                        Err(e) => warn!(
                            error = %e,
                            generation = self.credentials.generation(),
                            "Failed to reload TLS credentials, keeping current generation"
                        ),
                    }
                }
            }
        }
    }
}

/// Stops the refresher task. Dropping the handle stops it too.
#[derive(Debug)]
pub struct RefresherHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RefresherHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Credential refresher task ended abnormally");
            }
        }
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
