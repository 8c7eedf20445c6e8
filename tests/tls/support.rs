use std::{
    fs,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use p12_keystore::{Certificate as P12Certificate, KeyStore, KeyStoreEntry, PrivateKeyChain};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ProtocolVersion, RootCertStore, ServerConfig};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use zts_identity::config::{PasswordSetting, StoreSettings, TlsSettings};

/// A leaf certificate and its key.
pub struct IssuedLeaf {
    pub cert_pem: String,
    pub cert_der: Vec<u8>,
    pub key_pem: String,
    pub key_der: Vec<u8>,
}

/// A throwaway CA plus a temp directory to write stores into.
pub struct TestPki {
    temp_dir: TempDir,
    ca: Certificate,
    ca_key: KeyPair,
}

impl TestPki {
    pub fn new() -> anyhow::Result<Self> {
        let mut params = CertificateParams::new(Vec::<String>::new()).context("build CA params")?;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages =
            vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign, KeyUsagePurpose::DigitalSignature];
        params.distinguished_name.push(DnType::CommonName, "ZTS Test CA");
        params.distinguished_name.push(DnType::OrganizationName, "Athenz");
        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::days(1);
        params.not_after = now + Duration::days(365);

        let ca_key = KeyPair::generate().context("generate CA key")?;
        let ca = params.self_signed(&ca_key).context("self-sign CA")?;
        let temp_dir = TempDir::new().context("create temp dir")?;

        Ok(Self { temp_dir, ca, ca_key })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub fn ca_der(&self) -> Vec<u8> {
        self.ca.der().to_vec()
    }

    /// Issue a `localhost` certificate valid for 30 days.
    pub fn issue(&self, common_name: &str) -> anyhow::Result<IssuedLeaf> {
        let now = OffsetDateTime::now_utc();
        self.issue_valid_between(common_name, now - Duration::days(1), now + Duration::days(30))
    }

    pub fn issue_valid_between(
        &self,
        common_name: &str,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    ) -> anyhow::Result<IssuedLeaf> {
        let mut params =
            CertificateParams::new(vec!["localhost".to_string()]).context("build leaf params")?;
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages =
            vec![ExtendedKeyUsagePurpose::ServerAuth, ExtendedKeyUsagePurpose::ClientAuth];
        params.not_before = not_before;
        params.not_after = not_after;

        let key = KeyPair::generate().context("generate leaf key")?;
        let cert = params.signed_by(&key, &self.ca, &self.ca_key).context("sign leaf")?;

        Ok(IssuedLeaf {
            cert_pem: cert.pem(),
            cert_der: cert.der().to_vec(),
            key_pem: key.serialize_pem(),
            key_der: key.serialize_der(),
        })
    }

    /// Write the leaf certificate and key as PEM files.
    pub fn write_pem_pair(&self, leaf: &IssuedLeaf, stem: &str) -> anyhow::Result<(PathBuf, PathBuf)> {
        let cert_path = self.path(&format!("{stem}.cert.pem"));
        let key_path = self.path(&format!("{stem}.key.pem"));
        fs::write(&cert_path, &leaf.cert_pem).context("write certificate")?;
        fs::write(&key_path, &leaf.key_pem).context("write private key")?;
        Ok((cert_path, key_path))
    }

    pub fn write_pem_truststore(&self, name: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(name);
        fs::write(&path, self.ca.pem()).context("write PEM truststore")?;
        Ok(path)
    }

    /// Key entry with the leaf and CA in its chain.
    pub fn write_pkcs12_keystore(
        &self,
        leaf: &IssuedLeaf,
        name: &str,
        password: &str,
    ) -> anyhow::Result<PathBuf> {
        let chain = vec![
            P12Certificate::from_der(&leaf.cert_der).context("leaf into p12")?,
            P12Certificate::from_der(self.ca.der()).context("CA into p12")?,
        ];
        let mut keystore = KeyStore::new();
        keystore.add_entry(
            "zts",
            KeyStoreEntry::PrivateKeyChain(PrivateKeyChain::new(leaf.key_der.clone(), b"zts-key", chain)),
        );
        self.write_keystore(&keystore, name, password)
    }

    /// Trusted-certificate entry for the CA.
    pub fn write_pkcs12_truststore(&self, name: &str, password: &str) -> anyhow::Result<PathBuf> {
        let mut keystore = KeyStore::new();
        keystore.add_entry(
            "zts-ca",
            KeyStoreEntry::Certificate(P12Certificate::from_der(self.ca.der()).context("CA into p12")?),
        );
        self.write_keystore(&keystore, name, password)
    }

    fn write_keystore(&self, keystore: &KeyStore, name: &str, password: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(name);
        let data = keystore.writer(password).write().context("encode PKCS#12")?;
        fs::write(&path, data).context("write PKCS#12 store")?;
        Ok(path)
    }

    /// Client config that trusts the CA but presents no certificate.
    pub fn anonymous_client(&self) -> anyhow::Result<Arc<ClientConfig>> {
        let mut roots = RootCertStore::empty();
        roots.add(CertificateDer::from(self.ca_der())).context("add CA root")?;
        let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .context("protocol versions")?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Arc::new(config))
    }

    /// Client config presenting `leaf`, offering every protocol version.
    pub fn authenticated_client(&self, leaf: &IssuedLeaf) -> anyhow::Result<Arc<ClientConfig>> {
        let mut roots = RootCertStore::empty();
        roots.add(CertificateDer::from(self.ca_der())).context("add CA root")?;
        let key = rustls::pki_types::PrivateKeyDer::Pkcs8(leaf.key_der.clone().into());
        let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .context("protocol versions")?
            .with_root_certificates(roots)
            .with_client_auth_cert(vec![CertificateDer::from(leaf.cert_der.clone())], key)
            .context("client auth cert")?;
        Ok(Arc::new(config))
    }
}

/// Keystore-pair settings with PKCS#12 stores.
pub fn keystore_settings(
    key_store: &Path,
    key_store_password: &str,
    trust_store: &Path,
    trust_store_password: &str,
) -> TlsSettings {
    TlsSettings {
        key_store: StoreSettings {
            path: Some(key_store.to_path_buf()),
            store_type: "PKCS12".into(),
            password: PasswordSetting::new(key_store_password, None),
        },
        trust_store: StoreSettings {
            path: Some(trust_store.to_path_buf()),
            store_type: "PKCS12".into(),
            password: PasswordSetting::new(trust_store_password, None),
        },
        ..Default::default()
    }
}

/// File-pair settings with a PEM truststore.
pub fn file_settings(cert: &Path, key: &Path, trust_store: &Path, refresh_secs: u64) -> TlsSettings {
    TlsSettings {
        use_file_cert_and_key: true,
        public_cert_path: Some(cert.to_path_buf()),
        private_key_path: Some(key.to_path_buf()),
        trust_store: StoreSettings {
            path: Some(trust_store.to_path_buf()),
            store_type: "PEM".into(),
            password: PasswordSetting::default(),
        },
        refresh_interval_secs: refresh_secs,
        ..Default::default()
    }
}

/// What one side of a completed handshake saw.
#[derive(Debug)]
pub struct Negotiated {
    pub protocol: Option<ProtocolVersion>,
    pub peer_certificates: Vec<CertificateDer<'static>>,
}

/// Run one handshake over an in-memory pipe and report both sides.
///
/// Both streams stay open until both sides finish, so TLS 1.3 session
/// tickets written after the client completes do not hit a closed pipe.
pub async fn handshake(
    server: Arc<ServerConfig>,
    client: Arc<ClientConfig>,
) -> (io::Result<Negotiated>, io::Result<Negotiated>) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let acceptor = TlsAcceptor::from(server);
    let connector = TlsConnector::from(client);

    let server_side = async move {
        let stream = acceptor.accept(server_io).await?;
        let (_, conn) = stream.get_ref();
        let negotiated = Negotiated {
            protocol: conn.protocol_version(),
            peer_certificates: conn.peer_certificates().map(<[_]>::to_vec).unwrap_or_default(),
        };
        Ok::<_, io::Error>((negotiated, stream))
    };
    let client_side = async move {
        let name = ServerName::try_from("localhost").map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let stream = connector.connect(name, client_io).await?;
        let (_, conn) = stream.get_ref();
        let negotiated = Negotiated {
            protocol: conn.protocol_version(),
            peer_certificates: conn.peer_certificates().map(<[_]>::to_vec).unwrap_or_default(),
        };
        Ok::<_, io::Error>((negotiated, stream))
    };

    let (server_result, client_result) = tokio::join!(server_side, client_side);
    let (server_result, server_stream) = split(server_result);
    let (client_result, client_stream) = split(client_result);
    drop((server_stream, client_stream));
    (server_result, client_result)
}

fn split<S>(result: io::Result<(Negotiated, S)>) -> (io::Result<Negotiated>, Option<S>) {
    match result {
        Ok((negotiated, stream)) => (Ok(negotiated), Some(stream)),
        Err(e) => (Err(e), None),
    }
}

/// Subject of the first peer certificate.
pub fn peer_subject(negotiated: &Negotiated) -> Option<String> {
    let leaf = negotiated.peer_certificates.first()?;
    zts_identity::utils::certificate_info(leaf, Path::new("peer")).ok().map(|info| info.subject)
}
