use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use validator::Validate;

use super::env;
use crate::errors::TlsError;
use crate::secrets::{resolve_secret, SecretResolver, SecretString};

/// Cipher suites excluded unless configuration says otherwise.
pub const DEFAULT_EXCLUDED_CIPHER_SUITES: &[&str] = &[
    "SSL_RSA_WITH_DES_CBC_SHA",
    "SSL_DHE_RSA_WITH_DES_CBC_SHA",
    "SSL_DHE_DSS_WITH_DES_CBC_SHA",
    "SSL_RSA_EXPORT_WITH_RC4_40_MD5",
    "SSL_RSA_EXPORT_WITH_DES40_CBC_SHA",
    "SSL_DHE_RSA_EXPORT_WITH_DES40_CBC_SHA",
    "SSL_DHE_DSS_EXPORT_WITH_DES40_CBC_SHA",
];

/// Protocols excluded unless configuration says otherwise.
pub const DEFAULT_EXCLUDED_PROTOCOLS: &[&str] = &["SSLv2", "SSLv3"];

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;

/// On-disk container format for keys and trust anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreType {
    #[default]
    Pkcs12,
    Pem,
}

impl FromStr for StoreType {
    type Err = TlsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PKCS12" | "P12" | "PFX" => Ok(StoreType::Pkcs12),
            "PEM" => Ok(StoreType::Pem),
            other => Err(TlsError::UnsupportedStoreType(other.to_string())),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreType::Pkcs12 => write!(f, "PKCS12"),
            StoreType::Pem => write!(f, "PEM"),
        }
    }
}

/// A password that may be plaintext or a reference understood by the secret
/// resolver under `app_name`.
#[derive(Debug, Clone, Default)]
pub struct PasswordSetting {
    pub value: Option<SecretString>,
    pub app_name: Option<String>,
}

impl PasswordSetting {
    pub fn new(value: impl Into<SecretString>, app_name: Option<&str>) -> Self {
        Self { value: Some(value.into()), app_name: app_name.map(str::to_string) }
    }

    fn from_env(value_key: &str, app_name_key: &str) -> Self {
        Self { value: env::string(value_key).map(SecretString::new), app_name: env::string(app_name_key) }
    }

    /// Resolve through the optional backend. An unset or empty password
    /// stays unset and is not sent to the backend.
    pub fn resolve(&self, resolver: Option<&dyn SecretResolver>) -> Option<SecretString> {
        let value = self.value.as_ref().filter(|value| !value.is_empty())?;
        let app_name = self.app_name.as_deref().unwrap_or_default();
        Some(SecretString::new(resolve_secret(resolver, app_name, value.expose_secret())))
    }

    /// Resolve for context construction. With an app name the backend is
    /// always consulted, falling back to the plaintext value or `""`.
    pub fn resolve_with_lookup(&self, resolver: Option<&dyn SecretResolver>) -> Option<SecretString> {
        let Some(app_name) = self.app_name.as_deref().filter(|name| !name.is_empty()) else {
            return self.resolve(resolver);
        };
        let fallback = self.value.as_ref().map(SecretString::expose_secret).unwrap_or_default();
        let resolved = resolve_secret(resolver, app_name, fallback);
        (!resolved.is_empty()).then(|| SecretString::new(resolved))
    }
}

/// Raw keystore or truststore settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub path: Option<PathBuf>,
    pub store_type: String,
    pub password: PasswordSetting,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { path: None, store_type: StoreType::Pkcs12.to_string(), password: PasswordSetting::default() }
    }
}

impl StoreSettings {
    fn from_env(prefix: &str) -> Self {
        Self {
            path: env::path(prefix),
            store_type: env::string(&format!("{prefix}_TYPE"))
                .unwrap_or_else(|| StoreType::Pkcs12.to_string()),
            password: PasswordSetting::from_env(
                &format!("{prefix}_PASSWORD"),
                &format!("{prefix}_PASSWORD_APPNAME"),
            ),
        }
    }

    fn locate(&self, missing: TlsError) -> Result<StoreLocation, TlsError> {
        let path = self.path.clone().ok_or(missing)?;
        Ok(StoreLocation { path, store_type: self.store_type.parse()?, password: self.password.clone() })
    }
}

/// A store that is known to be configured.
#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub store_type: StoreType,
    pub password: PasswordSetting,
}

/// TLS credential configuration as read from the environment.
///
/// Use [`TlsSettings::credential_mode`] to obtain a mode whose required
/// fields are all present.
#[derive(Debug, Clone, Validate)]
pub struct TlsSettings {
    pub key_store: StoreSettings,
    pub key_manager_password: PasswordSetting,
    pub trust_store: StoreSettings,
    pub excluded_cipher_suites: Vec<String>,
    pub excluded_protocols: Vec<String>,
    pub want_client_auth: bool,
    pub use_file_cert_and_key: bool,
    pub public_cert_path: Option<PathBuf>,
    pub private_key_path: Option<PathBuf>,
    #[validate(range(min = 1, max = 86400, message = "Refresh interval must be between 1 and 86400 seconds"))]
    pub refresh_interval_secs: u64,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            key_store: StoreSettings::default(),
            key_manager_password: PasswordSetting::default(),
            trust_store: StoreSettings::default(),
            excluded_cipher_suites: to_strings(DEFAULT_EXCLUDED_CIPHER_SUITES),
            excluded_protocols: to_strings(DEFAULT_EXCLUDED_PROTOCOLS),
            want_client_auth: false,
            use_file_cert_and_key: false,
            public_cert_path: None,
            private_key_path: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl TlsSettings {
    /// Load TLS settings from `ZTS_SSL_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            key_store: StoreSettings::from_env("ZTS_SSL_KEY_STORE"),
            key_manager_password: PasswordSetting::from_env(
                "ZTS_SSL_KEY_MANAGER_PASSWORD",
                "ZTS_SSL_KEY_MANAGER_PASSWORD_APPNAME",
            ),
            trust_store: StoreSettings::from_env("ZTS_SSL_TRUST_STORE"),
            excluded_cipher_suites: env::list("ZTS_SSL_EXCLUDED_CIPHER_SUITES")
                .unwrap_or_else(|| to_strings(DEFAULT_EXCLUDED_CIPHER_SUITES)),
            excluded_protocols: env::list("ZTS_SSL_EXCLUDED_PROTOCOLS")
                .unwrap_or_else(|| to_strings(DEFAULT_EXCLUDED_PROTOCOLS)),
            want_client_auth: env::boolean("ZTS_SSL_WANT_CLIENT_CERT", false),
            use_file_cert_and_key: env::boolean("ZTS_SSL_USE_FILE_CERT_AND_KEY", false),
            public_cert_path: env::path("ZTS_SSL_PUBLIC_CERT_PATH"),
            private_key_path: env::path("ZTS_SSL_PRIVATE_KEY_PATH"),
            refresh_interval_secs: env::unsigned(
                "ZTS_SSL_CERT_REFRESH_SECS",
                DEFAULT_REFRESH_INTERVAL_SECS,
            ),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Select the credential mode and check that its required paths are set.
    pub fn credential_mode(&self) -> Result<CredentialMode, TlsError> {
        if self.use_file_cert_and_key {
            let trust_store = self.trust_store.locate(TlsError::MissingTrustStorePath)?;
            let cert_path =
                self.public_cert_path.clone().ok_or(TlsError::MissingCertificatePath)?;
            let key_path = self.private_key_path.clone().ok_or(TlsError::MissingPrivateKeyPath)?;

            return Ok(CredentialMode::FileCertKeyPair(FileCertKeyPairConfig {
                trust_store,
                cert_path,
                key_path,
                refresh_interval: self.refresh_interval(),
            }));
        }

        let key_store = self.key_store.locate(TlsError::MissingKeyStorePath)?;
        let trust_store = self.trust_store.locate(TlsError::MissingTrustStorePath)?;
        Ok(CredentialMode::KeystorePair(KeystorePairConfig {
            key_store,
            trust_store,
            key_manager_password: self.key_manager_password.clone(),
        }))
    }
}

/// How the client/server TLS context obtains its credentials.
#[derive(Debug, Clone)]
pub enum CredentialMode {
    /// Key material and trust anchors from two keystores, loaded once.
    KeystorePair(KeystorePairConfig),
    /// PEM certificate and key files watched by a refresher, plus a truststore.
    FileCertKeyPair(FileCertKeyPairConfig),
}

#[derive(Debug, Clone)]
pub struct KeystorePairConfig {
    pub key_store: StoreLocation,
    pub trust_store: StoreLocation,
    pub key_manager_password: PasswordSetting,
}

#[derive(Debug, Clone)]
pub struct FileCertKeyPairConfig {
    pub trust_store: StoreLocation,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub refresh_interval: Duration,
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
