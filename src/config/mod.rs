//! # Configuration
//!
//! One immutable [`ZtsConfig`] is built at startup and handed to each
//! component. Nothing below this module reads the process environment.

pub mod env;
pub mod tls;

use std::path::PathBuf;

use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::errors::Result;

pub use tls::{
    CredentialMode, FileCertKeyPairConfig, KeystorePairConfig, PasswordSetting, StoreLocation,
    StoreSettings, StoreType, TlsSettings,
};

/// Default provider DNS suffix for service hostnames in SAN entries.
pub const DEFAULT_DNS_SUFFIX: &str = ".athenz.cloud";

/// Top-level configuration
#[derive(Debug, Clone, Default, Validate)]
pub struct ZtsConfig {
    #[validate(nested)]
    pub tls: TlsSettings,

    #[validate(nested)]
    pub cert: CertSettings,

    pub secrets: SecretsSettings,

    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl ZtsConfig {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            tls: TlsSettings::from_env(),
            cert: CertSettings::from_env(),
            secrets: SecretsSettings::from_env(),
            logging: LoggingConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// CSR naming configuration
#[derive(Debug, Clone, Serialize, Validate)]
pub struct CertSettings {
    /// Provider DNS suffix, e.g. `.zts.example.com`
    #[validate(custom(function = "validate_dns_suffix"))]
    pub dns_suffix: String,
}

impl Default for CertSettings {
    fn default() -> Self {
        Self { dns_suffix: DEFAULT_DNS_SUFFIX.to_string() }
    }
}

impl CertSettings {
    pub fn from_env() -> Self {
        Self {
            dns_suffix: env::string("ZTS_CERT_DNS_SUFFIX")
                .unwrap_or_else(|| DEFAULT_DNS_SUFFIX.to_string()),
        }
    }
}

fn validate_dns_suffix(suffix: &str) -> std::result::Result<(), ValidationError> {
    if suffix.len() < 2 || !suffix.starts_with('.') || suffix.ends_with('.') {
        let mut error = ValidationError::new("dns_suffix");
        error.message = Some("DNS suffix must start with '.' and name a domain".into());
        return Err(error);
    }
    Ok(())
}

/// Secret backend selection
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecretsSettings {
    /// Registered resolver id (`env`, `file`); unset or `none` disables.
    pub resolver: Option<String>,
    pub secret_dir: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

impl SecretsSettings {
    pub fn from_env() -> Self {
        Self {
            resolver: env::string("ZTS_SECRET_RESOLVER"),
            secret_dir: env::path("ZTS_SECRET_DIR"),
            env_prefix: env::string("ZTS_SECRET_ENV_PREFIX"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Enable JSON structured logging
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: env::string("ZTS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            json: env::boolean("ZTS_LOG_JSON", false),
        }
    }
}
