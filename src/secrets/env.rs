//! Environment variable secret resolver.
//!
//! Secrets are read from variables named `<prefix><APP_NAME>`, where the app
//! name is upper-cased and every character outside `[A-Z0-9]` becomes `_`:
//!
//! ```bash
//! export ZTS_SECRET_ATHENZ_ZTS_KEYSTORE="changeit"
//! ```
//!
//! Intended for development and containers that inject secrets through the
//! environment. When the variable is unset the configured plaintext value is
//! used.

use std::env;

use tracing::debug;

use super::resolver::SecretResolver;

/// Default environment variable prefix for secrets.
pub const DEFAULT_SECRET_PREFIX: &str = "ZTS_SECRET_";

#[derive(Debug, Clone)]
pub struct EnvSecretResolver {
    prefix: String,
}

impl Default for EnvSecretResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_PREFIX)
    }
}

impl EnvSecretResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Converts an app name to the environment variable consulted for it.
    pub fn variable_for(&self, app_name: &str) -> String {
        let suffix: String = app_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", self.prefix, suffix)
    }
}

impl SecretResolver for EnvSecretResolver {
    fn application_secret(&self, app_name: &str, fallback: &str) -> String {
        let variable = self.variable_for(app_name);
        match env::var(&variable) {
            Ok(value) => value,
            Err(_) => {
                debug!(app_name = %app_name, variable = %variable, "Secret not set in environment, using configured value");
                fallback.to_string()
            }
        }
    }

    fn resolver_type(&self) -> &'static str {
        "env"
    }
}
