//! Secret resolver registry
//!
//! Maps the identifier named in configuration to a resolver factory. The
//! registry is consulted once at startup; an identifier nobody registered is
//! a configuration error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::env::{EnvSecretResolver, DEFAULT_SECRET_PREFIX};
use super::file::FileSecretResolver;
use super::resolver::SecretResolver;
use crate::config::SecretsSettings;
use crate::errors::{Error, Result};

/// Builds a resolver from the secrets section of the configuration.
pub type ResolverFactory =
    Box<dyn Fn(&SecretsSettings) -> Result<Arc<dyn SecretResolver>> + Send + Sync>;

/// Identifiers meaning "no backend, use plaintext configuration".
const DISABLED_IDS: &[&str] = &["", "none"];

pub struct SecretResolverRegistry {
    factories: HashMap<String, ResolverFactory>,
}

impl std::fmt::Debug for SecretResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretResolverRegistry")
            .field("resolvers", &self.registered_ids())
            .finish()
    }
}

impl Default for SecretResolverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl SecretResolverRegistry {
    /// Create a registry with no resolvers
    pub fn empty() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Create a registry with the `env` and `file` resolvers
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();

        registry.register("env", |settings: &SecretsSettings| {
            let prefix = settings.env_prefix.as_deref().unwrap_or(DEFAULT_SECRET_PREFIX);
            Ok(Arc::new(EnvSecretResolver::new(prefix)) as Arc<dyn SecretResolver>)
        });

        registry.register("file", |settings: &SecretsSettings| {
            let directory = settings.secret_dir.clone().ok_or_else(|| {
                Error::config("Secret resolver 'file' requires ZTS_SECRET_DIR to be set")
            })?;
            Ok(Arc::new(FileSecretResolver::new(directory)) as Arc<dyn SecretResolver>)
        });

        registry
    }

    /// Register a resolver factory under an identifier
    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(&SecretsSettings) -> Result<Arc<dyn SecretResolver>> + Send + Sync + 'static,
    {
        let id = id.trim().to_ascii_lowercase();
        info!(resolver = %id, "Registering secret resolver");
        self.factories.insert(id, Box::new(factory));
    }

    pub fn has_resolver(&self, id: &str) -> bool {
        self.factories.contains_key(&id.trim().to_ascii_lowercase())
    }

    /// Registered identifiers, sorted
    pub fn registered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Resolve the configured resolver.
    ///
    /// Returns `Ok(None)` when no resolver is configured.
    pub fn build(&self, settings: &SecretsSettings) -> Result<Option<Arc<dyn SecretResolver>>> {
        let id = settings.resolver.as_deref().unwrap_or("").trim().to_ascii_lowercase();

        if DISABLED_IDS.contains(&id.as_str()) {
            info!("No secret resolver configured, passwords are taken from configuration");
            return Ok(None);
        }

        let factory = self.factories.get(&id).ok_or_else(|| {
            Error::config(format!(
                "Unknown secret resolver '{}' (registered: {})",
                id,
                self.registered_ids().join(", ")
            ))
        })?;

        let resolver = factory(settings)?;
        info!(resolver = %resolver.resolver_type(), "Secret resolver initialized");
        Ok(Some(resolver))
    }
}
