//! # Structured Logging
//!
//! Span macros and subscriber setup built on the tracing ecosystem.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::{Error, Result};

/// Create a tracing span for one CSR validation pass.
///
/// ```rust,ignore
/// let _span = csr_span!("sports", "api").entered();
/// ```
#[macro_export]
macro_rules! csr_span {
    ($domain:expr, $service:expr) => {
        tracing::debug_span!("csr_validation", domain = %$domain, service = %$service)
    };
    ($domain:expr, $service:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "csr_validation",
            domain = %$domain,
            service = %$service,
            $($field)*
        )
    };
}

/// Create a tracing span for TLS context construction or refresh.
#[macro_export]
macro_rules! tls_span {
    ($operation:expr) => {
        tracing::info_span!("tls_context", operation = %$operation)
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info_span!("tls_context", operation = %$operation, $($field)*)
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.map_err(|e| Error::internal(format!("Failed to install log subscriber: {}", e)))
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::ZtsConfig) {
    tracing::info!(
        dns_suffix = %config.cert.dns_suffix,
        file_cert_mode = config.tls.use_file_cert_and_key,
        want_client_auth = config.tls.want_client_auth,
        secret_resolver = config.secrets.resolver.as_deref().unwrap_or("none"),
        json_logging = config.logging.json,
        "ZTS identity configuration"
    );
}
