//! # ZTS Identity
//!
//! Certificate-request validation and mutual-TLS bootstrap for a workload
//! identity service.
//!
//! ## Core Components
//!
//! - **CSR Validator** ([`cert::CsrValidator`]): checks that a PKCS#10
//!   request names the claimed domain/service and, when given, a registered
//!   instance
//! - **Identity Generator** ([`cert::generate_identity`]): hands an accepted
//!   request to an external signer
//! - **TLS Context Builder** ([`tls`]): server context factory and the
//!   client/server context with live credential rotation
//! - **Secret Resolver** ([`secrets`]): pluggable password backends
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use zts_identity::cert::{CsrValidator, IdentityClaim};
//! use zts_identity::ZtsConfig;
//!
//! # fn main() -> zts_identity::Result<()> {
//! let config = ZtsConfig::from_env()?;
//! let validator = CsrValidator::from_settings(&config.cert);
//! let claim = IdentityClaim::new("sports", "api");
//! let accepted = validator.verify_certificate_request_pem("-----BEGIN ...", &claim, None);
//! # let _ = accepted;
//! # Ok(())
//! # }
//! ```

pub mod cert;
pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;
pub mod tls;
pub mod utils;

// Re-export commonly used types and traits
pub use config::ZtsConfig;
pub use errors::{Error, Result};
pub use observability::init_logging;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
