//! # Secret Resolution
//!
//! Passwords for keystores and truststores may be stored in plaintext
//! configuration or held by a secret-management backend. Every password goes
//! through [`resolve_secret`], so callers never special-case the absence of a
//! backend.
//!
//! Backends are chosen by identifier through [`SecretResolverRegistry`]:
//!
//! - `env`: `ZTS_SECRET_<APP_NAME>` environment variables
//! - `file`: one file per app name under `ZTS_SECRET_DIR`

pub mod env;
pub mod file;
pub mod registry;
pub mod resolver;
pub mod types;

pub use env::EnvSecretResolver;
pub use file::FileSecretResolver;
pub use registry::SecretResolverRegistry;
pub use resolver::{resolve_secret, SecretResolver};
pub use types::SecretString;
