//! # TLS Context Builder
//!
//! Two entry points build transport security for the platform's endpoints:
//!
//! - [`build_server_context_factory`] captures listener settings (stores,
//!   cipher and protocol exclusions, optional client certificates).
//! - [`build_client_or_server_context`] builds the mutually authenticated
//!   context, either from a keystore pair or from PEM files that are
//!   reloaded in the background.

pub mod context;
pub mod credentials;
pub mod keystore;
pub mod protocols;
pub mod refresher;
pub mod server;

pub use context::{build_client_or_server_context, ContextMode, TlsContext};
pub use credentials::{CredentialGeneration, CredentialMaterial, LiveCredentialSet};
pub use keystore::{load_key_store, load_trust_store};
pub use refresher::{CredentialRefresher, FileCredentialSource, RefresherHandle};
pub use server::{build_server_context_factory, ServerContextFactory};
