//! # Observability
//!
//! Structured logging for validation decisions and TLS context lifecycle.

pub mod logging;

pub use logging::{init_logging, log_config_info};
