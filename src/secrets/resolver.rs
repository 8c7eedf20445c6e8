use std::fmt;

/// A pluggable secret-management backend.
///
/// `app_name` identifies the secret. `fallback` is the value found in plain
/// configuration; each backend decides whether it is a default to return when
/// nothing is stored, or a sealed value it knows how to open.
pub trait SecretResolver: Send + Sync + fmt::Debug {
    fn application_secret(&self, app_name: &str, fallback: &str) -> String;

    /// Identifier the backend is registered under.
    fn resolver_type(&self) -> &'static str;
}

/// Resolve a configured password through the optional backend.
///
/// Without a backend the plaintext value is returned unchanged.
pub fn resolve_secret(
    resolver: Option<&dyn SecretResolver>,
    app_name: &str,
    plaintext_fallback: &str,
) -> String {
    match resolver {
        Some(resolver) => resolver.application_secret(app_name, plaintext_fallback),
        None => plaintext_fallback.to_string(),
    }
}
