//! File-backed secret resolver.
//!
//! Each secret lives in its own file named after the app name inside a
//! directory, the layout used by mounted Kubernetes and Docker secrets.
//! Surrounding whitespace is trimmed.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::resolver::SecretResolver;

#[derive(Debug, Clone)]
pub struct FileSecretResolver {
    directory: PathBuf,
}

impl FileSecretResolver {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn secret_path(&self, app_name: &str) -> Option<PathBuf> {
        // App names are a single path component.
        if app_name.is_empty()
            || app_name.contains(['/', '\\'])
            || app_name == "."
            || app_name == ".."
        {
            return None;
        }
        Some(self.directory.join(app_name))
    }
}

impl SecretResolver for FileSecretResolver {
    fn application_secret(&self, app_name: &str, fallback: &str) -> String {
        let Some(path) = self.secret_path(app_name) else {
            debug!(app_name = %app_name, "App name is not a valid secret file name, using configured value");
            return fallback.to_string();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => contents.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Secret file not found, using configured value");
                fallback.to_string()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read secret file, using configured value");
                fallback.to_string()
            }
        }
    }

    fn resolver_type(&self) -> &'static str {
        "file"
    }
}
