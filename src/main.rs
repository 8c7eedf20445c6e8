use std::process::ExitCode;

use zts_identity::cli;

fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() && ring::default_provider().install_default().is_err() {
        eprintln!("Warning: another crypto provider was installed concurrently");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    install_rustls_provider();

    // Load .env file if it exists (optional - won't fail if missing)
    // This must happen before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        // Only warn if the error is NOT "file not found"
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    cli::run_cli().await
}
