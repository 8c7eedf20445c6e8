//! # Command Line Interface
//!
//! Operator commands for checking a CSR against a claimed identity and for
//! dry-running TLS context construction from the environment.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::anyhow;
use clap::{Parser, Subcommand};

use crate::cert::{CsrValidator, IdentityClaim, InstanceRecord};
use crate::config::ZtsConfig;
use crate::observability::{init_logging, log_config_info};
use crate::secrets::SecretResolverRegistry;
use crate::tls::{build_client_or_server_context, build_server_context_factory};
use crate::utils::read_file_contents;

#[derive(Parser)]
#[command(name = "zts-identity")]
#[command(about = "ZTS certificate request validation and TLS bootstrap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a PEM CSR against a domain/service identity
    VerifyCsr {
        /// Path to the PEM encoded certificate request
        #[arg(long)]
        csr: PathBuf,

        #[arg(long)]
        domain: String,

        #[arg(long)]
        service: String,

        /// Service of a previously registered instance
        #[arg(long, requires = "instance_id")]
        instance_service: Option<String>,

        /// Id of a previously registered instance
        #[arg(long, requires = "instance_service")]
        instance_id: Option<String>,
    },

    /// Build the server factory and client/server context from the environment
    TlsCheck {
        /// Restrict the server protocols, e.g. TLSv1.2,TLSv1.3
        #[arg(long, value_delimiter = ',')]
        client_protocols: Vec<String>,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = ZtsConfig::from_env()?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;
    log_config_info(&config);

    match cli.command {
        Commands::VerifyCsr { csr, domain, service, instance_service, instance_id } => {
            let instance = instance_service.zip(instance_id).map(|(s, id)| InstanceRecord::new(s, id));
            verify_csr(&config, &csr, IdentityClaim::new(domain, service), instance.as_ref())
        }
        Commands::TlsCheck { client_protocols } => tls_check(&config, &client_protocols).await,
    }
}

fn verify_csr(
    config: &ZtsConfig,
    csr_path: &std::path::Path,
    claim: IdentityClaim,
    instance: Option<&InstanceRecord>,
) -> anyhow::Result<ExitCode> {
    let pem = read_file_contents(csr_path)
        .ok_or_else(|| anyhow!("Unable to read CSR from {}", csr_path.display()))?;

    let validator = CsrValidator::from_settings(&config.cert);
    if validator.verify_certificate_request_pem(&pem, &claim, instance) {
        println!("CSR accepted for {}", claim.expected_common_name());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("CSR rejected for {}", claim.expected_common_name());
        Ok(ExitCode::FAILURE)
    }
}

async fn tls_check(config: &ZtsConfig, client_protocols: &[String]) -> anyhow::Result<ExitCode> {
    let resolver = SecretResolverRegistry::with_builtin().build(&config.secrets)?;
    let resolver = resolver.as_deref();

    let allow = (!client_protocols.is_empty()).then_some(client_protocols);
    let factory = build_server_context_factory(&config.tls, allow, resolver);
    match factory.build_server_config() {
        Ok(_) => println!("server context: ok"),
        Err(e) => println!("server context: {e}"),
    }

    match build_client_or_server_context(&config.tls, resolver) {
        Some(mut context) => {
            println!(
                "client/server context: ok (mode {}, generation {})",
                context.mode(),
                context.generation()
            );
            context.shutdown().await;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("client/server context: unavailable, see log for details");
            Ok(ExitCode::FAILURE)
        }
    }
}
