//! heimdalld: Heimdall admission daemon.
//!
//! Owns the global slot count and serves it over TCP, so that every
//! request-handling process shares one [`AdmissionControl`](heimdall::AdmissionControl)
//! authority.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use heimdall::LocalAdmission;
use heimdall::server::AdmissionService;
use heimdall::server::config::Config;

/// Heimdall daemon, the global admission authority.
#[derive(Parser)]
#[command(name = "heimdalld")]
#[command(version = heimdall::PKG_VERSION)]
#[command(about = "Heimdall admission control daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let admission = config.admission_config();

    info!(
        version = heimdall::PKG_VERSION,
        addr = %config.server.address,
        capacity = admission.capacity,
        "heimdalld starting"
    );

    let listener = TcpListener::bind(&config.server.address)
        .await
        .map_err(|e| {
            heimdall::HeimdallError::Configuration(format!(
                "cannot bind {}: {e}",
                config.server.address
            ))
        })?;

    let authority = LocalAdmission::spawn(admission);
    let service = AdmissionService::new(Arc::new(authority));
    service
        .serve_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
