//! facturador API server
//!
//! Long-running issuing service: loads the signing bundle, wires the
//! SOAP client and repository, and serves the JSON API.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use facturador::config::Config;
use facturador::http::{create_router, AppState};
use facturador::service::DocumentService;
use facturador::signer::XadesSigner;
use facturador::storage::MemoryRepository;
use facturador::sunat::SunatClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facturador=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Unrecoverable startup failures (bad key, bad config) exit with 1.
    let config = Config::from_env()?;

    let signer = XadesSigner::from_pkcs12_file(&config.cert_path, &config.cert_pass)?;
    info!(cert_path = %config.cert_path, "signing certificate loaded");

    let sunat = SunatClient::new(&config.sunat_url, &config.sunat_user, &config.sunat_pass)?;
    info!(url = %config.sunat_url, "SUNAT client configured");

    let repository = Arc::new(MemoryRepository::new());
    let service = Arc::new(DocumentService::new(
        repository,
        Arc::new(signer),
        Arc::new(sunat),
    ));

    let app = create_router(AppState { service });

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Server listening on {}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
