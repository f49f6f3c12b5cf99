#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

use std::{net::SocketAddr, sync::Arc};

use hello_service::{
    auth::AzureAdProvider,
    config::Config,
    db::setup_database,
    geo::{CountryLookup, MaxMindCountryLookup, NoCountryLookup},
    graph::HttpGraphClient,
    http::{app, AppState},
    repo::PgSiteRepo,
    secrets::HttpVaultClient,
    session::Sessions,
    telemetry::{AppInsightsClient, TelemetrySink},
    validator::HeaderValidator,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let mut config = Config::load().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up logging from config; RUST_LOG still wins when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Init banner so container logs clearly show startup
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "hello-service starting up"
    );

    if let Some(vault) = HttpVaultClient::from_config(&config.vault) {
        tracing::info!("Resolving secrets from the vault...");
        config
            .resolve_secrets(&vault)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Database connection
    tracing::info!("Connecting to database...");
    let pool = setup_database(&config.database).await?;

    let countries: Arc<dyn CountryLookup> = match &config.geoip.database_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading GeoIP database");
            Arc::new(MaxMindCountryLookup::open(path)?)
        }
        None => {
            tracing::info!("GeoIP database not configured - countries will be reported as N/A");
            Arc::new(NoCountryLookup)
        }
    };

    let telemetry = AppInsightsClient::from_config(&config.telemetry)
        .map(|client| Arc::new(client) as Arc<dyn TelemetrySink>);
    if telemetry.is_none() {
        tracing::info!("Telemetry disabled - no instrumentation key");
    }

    let state = AppState {
        repo: Arc::new(PgSiteRepo::new(pool)),
        identity: Arc::new(AzureAdProvider::new(&config.oauth)?),
        profiles: Arc::new(HttpGraphClient::new(config.oauth.resource_endpoint())),
        countries,
        telemetry,
        sessions: Sessions::from_config(&config.session)
            .map_err(|e| anyhow::anyhow!("invalid session.secret_key: {e}"))?,
        validator: Arc::new(HeaderValidator::new()),
        base_uri: config.oauth.base_uri()?,
        logout_url: config.oauth.logout_url()?,
    };

    let app = app(state, &config.security_headers, &config.server.static_dir);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Starting server at http://{}/", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
