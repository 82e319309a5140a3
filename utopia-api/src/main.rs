use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utopia_api::{app, AppState};
use utopia_booking::{ExpirySweeper, ReservationService};
use utopia_core::repository::{FlightRepository, TicketStore, UserRepository};
use utopia_store::app_config::Config;
use utopia_store::{DbClient, MemoryDirectory, MemoryTicketStore, PostgresDirectory, PostgresTicketStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "utopia_api=debug,utopia_booking=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Utopia booking API on port {}", config.server.port);

    match config.database.url.clone() {
        Some(url) => {
            let db = DbClient::new(&url, &config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            let store = Arc::new(PostgresTicketStore::new(db.pool.clone()));
            let directory = Arc::new(PostgresDirectory::new(db.pool.clone()));
            serve(config, store, directory).await
        }
        None => {
            tracing::warn!("No database.url configured, bookings are kept in memory only");
            serve(
                config,
                Arc::new(MemoryTicketStore::new()),
                Arc::new(MemoryDirectory::new()),
            )
            .await
        }
    }
}

async fn serve<S, D>(config: Config, store: Arc<S>, directory: Arc<D>) -> anyhow::Result<()>
where
    S: TicketStore + 'static,
    D: FlightRepository + UserRepository + 'static,
{
    let service = Arc::new(
        ReservationService::new(store, directory, &config.booking)
            .context("Invalid booking rules")?,
    );

    if config.booking.sweep_interval_seconds > 0 {
        let sweeper = ExpirySweeper::new(
            service.clone(),
            Duration::from_secs(config.booking.sweep_interval_seconds),
        );
        tokio::spawn(sweeper.run());
    } else {
        tracing::info!("Expiry sweeper disabled");
    }

    let app = app(AppState::new(service));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
