//! Activities service entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use sporthub_api::config::ActivitiesConfig;
use sporthub_api::routes;
use sporthub_api::state::ActivitiesState;
use sporthub_api::users::HttpUserDirectory;
use sporthub_api::{shutdown, telemetry};
use sporthub_broker::{
    BrokerPublisher, DisconnectedPublisher, RetryPolicy, connect_with_backoff, connector_for_url,
};
use sporthub_core::clock::SystemClock;
use sporthub_core::publisher::EventPublisher;
use sporthub_store::{PgActivityRepository, PgBookingRepository, PgSessionRepository};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let _telemetry = telemetry::init("activities-api")?;

    info!("starting activities service");

    let config = ActivitiesConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let shutdown = CancellationToken::new();
    shutdown::cancel_on_signal(shutdown.clone());

    let publisher: Arc<dyn EventPublisher> = match connector_for_url(&config.broker.url, &config.broker.consumer) {
        Ok(connector) => {
            match connect_with_backoff(connector.as_ref(), &RetryPolicy::default(), &shutdown).await
            {
                Some(broker) => Arc::new(BrokerPublisher::new(broker, &config.broker.exchange)),
                None => {
                    warn!("broker unavailable, events will not be published");
                    Arc::new(DisconnectedPublisher)
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "invalid broker url, events will not be published");
            Arc::new(DisconnectedPublisher)
        }
    };

    let state = ActivitiesState {
        clock: Arc::new(SystemClock),
        users: Arc::new(HttpUserDirectory::new(
            &config.users_api_base_url,
            config.http_timeout,
        )?),
        activities: Arc::new(PgActivityRepository::new(pool.clone())),
        sessions: Arc::new(PgSessionRepository::new(pool.clone())),
        bookings: Arc::new(PgBookingRepository::new(pool.clone())),
        publisher,
        branch_timeout: config.enroll_branch_timeout,
    };
    let app = routes::activities_app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();

    tokio::select! {
        result = server => result?,
        () = shutdown::deadline(shutdown.clone(), config.shutdown_timeout) => {
            warn!("shutdown timeout elapsed, dropping open connections");
        }
    }

    pool.close().await;
    info!("activities service stopped");
    Ok(())
}
