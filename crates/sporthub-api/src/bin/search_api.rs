//! Search service entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use sporthub_api::config::SearchConfig;
use sporthub_api::routes;
use sporthub_api::state::SearchState;
use sporthub_api::sync::SyncWorker;
use sporthub_api::{shutdown, telemetry};
use sporthub_broker::{RetryPolicy, Topology, connector_for_url};
use sporthub_search::cache::{InMemorySharedCache, RedisSharedCache, SharedCache};
use sporthub_search::infrastructure::{HttpDocumentSource, SolrIndex};
use sporthub_search::{Projector, SearchService};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

async fn shared_cache(redis_url: Option<&str>) -> Arc<dyn SharedCache> {
    let Some(url) = redis_url else {
        info!("REDIS_URL not set, using process-local shared cache");
        return Arc::new(InMemorySharedCache::new());
    };
    match RedisSharedCache::connect(url).await {
        Ok(cache) => Arc::new(cache),
        Err(err) => {
            warn!(error = %err, "redis unavailable, using process-local shared cache");
            Arc::new(InMemorySharedCache::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let _telemetry = telemetry::init("search-api")?;

    info!("starting search service");

    let config = SearchConfig::from_env()?;

    let index = Arc::new(SolrIndex::new(&config.solr_url, config.http_timeout)?);
    let search = Arc::new(SearchService::new(
        index.clone(),
        shared_cache(config.redis_url.as_deref()).await,
        config.local_cache_size,
        config.cache_ttl,
    ));
    let source = Arc::new(HttpDocumentSource::new(
        &config.activities_api_base,
        config.http_timeout,
    )?);
    let projector = Arc::new(Projector::new(
        index,
        source,
        search.clone(),
        config.max_redeliveries,
    ));

    let topology = Topology {
        exchange: config.broker.exchange.clone(),
        queue: config.queue.clone(),
        dead_letter_queue: Some(config.dead_letter_queue.clone()),
        binding_pattern: config.routing_key.clone(),
    };
    let worker = SyncWorker::new(
        connector_for_url(&config.broker.url, &config.broker.consumer)?,
        RetryPolicy::default(),
        topology,
        projector,
    );

    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(worker.run(shutdown.clone()));
    shutdown::cancel_on_signal(shutdown.clone());

    let app = routes::search_app(SearchState::new(search));

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

    shutdown.cancel();
    match tokio::time::timeout(config.shutdown_timeout, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "index sync task failed"),
        Err(_) => warn!("index sync did not stop in time"),
    }

    info!("search service stopped");
    Ok(())
}
