//! `chainreg serve` command: start the chain lookup HTTP server.
//!
//! Loads the TOML configuration, starts a background task that keeps the
//! fetched chain list fresh, then serves [`routes`](crate::routes) with
//! graceful shutdown support.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use dotenvy::dotenv;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tower_http::cors;

use crate::chain::{ChainRegistry, ChainSource};
use crate::config::load_config;
use crate::error::Error;
use crate::routes::{self, AppState};
use crate::signal::Shutdown;
use crate::telemetry::Telemetry;

/// Keeps the registry's fetched snapshot up to date until `token` is
/// cancelled.
///
/// The first fetch runs immediately. With `period` set the list is
/// re-fetched on that interval; otherwise the task exits after the first
/// successful fetch. Failures are logged and keep the previous snapshot.
pub async fn refresh_chains<S>(
    registry: Arc<ChainRegistry>,
    source: S,
    period: Option<Duration>,
    token: CancellationToken,
) where
    S: ChainSource,
{
    let Some(period) = period else {
        tokio::select! {
            result = registry.ensure_fetched(&source) => {
                if result.is_err() {
                    tracing::warn!("periodic refresh disabled, serving bundled chain data");
                }
            }
            () = token.cancelled() => {}
        }
        return;
    };

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(error) = registry.refresh(&source).await {
                    tracing::debug!(%error, "keeping previous chain snapshot");
                }
            }
            () = token.cancelled() => {
                tracing::debug!("chain refresh task stopped");
                return;
            }
        }
    }
}

/// Execute the `serve` command.
///
/// # Errors
///
/// Returns an error if configuration loading, HTTP client construction, or
/// server binding fails.
#[allow(clippy::cognitive_complexity)]
pub async fn run(config_path: &Path) -> Result<(), Error> {
    // Load .env variables
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_export(true)
        .register();

    let config = load_config(config_path)?;
    let registry = Arc::new(config.registry().build_registry());
    let fetcher = config
        .registry()
        .build_fetcher(config.rpc().client_id.as_deref())?;
    tracing::info!(
        endpoint = %fetcher.endpoint(),
        bundled = registry.bundled_snapshot().len(),
        policy = ?registry.policy(),
        "chain registry ready"
    );

    let shutdown = Shutdown::with_signals()
        .map_err(|e| Error::server_with("failed to install signal handlers", e))?;
    shutdown.spawn(refresh_chains(
        Arc::clone(&registry),
        fetcher,
        config.registry().refresh_interval(),
        shutdown.token(),
    ));

    let state = AppState {
        registry,
        rpc: config.rpc().context(),
    };
    let app = routes::router(state)
        .layer(telemetry.http_tracing())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|e| tracing::error!("Failed to bind to {}: {}", addr, e))
        .map_err(|e| Error::server_with(format!("failed to bind to {addr}"), e))?;

    let token = shutdown.token();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| Error::server_with("server error", e));

    shutdown.wait().await;
    tracing::info!("server stopped");
    result
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::chain::ChainFetcher;

    fn chain_list() -> String {
        json!({
            "data": [{
                "chainId": 31337,
                "slug": "devnet",
                "name": "Devnet",
                "rpc": ["http://127.0.0.1:8545"]
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn single_fetch_without_period() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/chains")
            .with_status(200)
            .with_body(chain_list())
            .expect(1)
            .create_async()
            .await;
        let fetcher = ChainFetcher::new(format!("{}/v1/chains", server.url()).parse().unwrap())
            .unwrap();
        let registry = Arc::new(ChainRegistry::bundled());

        refresh_chains(Arc::clone(&registry), fetcher, None, CancellationToken::new()).await;

        mock.assert_async().await;
        assert_eq!(registry.resolve_by_id(31337).unwrap().slug, "devnet");
        assert!(registry.resolve_by_id(1).is_none());
    }

    #[tokio::test]
    async fn periodic_refresh_stops_on_cancel() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/chains")
            .with_status(200)
            .with_body(chain_list())
            .expect_at_least(1)
            .create_async()
            .await;
        let fetcher = ChainFetcher::new(format!("{}/v1/chains", server.url()).parse().unwrap())
            .unwrap();
        let registry = Arc::new(ChainRegistry::bundled());
        let shutdown = Shutdown::new();

        shutdown.spawn(refresh_chains(
            Arc::clone(&registry),
            fetcher,
            Some(Duration::from_secs(3600)),
            shutdown.token(),
        ));
        for _ in 0..100 {
            if registry.fetched_snapshot().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        shutdown.wait().await;

        mock.assert_async().await;
        assert!(registry.resolve_by_slug("devnet").is_some());
    }

    #[tokio::test]
    async fn failing_periodic_refresh_keeps_loaded_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/chains")
            .with_status(500)
            .expect_at_least(2)
            .create_async()
            .await;
        let fetcher = ChainFetcher::new(format!("{}/v1/chains", server.url()).parse().unwrap())
            .unwrap();
        let registry = Arc::new(ChainRegistry::bundled());
        let mut devnet = crate::chain::ChainRecord::fallback(31337);
        devnet.slug = "devnet".to_owned();
        registry.load_snapshot([devnet]);
        let shutdown = Shutdown::new();

        shutdown.spawn(refresh_chains(
            Arc::clone(&registry),
            fetcher,
            Some(Duration::from_millis(10)),
            shutdown.token(),
        ));
        for _ in 0..100 {
            if mock.matched_async().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.wait().await;

        mock.assert_async().await;
        assert_eq!(registry.resolve_by_slug("devnet").unwrap().chain_id, 31337);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_bundled_data() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/chains")
            .with_status(500)
            .create_async()
            .await;
        let fetcher = ChainFetcher::new(format!("{}/v1/chains", server.url()).parse().unwrap())
            .unwrap();
        let registry = Arc::new(ChainRegistry::bundled());

        refresh_chains(Arc::clone(&registry), fetcher, None, CancellationToken::new()).await;

        assert!(registry.fetched_snapshot().is_none());
        assert_eq!(registry.resolve_by_id(137).unwrap().slug, "polygon");
    }
}
