//! HTTP route handlers for the chain lookup service.
//!
//! Read-only endpoints over a shared [`ChainRegistry`]:
//!
//! - `GET /`, `GET /health`
//! - `GET /v1/chains`: every resolvable record, in the chain-list envelope
//! - `GET /v1/chains/{key}`: one record by chain ID or slug
//! - `GET /v1/chains/{key}/rpc`: dispatchable RPC URL
//!
//! Errors use `{ "error": { "message": ... } }` so the list endpoint can
//! itself serve as a fetch source.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::chain::{
    ChainKey, ChainRecord, ChainRegistry, Placeholder, RpcContext, RpcError, resolve_rpc_url_with,
};

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    /// Resolver backing all lookups.
    pub registry: Arc<ChainRegistry>,
    /// Keys substituted into RPC templates when the request supplies none.
    pub rpc: RpcContext,
}

/// Type alias for the shared state used by Axum route handlers.
pub type SharedState = Arc<AppState>;

/// Creates the Axum router with all lookup endpoints.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/v1/chains", get(get_chains))
        .route("/v1/chains/{key}", get(get_chain))
        .route("/v1/chains/{key}/rpc", get(get_chain_rpc))
}

/// Builds the stateful router for `state`.
pub fn router(state: AppState) -> Router {
    routes().with_state(Arc::new(state))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "error": { "message": message.into() } })),
    )
        .into_response()
}

fn unknown_chain(key: &ChainKey) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("unknown chain '{key}'"))
}

/// `GET /`: simple greeting.
#[instrument(skip_all)]
async fn get_root() -> impl IntoResponse {
    (
        StatusCode::OK,
        concat!("Hello from ", env!("CARGO_PKG_NAME"), "!"),
    )
}

/// `GET /health`: liveness plus snapshot sizes.
#[instrument(skip_all)]
async fn get_health(State(state): State<SharedState>) -> impl IntoResponse {
    let stats = state.registry.stats();
    let mut body = json!({ "status": "ok" });
    if let (Some(map), Ok(serde_json::Value::Object(extra))) =
        (body.as_object_mut(), serde_json::to_value(stats))
    {
        map.extend(extra);
    }
    (StatusCode::OK, Json(body))
}

/// `GET /v1/chains`: all records, sorted by chain ID.
#[instrument(skip_all)]
async fn get_chains(State(state): State<SharedState>) -> impl IntoResponse {
    let records = state.registry.all();
    let data: Vec<&ChainRecord> = records.iter().map(AsRef::as_ref).collect();
    (StatusCode::OK, Json(json!({ "data": data })))
}

/// `GET /v1/chains/{key}`: record by ID or slug.
#[instrument(skip(state))]
async fn get_chain(State(state): State<SharedState>, Path(key): Path<String>) -> Response {
    let Ok(key) = key.parse::<ChainKey>();
    match state.registry.resolve(&key) {
        Some(record) => (StatusCode::OK, Json(json!({ "data": record.as_ref() }))).into_response(),
        None => unknown_chain(&key),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcQuery {
    client_id: Option<String>,
}

/// `GET /v1/chains/{key}/rpc`: resolved RPC URL.
///
/// `clientId` in the query string overrides the configured client ID.
#[instrument(skip(state, query))]
async fn get_chain_rpc(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Query(query): Query<RpcQuery>,
) -> Response {
    let Ok(key) = key.parse::<ChainKey>();
    let Some(record) = state.registry.resolve(&key) else {
        return unknown_chain(&key);
    };

    let ctx = match query.client_id {
        Some(client_id) if !client_id.is_empty() => state.rpc.clone().with_client_id(client_id),
        _ => state.rpc.clone(),
    };

    match resolve_rpc_url_with(&record, &ctx) {
        Ok(url) => (
            StatusCode::OK,
            Json(json!({ "data": { "chainId": record.chain_id, "url": url } })),
        )
            .into_response(),
        Err(RpcError::MissingValue {
            placeholder: Placeholder::ThirdwebApiKey,
            ..
        }) => error_response(
            StatusCode::BAD_REQUEST,
            "a client ID is required, pass ?clientId= or configure rpc.client_id",
        ),
        Err(err @ RpcError::InvalidValue { .. }) => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err) => {
            tracing::debug!(%err, chain_id = record.chain_id, "rpc resolution failed");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
    }
}
