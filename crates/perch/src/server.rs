//! REST surface over the mempool view service.
//!
//! Thin layer: every handler validates its inputs into core types, calls
//! one `MempoolView` operation, and maps the result onto a status code.
//! All reconciliation semantics live in `perch-core`.

mod error;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use perch_core::types::{Items, TransactionInfo, TransactionSummary, TxId, TxIdResponse};
use perch_core::{MempoolView, Paging};

use error::AppError;

// ==============================================================================
// Application State
// ==============================================================================

#[derive(Clone)]
pub struct AppState {
    pub view: Arc<MempoolView>,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

/// Submitted transactions are small; a 2 MB cap keeps oversized payloads
/// from tying up the submission route.
const SUBMIT_BODY_LIMIT: usize = 2 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let submit_route = Router::new()
        .route("/api/v1/transactions", post(submit_transaction))
        .layer(DefaultBodyLimit::max(SUBMIT_BODY_LIMIT));

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/transactions/unconfirmed", get(list_unconfirmed))
        .route(
            "/api/v1/transactions/unconfirmed/{id}",
            get(get_unconfirmed),
        )
        .route(
            "/api/v1/transactions/unconfirmed/byAddress/{address}",
            get(list_by_address),
        )
        .route(
            "/api/v1/transactions/unconfirmed/byErgoTree/{tree}",
            get(list_by_ergo_tree),
        )
        .merge(submit_route)
        .layer(cors)
        .with_state(Arc::new(state))
}

// ==============================================================================
// Handlers
// ==============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct PagingParams {
    offset: Option<u64>,
    limit: Option<u64>,
}

impl PagingParams {
    const DEFAULT_LIMIT: u64 = 20;

    fn into_paging(self) -> Result<Paging, AppError> {
        Paging::new(
            self.offset.unwrap_or(0),
            self.limit.unwrap_or(Self::DEFAULT_LIMIT),
        )
        .map_err(Into::into)
    }
}

async fn list_unconfirmed(
    State(state): State<SharedState>,
    Query(params): Query<PagingParams>,
) -> Result<Json<Items<TransactionInfo>>, AppError> {
    let paging = params.into_paging()?;
    let items = state.view.list_unconfirmed(paging).await?;
    Ok(Json(items))
}

async fn get_unconfirmed(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TransactionSummary>, AppError> {
    let id = TxId(id);
    match state.view.unconfirmed_summary(&id).await? {
        Some(summary) => Ok(Json(summary)),
        None => Err(AppError::NotFound(format!(
            "no unconfirmed transaction with id {id}"
        ))),
    }
}

async fn list_by_address(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Query(params): Query<PagingParams>,
) -> Result<Json<Items<TransactionInfo>>, AppError> {
    let paging = params.into_paging()?;
    let items = state
        .view
        .list_unconfirmed_by_address(&address, paging)
        .await?;
    Ok(Json(items))
}

async fn list_by_ergo_tree(
    State(state): State<SharedState>,
    Path(tree): Path<String>,
    Query(params): Query<PagingParams>,
) -> Result<Json<Items<TransactionInfo>>, AppError> {
    let paging = params.into_paging()?;
    let items = state
        .view
        .list_unconfirmed_by_ergo_tree(&tree, paging)
        .await?;
    Ok(Json(items))
}

async fn submit_transaction(
    State(state): State<SharedState>,
    payload: Result<Json<perch_core::types::Transaction>, JsonRejection>,
) -> Result<Json<TxIdResponse>, AppError> {
    let Json(tx) = payload
        .map_err(|rejection| AppError::BadRequest(format!("invalid transaction body: {rejection}")))?;
    let ack = state.view.submit(&tx).await?;
    Ok(Json(ack))
}
