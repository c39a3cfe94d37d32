/// HTTP boundary: `/{exchange}/{ticker}`, `/healthcheck`, `/`
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::HistoryError;
use crate::exchange::ExchangeRegistry;
use crate::types::Exchange;

/// Status object returned for errors and health checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub status: String,
    pub description: String,
}

impl ErrorMessage {
    pub fn new(status: &str, description: impl Into<String>) -> Self {
        ErrorMessage {
            status: status.to_string(),
            description: description.into(),
        }
    }

    pub fn not_implemented() -> Self {
        Self::new("error", "not implemented")
    }
}

pub struct AppState {
    pub registry: ExchangeRegistry,
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_not_implemented))
        .route("/healthcheck", get(healthcheck))
        .route("/{exchange}/{ticker}", get(get_ticker))
        .with_state(state)
}

async fn get_ticker(
    State(state): State<Arc<AppState>>,
    Path((exchange, ticker)): Path<(String, String)>,
) -> Response {
    let ticker = ticker.to_lowercase();

    let client = match exchange.parse::<Exchange>() {
        Ok(exchange) => state.registry.get(exchange),
        Err(_) => None,
    };
    let Some(client) = client else {
        debug!("Unknown exchange requested: {}", exchange);
        return (StatusCode::NOT_FOUND, Json(ErrorMessage::not_implemented())).into_response();
    };

    match client.fetch_history(&ticker).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(e: HistoryError) -> Response {
    error!("[{}] request failed: {}", e.error_code(), e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorMessage::new("error", e.to_string())),
    )
        .into_response()
}

async fn healthcheck() -> Json<ErrorMessage> {
    Json(ErrorMessage::new("ok", "healthy"))
}

async fn root_not_implemented() -> Json<ErrorMessage> {
    Json(ErrorMessage::not_implemented())
}
