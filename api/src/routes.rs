use application::{AccountService, ErrorKind, RepositoryError, RequestContext};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json as JsonResponse, Response},
    routing::get,
};
use domain::{AccountId, AccountInput};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    account_service: Arc<AccountService>,
    /// Root token; every request context is a child of it.
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(account_service: Arc<AccountService>, shutdown: CancellationToken) -> Self {
        Self {
            account_service,
            shutdown,
        }
    }

    fn request_context(&self) -> RequestContext {
        RequestContext::child_of(&self.shutdown)
    }
}

/// Error body returned for every failed request.
#[derive(Serialize, Debug)]
pub struct HttpError {
    pub code: u16,
    pub message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/accounts",
            get(list_accounts_handler).post(create_account_handler),
        )
        .route(
            "/api/v1/accounts/:id",
            get(get_account_handler)
                .put(update_account_handler)
                .delete(delete_account_handler),
        )
        .with_state(state)
}

// --- API Handlers ---

async fn health_check() -> impl IntoResponse {
    info!("Health check endpoint called");
    (StatusCode::OK, "OK")
}

/// Handler for creating an account (POST /api/v1/accounts).
async fn create_account_handler(
    State(state): State<AppState>,
    Json(payload): Json<AccountInput>,
) -> Response {
    let ctx = state.request_context();
    info!(request_id = ctx.request_id(), "Received request to create account");
    match state.account_service.create_account(&ctx, payload).await {
        Ok(account) => (StatusCode::OK, JsonResponse(account)).into_response(),
        Err(e) => map_repository_error_to_response(e),
    }
}

/// Handler for listing accounts (GET /api/v1/accounts).
async fn list_accounts_handler(State(state): State<AppState>) -> Response {
    let ctx = state.request_context();
    info!(request_id = ctx.request_id(), "Received request to list accounts");
    match state.account_service.list_accounts(&ctx).await {
        Ok(accounts) => (StatusCode::OK, JsonResponse(accounts)).into_response(),
        Err(e) => map_repository_error_to_response(e),
    }
}

/// Handler for fetching one account (GET /api/v1/accounts/:id).
async fn get_account_handler(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let ctx = state.request_context();
    info!(request_id = ctx.request_id(), id, "Received request to get account");
    match state
        .account_service
        .get_account(&ctx, AccountId::new(id))
        .await
    {
        Ok(account) => (StatusCode::OK, JsonResponse(account)).into_response(),
        Err(e) => map_repository_error_to_response(e),
    }
}

/// Handler for renaming an account (PUT /api/v1/accounts/:id). Responds with the updated record.
async fn update_account_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AccountInput>,
) -> Response {
    let ctx = state.request_context();
    info!(request_id = ctx.request_id(), id, "Received request to update account");
    match state
        .account_service
        .rename_account(&ctx, AccountId::new(id), payload)
        .await
    {
        Ok(account) => (StatusCode::OK, JsonResponse(account)).into_response(),
        Err(e) => map_repository_error_to_response(e),
    }
}

/// Handler for deleting an account (DELETE /api/v1/accounts/:id).
async fn delete_account_handler(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let ctx = state.request_context();
    info!(request_id = ctx.request_id(), id, "Received request to delete account");
    match state
        .account_service
        .delete_account(&ctx, AccountId::new(id))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => map_repository_error_to_response(e),
    }
}

/// Maps the repository error taxonomy onto HTTP status codes.
fn map_repository_error_to_response(err: RepositoryError) -> Response {
    let (status, message) = match err.kind() {
        ErrorKind::Validation => {
            warn!("Rejected invalid account input: {}", err);
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ErrorKind::NotFound => {
            warn!("Account lookup failed: {}", err);
            (StatusCode::NOT_FOUND, err.to_string())
        }
        ErrorKind::Storage => {
            error!("Underlying storage error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
            )
        }
    };
    let body = HttpError {
        code: status.as_u16(),
        message,
    };
    (status, JsonResponse(body)).into_response()
}
