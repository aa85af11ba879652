//! HTTP API server.
//!
//! Exposes the matching and rebalancing pipeline over a JSON HTTP API
//! so feed pollers, dashboards, and the contract wrapper can drive
//! Causeway remotely.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/categories` | The fixed humanitarian category list |
//! | `POST` | `/users` | Subscribe a user by concern |
//! | `GET`  | `/users/{id}/portfolio` | A user's current donation split |
//! | `POST` | `/articles` | Submit an article for processing |
//! | `POST` | `/donate` | Donate into the contract for a wallet |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "concern must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `bridge_error`
//! (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based dashboards.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use causeway_core::categories::CATEGORIES;
use causeway_core::models::{Article, Holding};
use causeway_core::store::Store;

use crate::chain::{is_wallet_address, ContractBridge};
use crate::config::Config;
use crate::engine::Engine;
use crate::fault::{Fault, FaultKind};
use crate::subscribe::subscribe_user;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    bridge: Option<Arc<dyn ContractBridge>>,
    engine: Arc<Engine>,
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and runs until
/// the process is terminated.
pub async fn run_server(
    config: &Config,
    store: Arc<dyn Store>,
    bridge: Option<Arc<dyn ContractBridge>>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());
    let engine = Arc::new(Engine::new(
        (*config).clone(),
        store.clone(),
        bridge.clone(),
    ));

    let state = AppState {
        config,
        store,
        bridge,
        engine,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/categories", get(handle_categories))
        .route("/users", post(handle_create_user))
        .route("/users/{id}/portfolio", get(handle_portfolio))
        .route("/articles", post(handle_article))
        .route("/donate", post(handle_donate))
        .layer(cors)
        .with_state(state);

    println!("Causeway server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable
/// message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 404 Not Found error.
fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Constructs a 502 error for contract bridge failures.
fn bridge_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "bridge_error".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 Internal Server Error.
fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Maps pipeline errors to the most appropriate HTTP status code.
///
/// The pipeline tags validation, lookup, and bridge failures with a
/// [`Fault`]; the tag survives `context` wrapping and is recovered here
/// with `downcast_ref`. Untagged errors are reported as 500.
fn classify_error(err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);

    match err.downcast_ref::<Fault>().map(|f| f.kind()) {
        Some(FaultKind::BadRequest) => bad_request(msg),
        Some(FaultKind::NotFound) => not_found(msg),
        Some(FaultKind::Bridge) => bridge_error(msg),
        None => internal(msg),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /categories ============

/// JSON response body for `GET /categories`.
#[derive(Serialize)]
struct CategoriesResponse {
    categories: Vec<&'static str>,
}

/// Handler for `GET /categories`.
///
/// Returns the fixed humanitarian category list charities and users
/// are matched against.
async fn handle_categories() -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: CATEGORIES.to_vec(),
    })
}

// ============ POST /users ============

/// JSON request body for `POST /users`.
#[derive(Deserialize)]
struct CreateUserRequest {
    concern: String,
    wallet: String,
    #[serde(default)]
    instant_updates: bool,
}

/// JSON response body for `POST /users`.
#[derive(Serialize)]
struct CreateUserResponse {
    id: String,
    wallet: String,
    categories: Vec<CategoryEntry>,
}

#[derive(Serialize)]
struct CategoryEntry {
    category: String,
    confidence: f64,
}

/// Handler for `POST /users`.
///
/// Embeds the concern, matches categories, stores the user, and
/// enrolls them on-chain when a bridge is configured.
async fn handle_create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, AppError> {
    let (user, matches) = subscribe_user(
        &state.config,
        state.store.as_ref(),
        state.bridge.as_ref(),
        &req.concern,
        &req.wallet,
        req.instant_updates,
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(CreateUserResponse {
        id: user.id,
        wallet: user.wallet,
        categories: matches
            .into_iter()
            .map(|m| CategoryEntry {
                category: m.category,
                confidence: m.similarity,
            })
            .collect(),
    }))
}

// ============ GET /users/{id}/portfolio ============

/// JSON response body for `GET /users/{id}/portfolio`.
#[derive(Serialize)]
struct PortfolioResponse {
    user_id: String,
    wallet: String,
    holdings: Vec<HoldingEntry>,
}

#[derive(Serialize)]
struct HoldingEntry {
    wallet: String,
    name: Option<String>,
    percentage: u32,
}

/// Handler for `GET /users/{id}/portfolio`.
///
/// On-chain state wins when a bridge is configured; otherwise the
/// local mirror is returned.
async fn handle_portfolio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PortfolioResponse>, AppError> {
    let user = state
        .store
        .get_user(&id)
        .await
        .map_err(classify_error)?
        .ok_or_else(|| not_found(format!("user not found: {}", id)))?;

    let holdings: Vec<Holding> = match &state.bridge {
        Some(bridge) => {
            let chain_user = bridge
                .get_user(&user.wallet)
                .await
                .map_err(classify_error)?
                .ok_or_else(|| not_found(format!("user {} is not enrolled on-chain", id)))?;
            let names = state
                .store
                .charity_names_by_wallets(&chain_user.addresses)
                .await
                .map_err(classify_error)?;
            chain_user
                .addresses
                .iter()
                .zip(chain_user.percentages.iter())
                .zip(names)
                .map(|((wallet, pct), name)| Holding {
                    wallet: wallet.clone(),
                    name,
                    percentage: *pct,
                })
                .collect()
        }
        None => state.store.portfolio(&id).await.map_err(classify_error)?,
    };

    Ok(Json(PortfolioResponse {
        user_id: user.id,
        wallet: user.wallet,
        holdings: holdings
            .into_iter()
            .map(|h| HoldingEntry {
                wallet: h.wallet,
                name: h.name,
                percentage: h.percentage,
            })
            .collect(),
    }))
}

// ============ POST /articles ============

/// JSON request body for `POST /articles`.
#[derive(Deserialize)]
struct ArticleRequest {
    title: String,
    #[serde(default)]
    description: String,
    link: String,
    #[serde(default)]
    published_at: Option<i64>,
}

/// JSON response body for `POST /articles`.
#[derive(Serialize)]
struct ArticleResponse {
    duplicate: bool,
    relevant: bool,
    subscribers: usize,
    rebalanced: usize,
    disbursed: usize,
}

/// Handler for `POST /articles`.
///
/// Runs the full pipeline for one article: relevance, category match,
/// urgency, and a rebalance for every subscriber of the top category.
async fn handle_article(
    State(state): State<AppState>,
    Json(req): Json<ArticleRequest>,
) -> Result<Json<ArticleResponse>, AppError> {
    if req.title.trim().is_empty() {
        return Err(bad_request("title must not be empty"));
    }
    if req.link.trim().is_empty() {
        return Err(bad_request("link must not be empty"));
    }

    let article = Article {
        title: req.title,
        description: req.description,
        link: req.link,
        published_at: req.published_at,
    };
    let outcome = state
        .engine
        .process_article(&article)
        .await
        .map_err(classify_error)?;

    Ok(Json(ArticleResponse {
        duplicate: outcome.skipped_duplicate,
        relevant: outcome.relevant,
        subscribers: outcome.subscribers,
        rebalanced: outcome.rebalanced,
        disbursed: outcome.disbursed,
    }))
}

// ============ POST /donate ============

/// JSON request body for `POST /donate`.
#[derive(Deserialize)]
struct DonateRequest {
    wallet: String,
    /// Donation amount in wei.
    amount: u64,
}

/// Handler for `POST /donate`.
///
/// Forwards a donation to the contract through the bridge. Requires a
/// configured bridge.
async fn handle_donate(
    State(state): State<AppState>,
    Json(req): Json<DonateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !is_wallet_address(&req.wallet) {
        return Err(bad_request(format!("invalid wallet address: {}", req.wallet)));
    }
    if req.amount == 0 {
        return Err(bad_request("amount must be greater than 0"));
    }
    let bridge = state
        .bridge
        .as_ref()
        .ok_or_else(|| bad_request("no contract bridge configured"))?;

    bridge
        .donate(&req.wallet, req.amount)
        .await
        .map_err(classify_error)?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_classify_tagged_faults() {
        let e = classify_error(Fault::bad_request("percentages must sum to 100, got 90"));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);

        let e = classify_error(Fault::not_found("user not found: u1"));
        assert_eq!(e.status, StatusCode::NOT_FOUND);

        let e = classify_error(Fault::bridge("Bridge call /split failed"));
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_classify_fault_through_context() {
        let err = Fault::bad_request("invalid wallet address: 0x12").context("while enrolling");
        let e = classify_error(err);
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_classify_untagged_errors_are_internal() {
        // Message wording must not influence the status for untagged
        // errors, however suggestive it reads.
        let e = classify_error(anyhow::anyhow!("invalid utf-8 in database row"));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);

        let e = classify_error(anyhow::anyhow!("row not found in cache"));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
