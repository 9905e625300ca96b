//! Checkout API and health HTTP server
//!
//! Endpoints:
//! - GET /health - Liveness probe (always returns 200 if server is running)
//! - GET /ready - Readiness probe (chain reached and wallet connected)
//! - GET /metrics - Prometheus-compatible metrics
//! - GET /stats - JSON checkout statistics
//! - POST /v1/checkout - Buy the wallet owner's cart
//! - DELETE /v1/cart/items/{line_id} - Remove a cart line
//! - POST /v1/wallet/connect, POST /v1/wallet/disconnect - Wallet session
//! - GET /v1/holdings/{token_id} - Wallet balance of a product token

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::U256;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::classify::{classify, Stage};
use crate::error::CartStoreError;
use crate::gateway::CollectionGateway;
use crate::service::CheckoutService;
use crate::types::{FailureKind, PurchaseOutcome, WalletIdentity};

/// Server state shared across handlers
pub struct HealthState {
    /// Service start time for uptime calculation
    pub start_time: Instant,

    pub service: Arc<CheckoutService>,

    /// Wallet checkouts are paid from
    pub wallet: WalletIdentity,

    pub collection: Arc<dyn CollectionGateway>,

    /// Whether the chain was reached at startup
    pub is_ready: RwLock<bool>,
}

impl HealthState {
    pub fn new(
        service: Arc<CheckoutService>,
        wallet: WalletIdentity,
        collection: Arc<dyn CollectionGateway>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            service,
            wallet,
            collection,
            is_ready: RwLock::new(false),
        }
    }

    /// Update readiness status
    pub async fn set_ready(&self, ready: bool) {
        *self.is_ready.write().await = ready;
    }
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub chain_connected: bool,
    pub wallet_connected: bool,
}

/// Stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_attempts: u64,
    pub total_confirmed: u64,
    pub total_failed: u64,
    pub approvals_requested: u64,
    pub cart_clear_failures: u64,
    pub success_rate: f64,
    pub last_transaction_id: Option<String>,
    pub last_confirmed_time: Option<String>,
    pub uptime_secs: u64,
}

/// Wallet session response
#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub address: String,
    pub chain_id: u64,
    pub connected: bool,
}

/// Holdings response
#[derive(Debug, Serialize)]
pub struct HoldingsResponse {
    pub wallet: String,
    pub token_id: String,
    pub balance: String,
}

/// Error body for non-checkout endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: FailureKind,
    pub message: String,
}

fn error_response(status: StatusCode, kind: FailureKind, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            kind,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Health check handler - liveness probe
async fn health_handler(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check handler - readiness probe
async fn ready_handler(State(state): State<Arc<HealthState>>) -> Response {
    let chain_connected = *state.is_ready.read().await;
    let wallet_connected = state.wallet.is_signable();

    let response = ReadyResponse {
        ready: chain_connected && wallet_connected,
        chain_connected,
        wallet_connected,
    };

    if response.ready {
        (StatusCode::OK, Json(response)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response)).into_response()
    }
}

/// Metrics handler - Prometheus format
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> String {
    let stats = state.service.stats().await;
    let uptime = state.start_time.elapsed().as_secs();
    let is_ready = if *state.is_ready.read().await { 1 } else { 0 };

    let mut out = String::new();

    let _ = writeln!(out, "# HELP cofi_checkout_attempts_total Total number of purchase attempts");
    let _ = writeln!(out, "# TYPE cofi_checkout_attempts_total counter");
    let _ = writeln!(out, "cofi_checkout_attempts_total {}", stats.total_attempts);
    let _ = writeln!(out);

    let _ = writeln!(out, "# HELP cofi_checkout_outcomes_total Purchase outcomes by result");
    let _ = writeln!(out, "# TYPE cofi_checkout_outcomes_total counter");
    let _ = writeln!(
        out,
        "cofi_checkout_outcomes_total{{status=\"confirmed\"}} {}",
        stats.total_confirmed
    );
    for kind in FailureKind::ALL {
        let _ = writeln!(
            out,
            "cofi_checkout_outcomes_total{{status=\"failed\",kind=\"{}\"}} {}",
            kind.as_str(),
            stats.failures(kind)
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "# HELP cofi_checkout_approvals_total Attempts that requested a token approval"
    );
    let _ = writeln!(out, "# TYPE cofi_checkout_approvals_total counter");
    let _ = writeln!(out, "cofi_checkout_approvals_total {}", stats.approvals_requested);
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "# HELP cofi_checkout_cart_clear_failures_total Confirmed purchases whose cart was not cleared"
    );
    let _ = writeln!(out, "# TYPE cofi_checkout_cart_clear_failures_total counter");
    let _ = writeln!(out, "cofi_checkout_cart_clear_failures_total {}", stats.cart_clear_failures);
    let _ = writeln!(out);

    let _ = writeln!(out, "# HELP cofi_checkout_uptime_seconds Service uptime in seconds");
    let _ = writeln!(out, "# TYPE cofi_checkout_uptime_seconds gauge");
    let _ = writeln!(out, "cofi_checkout_uptime_seconds {}", uptime);
    let _ = writeln!(out);

    let _ = writeln!(out, "# HELP cofi_checkout_ready Whether the service is ready");
    let _ = writeln!(out, "# TYPE cofi_checkout_ready gauge");
    let _ = writeln!(out, "cofi_checkout_ready {}", is_ready);

    out
}

/// Stats handler - JSON statistics
async fn stats_handler(State(state): State<Arc<HealthState>>) -> Json<StatsResponse> {
    let stats = state.service.stats().await;

    Json(StatsResponse {
        total_attempts: stats.total_attempts,
        total_confirmed: stats.total_confirmed,
        total_failed: stats.total_failed,
        approvals_requested: stats.approvals_requested,
        cart_clear_failures: stats.cart_clear_failures,
        success_rate: stats.success_rate(),
        last_transaction_id: stats.last_transaction_id.clone(),
        last_confirmed_time: stats.last_confirmed_time.map(|t| t.to_rfc3339()),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Checkout handler - the outcome is returned as data with 200
async fn checkout_handler(State(state): State<Arc<HealthState>>) -> Json<PurchaseOutcome> {
    Json(state.service.checkout(&state.wallet).await)
}

async fn remove_line_handler(
    State(state): State<Arc<HealthState>>,
    Path(line_id): Path<String>,
) -> Response {
    match state.service.remove_line(&state.wallet, &line_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(CartStoreError::HttpError { status: 404, .. }) => error_response(
            StatusCode::NOT_FOUND,
            FailureKind::InvalidRequest,
            "That item is no longer in your cart.",
        ),
        Err(e) => {
            warn!(line_id = %line_id, error = %e, "Failed to remove cart line");
            error_response(
                StatusCode::BAD_GATEWAY,
                FailureKind::Network,
                "Your cart could not be updated. Please try again.",
            )
        }
    }
}

fn wallet_response(wallet: &WalletIdentity) -> Json<WalletResponse> {
    Json(WalletResponse {
        address: wallet.address().to_string(),
        chain_id: wallet.chain_id(),
        connected: wallet.session().is_connected(),
    })
}

async fn connect_handler(State(state): State<Arc<HealthState>>) -> Json<WalletResponse> {
    state.wallet.session().connect();
    info!(wallet = %state.wallet.address(), "Wallet connected");
    wallet_response(&state.wallet)
}

async fn disconnect_handler(State(state): State<Arc<HealthState>>) -> Json<WalletResponse> {
    state.wallet.session().disconnect();
    info!(wallet = %state.wallet.address(), "Wallet disconnected");
    wallet_response(&state.wallet)
}

async fn holdings_handler(
    State(state): State<Arc<HealthState>>,
    Path(token_id): Path<String>,
) -> Response {
    let Ok(id) = token_id.parse::<U256>() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            FailureKind::InvalidRequest,
            "Unknown product token.",
        );
    };

    match state.collection.balance_of(state.wallet.address(), id).await {
        Ok(balance) => Json(HoldingsResponse {
            wallet: state.wallet.address().to_string(),
            token_id: id.to_string(),
            balance: balance.to_string(),
        })
        .into_response(),
        Err(raw) => {
            warn!(token_id = %id, error = %raw, "Holdings lookup failed");
            let failure = classify(Stage::Holdings, &raw);
            error_response(StatusCode::BAD_GATEWAY, failure.kind, failure.message)
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .route("/v1/checkout", post(checkout_handler))
        .route("/v1/cart/items/{line_id}", delete(remove_line_handler))
        .route("/v1/wallet/connect", post(connect_handler))
        .route("/v1/wallet/disconnect", post(disconnect_handler))
        .route("/v1/holdings/{token_id}", get(holdings_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server for the checkout API and probes
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    /// Create a new server
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Get shared state
    pub fn state(&self) -> Arc<HealthState> {
        Arc::clone(&self.state)
    }

    /// Run the server
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = create_router(Arc::clone(&self.state));

        info!(port = self.port, "Checkout API starting");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
