//! HTTP surfaces for the kiosk, the operator console and the public display
//!
//! # Routes
//!
//! - `GET /health` - Liveness and store backend
//! - `GET /metrics` - Prometheus metrics
//! - `GET /kiosk/categories` - Categories a customer can take a ticket for
//! - `POST /kiosk/tickets` - Take a ticket (body: `{"category": "..."}`), rate limited
//! - `GET /display` - Company, visible waiting/called tickets and server time
//! - `POST /console/call` - Call a ticket (body: `{"ticketId": "T3", "window": 2}`);
//!   an unknown ticket is 404 before the window is checked
//! - `GET /console/tickets` - Every retained ticket
//! - `GET /console/history` - Tickets past the most recent ones
//! - `GET /console/windows`, `POST /console/windows` - List or add categories
//! - `DELETE /console/windows/{id}` - Remove a category
//! - `GET /company`, `PUT /company` - Company profile
//!
//! # Example
//!
//! ```no_run
//! use queuedesk::config::QueueConfig;
//! use queuedesk::server::QueueServer;
//! use queuedesk::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = QueueConfig::new();
//!     let server = QueueServer::new(Arc::new(MemoryStore::new()), &config);
//!
//!     server.run("127.0.0.1:8090").await.expect("Server failed");
//! }
//! ```

mod rate_limit;

pub use rate_limit::{RateLimitConfig, RateLimitError, RateLimiter};

use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::ledger::{RetentionPolicy, TicketLedger};
use crate::model::{CompanyProfile, Ticket, TicketId, WindowId};
use crate::registry::{CompanySetup, WindowRegistry};
use crate::store::SharedStore;
use crate::sync::{metrics, SharedSnapshot};
use crate::{QueueError, Result};
use axum::{
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit, Path, State},
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared server state
pub struct AppState {
    store: Arc<dyn SharedStore>,
    ledger: TicketLedger,
    registry: WindowRegistry,
    company: CompanySetup,
    policy: RetentionPolicy,
    clock: Arc<dyn Clock>,
    snapshot: Option<SharedSnapshot>,
    rate_limiter: RateLimiter,
}

/// HTTP server over one shared store
pub struct QueueServer {
    state: AppState,
}

impl QueueServer {
    pub fn new(store: Arc<dyn SharedStore>, config: &QueueConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            state: AppState {
                ledger: TicketLedger::new(store.clone())
                    .with_policy(config.retention.clone())
                    .with_clock(clock.clone()),
                registry: WindowRegistry::new(store.clone()).with_clock(clock.clone()),
                company: CompanySetup::new(store.clone()),
                policy: config.retention.clone(),
                clock,
                snapshot: None,
                rate_limiter: RateLimiter::with_config(RateLimitConfig::from(&config.server)),
                store,
            },
        }
    }

    /// Serve the display from a poll loop's snapshot instead of reading the store
    pub fn with_snapshot(mut self, snapshot: SharedSnapshot) -> Self {
        self.state.snapshot = Some(snapshot);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.state.ledger = TicketLedger::new(self.state.store.clone())
            .with_policy(self.state.policy.clone())
            .with_clock(clock.clone());
        self.state.registry = WindowRegistry::new(self.state.store.clone()).with_clock(clock.clone());
        self.state.clock = clock;
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.state.rate_limiter = RateLimiter::with_config(config);
        self
    }

    /// Build the router; only ticket issuing is rate limited
    pub fn router(self) -> Router {
        let state = Arc::new(self.state);
        let max_body_size = state.rate_limiter.config().max_body_size;

        let issuing = Router::new()
            .route("/kiosk/tickets", post(take_ticket))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ));

        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics_text))
            .route("/kiosk/categories", get(list_windows))
            .route("/display", get(display))
            .route("/console/call", post(call_ticket))
            .route("/console/tickets", get(list_tickets))
            .route("/console/history", get(history))
            .route("/console/windows", get(list_windows).post(add_window))
            .route("/console/windows/{id}", delete(remove_window))
            .route("/company", get(get_company).put(put_company))
            .merge(issuing)
            .layer(DefaultBodyLimit::max(max_body_size))
            .with_state(state)
    }

    /// Run the server on the given address until Ctrl-C
    pub async fn run(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| QueueError::Other(format!("Failed to bind {}: {}", addr, e)))?;

        let limits = self.state.rate_limiter.config().clone();
        tracing::info!(
            addr = addr,
            max_requests = limits.max_requests,
            window_secs = limits.window.as_secs(),
            max_body_size = limits.max_body_size,
            "Queue server listening"
        );

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Queue server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Rate limiting middleware
async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // No ConnectInfo without a real TCP connection (tests)
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    match state.rate_limiter.check(&ip).await {
        Ok(()) => next.run(request).await,
        Err(RateLimitError::Exceeded { retry_after }) => {
            let retry_secs = retry_after.as_secs();
            tracing::warn!(ip = ip, retry_after_secs = retry_secs, "Rate limit exceeded");

            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                Json(ErrorResponse {
                    error: format!("Rate limit exceeded. Retry after {} seconds.", retry_secs),
                }),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: QueueError) -> ApiError {
    let status = match err {
        QueueError::TicketNotFound(_) => StatusCode::NOT_FOUND,
        QueueError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        QueueError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::warn!(error = %err, status = status.as_u16(), "Request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Request to take a ticket
#[derive(Debug, Deserialize)]
pub struct TakeTicketRequest {
    pub category: String,
}

/// Request to call a ticket
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub ticket_id: String,
    pub window: i64,
}

/// Request to add a window category
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWindowRequest {
    pub name: String,
    pub window_number: i64,
}

/// What the public display renders
#[derive(Debug, Serialize, Deserialize)]
pub struct DisplayResponse {
    pub company: CompanyProfile,
    pub waiting: Vec<Ticket>,
    pub called: Vec<Ticket>,
    pub now: DateTime<Utc>,
    /// The last poll failed and the view is from an earlier read
    pub stale: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "store": state.store.backend() }))
}

async fn metrics_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}

async fn list_windows(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let windows = state.registry.list().map_err(api_error)?;
    Ok(Json(windows))
}

async fn take_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TakeTicketRequest>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let category = state
        .registry
        .find_by_name(&req.category)
        .map_err(api_error)?
        .ok_or_else(|| {
            api_error(QueueError::InvalidInput(format!(
                "unknown category: {}",
                req.category.trim()
            )))
        })?;

    let ticket = state.ledger.create(&category.name).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn display(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let now = state.clock.now();
    let company = state.company.load().map_err(api_error)?;

    let cached = state.snapshot.as_ref().map(|handle| match handle.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    });

    let (view, stale) = match cached {
        Some(snapshot) if snapshot.refreshed_at.is_some() => {
            (snapshot.view(&state.policy, now), snapshot.is_stale())
        }
        _ => (state.ledger.active_view_at(now).map_err(api_error)?, false),
    };

    Ok(Json(DisplayResponse {
        company,
        waiting: view.waiting,
        called: view.called,
        now,
        stale,
    }))
}

async fn call_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CallRequest>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let ticket_id = TicketId::new(req.ticket_id.trim());
    if state.ledger.get(&ticket_id).map_err(api_error)?.is_none() {
        return Err(api_error(QueueError::TicketNotFound(ticket_id.to_string())));
    }

    let window = u32::try_from(req.window)
        .ok()
        .filter(|w| *w > 0)
        .ok_or_else(|| {
            api_error(QueueError::InvalidInput(format!(
                "window must be a positive integer, got {}",
                req.window
            )))
        })?;

    let ticket = state
        .ledger
        .call(&ticket_id, window)
        .map_err(api_error)?;
    Ok(Json(ticket))
}

async fn list_tickets(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    Ok(Json(state.ledger.tickets().map_err(api_error)?))
}

async fn history(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    Ok(Json(state.ledger.history_view().map_err(api_error)?))
}

async fn add_window(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddWindowRequest>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let category = state
        .registry
        .add(&req.name, req.window_number)
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn remove_window(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let removed = state
        .registry
        .remove(&WindowId::new(id))
        .map_err(api_error)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

async fn get_company(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    Ok(Json(state.company.load().map_err(api_error)?))
}

async fn put_company(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<CompanyProfile>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    Ok(Json(state.company.save(profile).map_err(api_error)?))
}
