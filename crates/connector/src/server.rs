use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::connection::ConnectionState;
use crate::dex::{Dex, UnknownDex};
use crate::metrics;
use crate::poller::PollOutcome;
use crate::rest::SnapshotClient;
use crate::service::LiveTrades;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub streaming_enabled: bool,
    pub connection: String,
    pub connected: bool,
    pub buffered: usize,
}

#[derive(Serialize)]
pub struct VenueInfo {
    pub dex: Dex,
    pub name: String,
    pub program_id: &'static str,
}

/// Capability state and the venues that can be selected
#[derive(Serialize)]
pub struct LiveResponse {
    pub streaming_enabled: bool,
    pub venues: Vec<VenueInfo>,
}

#[derive(Serialize)]
pub struct LiveTradesResponse {
    pub dex: Dex,
    pub outcome: PollOutcome,
    pub records: Vec<String>,
}

#[derive(Serialize)]
pub struct RecentTradesResponse {
    pub trades: Vec<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Shared state for all endpoints
#[derive(Clone)]
pub struct ServerState {
    pub live: LiveTrades,
    pub connection: watch::Receiver<ConnectionState>,
    pub snapshot: Option<Arc<SnapshotClient>>,
}

impl ServerState {
    pub fn new(live: LiveTrades, connection: watch::Receiver<ConnectionState>) -> Self {
        Self {
            live,
            connection,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: Arc<SnapshotClient>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    fn health(&self, status: &str) -> HealthResponse {
        let state = self.connection_state();
        HealthResponse {
            status: status.to_string(),
            streaming_enabled: self.live.is_streaming_enabled(),
            connection: state.as_str().to_string(),
            connected: state == ConnectionState::Open,
            buffered: self.live.buffer().len(),
        }
    }
}

/// Health endpoint - always returns 200 if server is running
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(state.health("ok"))
}

/// Ready endpoint - 200 when connected or when streaming is switched off
async fn ready(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    if !state.live.is_streaming_enabled() {
        return (StatusCode::OK, Json(state.health("disabled")));
    }

    if state.connection_state() == ConnectionState::Open {
        (StatusCode::OK, Json(state.health("ready")))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(state.health("not_ready")))
    }
}

/// Prometheus text exposition
async fn metrics_handler() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn live(State(state): State<ServerState>) -> Json<LiveResponse> {
    let venues = Dex::ALL
        .iter()
        .map(|&dex| VenueInfo {
            dex,
            name: dex.display_name(),
            program_id: dex.program_id(),
        })
        .collect();

    Json(LiveResponse {
        streaming_enabled: state.live.is_streaming_enabled(),
        venues,
    })
}

/// Resolve the path venue, or the error response for this request
fn live_venue(state: &ServerState, venue: &str) -> Result<Dex, Response> {
    let dex: Dex = venue
        .parse()
        .map_err(|e: UnknownDex| error_response(StatusCode::NOT_FOUND, e.to_string()))?;
    if !state.live.is_streaming_enabled() {
        return Err(error_response(
            StatusCode::CONFLICT,
            "live streaming is disabled, use /trades/recent",
        ));
    }
    Ok(dex)
}

async fn select_venue(State(state): State<ServerState>, Path(venue): Path<String>) -> Response {
    match live_venue(&state, &venue) {
        Ok(dex) => {
            state.live.select_venue(dex);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(response) => response,
    }
}

async fn live_trades(State(state): State<ServerState>, Path(venue): Path<String>) -> Response {
    let dex = match live_venue(&state, &venue) {
        Ok(dex) => dex,
        Err(response) => return response,
    };

    let records = state.live.get_live_trades(dex).await;
    let outcome = PollOutcome::classify(records.len(), state.live.desired_records());
    info!(dex = %dex, count = records.len(), outcome = outcome.as_str(), "Served live trades");

    Json(LiveTradesResponse {
        dex,
        outcome,
        records,
    })
    .into_response()
}

async fn recent_trades(State(state): State<ServerState>) -> Response {
    let Some(client) = state.snapshot.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "snapshot client not configured",
        );
    };

    match client.recent_trades().await {
        Ok(trades) => Json(RecentTradesResponse { trades }).into_response(),
        Err(e) => {
            warn!(error = %e, "Recent trades snapshot failed");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// Create the router
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics_handler))
        .route("/live", get(live))
        .route("/live/:dex", post(select_venue))
        .route("/live/:dex/trades", get(live_trades))
        .route("/trades/recent", get(recent_trades))
        .with_state(state)
}

/// Run the HTTP server until shutdown is signalled
pub async fn run_server(
    addr: SocketAddr,
    state: ServerState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}
