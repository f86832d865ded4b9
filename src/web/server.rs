//! Axum host for the background relay.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use super::error::{parse_tab, WebError};
use super::socket::serve_port;
use crate::bridge::{
    channel, Background, PortRegistry, Role, RuntimeMessage, TabId, TabUpdate, TracingChrome,
};
use crate::config::Config;

/// Shared state of every request handler.
#[derive(Clone)]
pub struct AppState {
    background: Arc<Background>,
    channel_capacity: usize,
}

impl AppState {
    pub fn new(background: Background, channel_capacity: usize) -> Self {
        Self {
            background: Arc::new(background),
            channel_capacity,
        }
    }

    /// A host with no browser behind it: scripting and icon requests are logged.
    pub fn from_config(config: &Config) -> Self {
        let chrome = Arc::new(TracingChrome);
        let background = Background::new(PortRegistry::new(), chrome.clone(), chrome)
            .with_suppress_loading_flicker(config.relay.suppress_loading_flicker);
        Self::new(background, config.relay.channel_capacity)
    }

    pub fn background(&self) -> &Background {
        &self.background
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    tab: Option<String>,
}

/// Upgrade to a WebSocket that becomes a port named `name`.
async fn connect(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    Query(query): Query<ConnectQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, WebError> {
    let sender_tab = query.tab.as_deref().map(parse_tab).transpose()?;

    Ok(ws.on_upgrade(move |socket| async move {
        let (port, remote) = channel(name, sender_tab, state.channel_capacity);
        if state.background.on_connect(port).is_some() {
            serve_port(socket, remote).await;
        }
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeMessageBody {
    #[serde(default)]
    tab_id: Option<TabId>,
    #[serde(flatten)]
    message: RuntimeMessage,
}

async fn runtime_message(
    State(state): State<AppState>,
    Json(body): Json<RuntimeMessageBody>,
) -> StatusCode {
    state
        .background
        .on_runtime_message(&body.message, body.tab_id);
    StatusCode::NO_CONTENT
}

async fn tab_updated(
    Path(tab): Path<String>,
    State(state): State<AppState>,
    Json(update): Json<TabUpdate>,
) -> Result<StatusCode, WebError> {
    let tab = parse_tab(&tab)?;
    state.background.on_tab_updated(tab, &update);
    Ok(StatusCode::NO_CONTENT)
}

/// Registry view of one tab.
#[derive(Debug, Serialize)]
struct TabStatus {
    tab: TabId,
    inspector: bool,
    agent: bool,
    relay: bool,
}

impl TabStatus {
    fn of(background: &Background, tab: TabId) -> Self {
        let registry = background.registry();
        Self {
            tab,
            inspector: registry.is_registered(tab, Role::Inspector),
            agent: registry.is_registered(tab, Role::Agent),
            relay: registry.has_relay(tab),
        }
    }
}

#[derive(Serialize)]
struct TabsResponse {
    tabs: Vec<TabStatus>,
}

async fn list_tabs(State(state): State<AppState>) -> Json<TabsResponse> {
    let tabs = state
        .background
        .registry()
        .tabs()
        .into_iter()
        .map(|tab| TabStatus::of(&state.background, tab))
        .collect();
    Json(TabsResponse { tabs })
}

async fn get_tab(
    Path(tab): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TabStatus>, WebError> {
    let tab = parse_tab(&tab)?;
    let status = TabStatus::of(&state.background, tab);
    if !status.inspector && !status.agent {
        return Err(WebError::NotFound(format!("tab {tab}")));
    }
    Ok(Json(status))
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/connect/{name}", get(connect))
        .route("/runtime/message", post(runtime_message))
        .route("/tabs", get(list_tabs))
        .route("/tabs/{tab}", get(get_tab))
        .route("/tabs/{tab}/updated", post(tab_updated))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the relay host until the process is stopped.
pub async fn run_server(state: AppState, config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config.bind_address().parse()?;
    let app = build_router(state);

    tracing::info!("Starting relay host at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
