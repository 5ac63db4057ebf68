//! HTTP handlers for the Chatter server.
//!
//! Subscribers open a long-lived event stream; publishers post chat messages
//! that are fanned out to every open stream of the same room.

use crate::config::Config;
use crate::metrics::{self, SessionMetricsGuard};
use crate::render::{chat_input_html, ChatRenderer};
use crate::shutdown::wait_for_shutdown_signal;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chatter_core::{Hub, Registration, Rooms, RoomsConfig, RoomsError, SkipReport};
use chatter_stream::{http, EventStream, Session, SessionConfig};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often rooms without listeners are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared server state.
pub struct AppState {
    /// Broadcast hubs, one per room.
    pub rooms: Rooms,
    /// Server configuration.
    pub config: Config,
    /// Renders chat messages into events.
    pub renderer: ChatRenderer,
    /// Input form returned after a chat post to the default room.
    pub chat_input: String,
    /// Cancelled when the server shuts down; every session holds a child.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let rooms_config = RoomsConfig {
            max_rooms: config.limits.max_rooms,
        };

        Self {
            rooms: Rooms::with_config(rooms_config),
            chat_input: chat_input_html(&config.stream.send_path),
            config,
            renderer: ChatRenderer,
            shutdown: CancellationToken::new(),
        }
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            keepalive_interval: self.config.stream.keepalive_interval(),
        }
    }
}

/// Chat post form.
#[derive(Debug, Deserialize)]
pub struct ChatForm {
    /// Message text.
    #[serde(default)]
    pub msg: String,
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    let stream_path = state.config.stream.path.clone();
    let send_path = state.config.stream.send_path.clone();
    Router::new()
        .route(&stream_path, get(lobby_stream_handler))
        .route(&send_path, post(lobby_send_handler))
        .route("/rooms/:room/events", get(room_stream_handler))
        .route("/rooms/:room/messages", post(room_send_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP server until a termination signal arrives.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    tokio::spawn(prune_rooms(Arc::clone(&state)));

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Chatter server listening on {}", addr);
    info!("Event stream endpoint: http://{}{}", addr, config.stream.path);

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = wait_for_shutdown_signal().await {
                error!("Failed to listen for shutdown signals: {}", e);
            }
            info!("Shutting down, closing event streams");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// Periodically drop rooms nobody listens to.
async fn prune_rooms(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                state.rooms.prune();
            }
            () = state.shutdown.cancelled() => break,
        }
    }
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.rooms.stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": stats.room_count,
        "listeners": stats.listener_count,
    }))
}

/// Event stream of the default room.
async fn lobby_stream_handler(State(state): State<Arc<AppState>>) -> EventStream {
    let registration = state.rooms.lobby().subscribe();
    open_stream(&state, registration)
}

/// Event stream of a named room.
async fn room_stream_handler(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
) -> Response {
    match state.rooms.subscribe(&room) {
        Ok(registration) => open_stream(&state, registration).into_response(),
        Err(e) => rooms_error_response(&room, &e),
    }
}

/// Chat post for the default room. Answers with a fresh input form.
async fn lobby_send_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ChatForm>,
) -> Response {
    let hub = state.rooms.lobby();
    match publish(&state, &hub, &form.msg) {
        Ok(_) => Html(state.chat_input.clone()).into_response(),
        Err(status) => (status, Html(state.chat_input.clone())).into_response(),
    }
}

/// Chat post for a named room.
async fn room_send_handler(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Form(form): Form<ChatForm>,
) -> Response {
    if let Err(e) = chatter_core::rooms::validate_room_name(&room) {
        return rooms_error_response(&room, &RoomsError::InvalidRoom(e));
    }

    let Some(hub) = state.rooms.get(&room) else {
        debug!(room = %room, "Post to room without listeners");
        return Json(serde_json::json!({ "skipped": 0 })).into_response();
    };

    match publish(&state, &hub, &form.msg) {
        Ok(skipped) => Json(serde_json::json!({ "skipped": skipped })).into_response(),
        Err(status) => status.into_response(),
    }
}

/// Stream a registered listener on a new response body.
fn open_stream(state: &Arc<AppState>, registration: Registration) -> EventStream {
    let cancel = state.shutdown.child_token();
    let (mut sink, stream) = http::channel(state.config.stream.write_buffer, cancel.clone());
    let hub = Arc::clone(registration.hub());
    let session = Session::from_registration(registration, state.session_config());

    let state = Arc::clone(state);
    tokio::spawn(async move {
        let _metrics_guard = SessionMetricsGuard::new();
        if let Err(e) = session.run(&state.renderer, &mut sink, &cancel).await {
            debug!(room = %hub.name(), error = %e, "Event stream closed by write failure");
            metrics::record_error("stream_write");
        }
    });

    stream
}

/// Publish a chat message, returning how many listeners were skipped.
///
/// Empty messages are ignored.
fn publish(state: &AppState, hub: &Hub, text: &str) -> Result<usize, StatusCode> {
    let text = text.trim_end_matches(['\r', '\n']);
    if text.is_empty() {
        return Ok(0);
    }
    if text.len() > state.config.limits.max_message_size {
        warn!(room = %hub.name(), size = text.len(), "Rejecting oversized message");
        metrics::record_error("message_too_large");
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let start = Instant::now();
    let skipped = hub.send(text);
    metrics::record_publish(hub.name(), skipped.len(), start.elapsed().as_secs_f64());
    log_skipped(hub, &skipped);

    Ok(skipped.len())
}

fn log_skipped(hub: &Hub, skipped: &SkipReport) {
    for (listener, err) in skipped {
        warn!(room = %hub.name(), listener = %listener, error = %err, "Delivery skipped");
    }
}

fn rooms_error_response(room: &str, err: &RoomsError) -> Response {
    warn!(room = %room, error = %err, "Room request rejected");
    let status = match err {
        RoomsError::InvalidRoom(_) => StatusCode::BAD_REQUEST,
        RoomsError::MaxRoomsReached => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, err.to_string()).into_response()
}
