//! HTTP control API
//!
//! Local control surface for the player: workout selection, playback
//! commands, audio settings, history and an SSE stream of player events.

pub mod handlers;
pub mod sse;

use crate::db::HistoryStore;
use crate::error::{Error, Result};
use crate::playback::PlaybackEngine;
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use vfit_common::WorkoutCatalog;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: PlaybackEngine,
    pub catalog: Arc<WorkoutCatalog>,
    /// Absent when running without a database
    pub history: Option<Arc<HistoryStore>>,
    /// Seconds added by `POST /playback/add-time` without a body value
    pub add_time_step: u32,
}

pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Workouts
        .route("/workouts", get(handlers::list_workouts))
        .route("/workouts/:name/start-points", get(handlers::get_start_points))
        // Playback control
        .route("/playback/start", post(handlers::start_playback))
        .route("/playback/pause", post(handlers::pause))
        .route("/playback/resume", post(handlers::resume))
        .route("/playback/toggle", post(handlers::toggle_pause))
        .route("/playback/next", post(handlers::skip_next))
        .route("/playback/previous", post(handlers::skip_previous))
        .route("/playback/add-time", post(handlers::add_time))
        .route("/playback/exit", post(handlers::exit))
        .route("/playback/state", get(handlers::get_playback_state))
        // Settings and history
        .route(
            "/settings/audio",
            get(handlers::get_audio_settings).post(handlers::update_audio_settings),
        )
        .route("/history", get(handlers::get_history))
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .layer(middleware::from_fn_with_state(ctx.clone(), user_gesture))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Any POST is a user interaction; the first one unlocks on-device speech
async fn user_gesture(State(ctx): State<AppContext>, request: Request, next: Next) -> Response {
    if request.method() == Method::POST {
        ctx.engine.user_gesture();
    }
    next.run(request).await
}

/// Serve the API on `addr` until `shutdown` is cancelled
pub async fn run(ctx: AppContext, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
