//! HTTP request handlers

use super::AppContext;
use crate::error::Error;
use crate::sequence::{build_sequence, start_points, BlockStartPoint};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use vfit_common::events::{PlaybackStatus, ProgressSnapshot};
use vfit_common::prefs::{SoundMode, UserAudioPreferences};

use crate::db::HistoryEntry;

const DEFAULT_HISTORY_PAGE: usize = 20;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            status: "ok".to_string(),
        })
    }
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub name: String,
    pub exercise_rows: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkoutListResponse {
    pub workouts: Vec<WorkoutSummary>,
}

#[derive(Debug, Deserialize)]
pub struct WarmupQuery {
    #[serde(default = "default_true")]
    pub warmup: bool,
}

#[derive(Debug, Serialize)]
pub struct StartPointsResponse {
    pub workout: String,
    pub total_steps: usize,
    pub blocks: Vec<BlockStartPoint>,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub workout: String,
    #[serde(default = "default_true")]
    pub include_warmup: bool,
    #[serde(default)]
    pub start_index: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddTimeRequest {
    pub seconds: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaybackStateResponse {
    pub status: PlaybackStatus,
    pub snapshot: Option<ProgressSnapshot>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioSettingsRequest {
    pub sound_mode: Option<String>,
    pub volume: Option<f32>,
    #[serde(default)]
    pub reset_extra_time: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntry>,
}

fn default_true() -> bool {
    true
}

/// Map an error to its HTTP status and JSON body
fn api_error(e: Error) -> ApiError {
    let status = match &e {
        Error::EmptyWorkout(_) | Error::InvalidWorkout(_) | Error::StepOutOfRange { .. } => {
            StatusCode::BAD_REQUEST
        }
        Error::Common(vfit_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
        Error::Common(vfit_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }

    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

fn command_result(name: &str, result: crate::Result<()>) -> ApiResult<StatusResponse> {
    match result {
        Ok(()) => {
            info!("{} command succeeded", name);
            Ok(StatusResponse::ok())
        }
        Err(e) => Err(api_error(e)),
    }
}

// ============================================================================
// Health and workouts
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "workout_player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /workouts
pub async fn list_workouts(State(ctx): State<AppContext>) -> Json<WorkoutListResponse> {
    let workouts = ctx
        .catalog
        .names()
        .into_iter()
        .filter_map(|name| ctx.catalog.get(name))
        .map(|w| WorkoutSummary {
            name: w.name.clone(),
            exercise_rows: w.exercises.len(),
        })
        .collect();

    Json(WorkoutListResponse { workouts })
}

/// GET /workouts/:name/start-points?warmup=bool
pub async fn get_start_points(
    State(ctx): State<AppContext>,
    Path(name): Path<String>,
    Query(query): Query<WarmupQuery>,
) -> ApiResult<StartPointsResponse> {
    let workout = ctx
        .catalog
        .require(&name)
        .map_err(|e| api_error(e.into()))?;

    let steps = build_sequence(workout, query.warmup);
    Ok(Json(StartPointsResponse {
        workout: workout.name.clone(),
        total_steps: steps.len(),
        blocks: start_points(&steps),
    }))
}

// ============================================================================
// Playback
// ============================================================================

/// POST /playback/start
pub async fn start_playback(
    State(ctx): State<AppContext>,
    Json(req): Json<StartRequest>,
) -> ApiResult<PlaybackStateResponse> {
    let workout = ctx
        .catalog
        .require(&req.workout)
        .map_err(|e| api_error(e.into()))?
        .clone();

    ctx.engine
        .start_workout(workout, req.include_warmup, req.start_index)
        .await
        .map_err(api_error)?;

    info!("Started workout '{}'", req.workout);
    playback_state(&ctx).await
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    command_result("Pause", ctx.engine.pause().await)
}

/// POST /playback/resume
pub async fn resume(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    command_result("Resume", ctx.engine.resume().await)
}

/// POST /playback/toggle
pub async fn toggle_pause(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    command_result("Toggle", ctx.engine.toggle_pause().await)
}

/// POST /playback/next
pub async fn skip_next(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    command_result("Skip next", ctx.engine.skip_next().await)
}

/// POST /playback/previous
pub async fn skip_previous(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    command_result("Skip previous", ctx.engine.skip_previous().await)
}

/// POST /playback/add-time
///
/// Body is optional; without `seconds` the configured step is used.
pub async fn add_time(
    State(ctx): State<AppContext>,
    body: Option<Json<AddTimeRequest>>,
) -> ApiResult<StatusResponse> {
    let seconds = body
        .and_then(|Json(req)| req.seconds)
        .unwrap_or(ctx.add_time_step);
    command_result("Add time", ctx.engine.add_extra_time(seconds).await)
}

/// POST /playback/exit
pub async fn exit(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    command_result("Exit", ctx.engine.exit().await)
}

/// GET /playback/state
pub async fn get_playback_state(State(ctx): State<AppContext>) -> ApiResult<PlaybackStateResponse> {
    playback_state(&ctx).await
}

async fn playback_state(ctx: &AppContext) -> ApiResult<PlaybackStateResponse> {
    let snapshot = ctx.engine.snapshot().await.map_err(api_error)?;
    let status = match &snapshot {
        Some(s) => s.status,
        None => ctx.engine.state().get_status().await,
    };
    Ok(Json(PlaybackStateResponse { status, snapshot }))
}

// ============================================================================
// Settings and history
// ============================================================================

/// GET /settings/audio
pub async fn get_audio_settings(State(ctx): State<AppContext>) -> Json<UserAudioPreferences> {
    Json(ctx.engine.preferences())
}

/// POST /settings/audio
///
/// Applies only the fields present in the body.
pub async fn update_audio_settings(
    State(ctx): State<AppContext>,
    Json(req): Json<AudioSettingsRequest>,
) -> ApiResult<UserAudioPreferences> {
    // Validate everything before writing anything
    let mode = req
        .sound_mode
        .as_deref()
        .map(str::parse::<SoundMode>)
        .transpose()
        .map_err(|e| api_error(e.into()))?;

    if let Some(volume) = req.volume {
        if !volume.is_finite() {
            return Err(api_error(Error::Common(vfit_common::Error::InvalidInput(
                "volume must be a number between 0 and 1".to_string(),
            ))));
        }
    }

    let mut prefs = ctx.engine.preferences();
    if let Some(mode) = mode {
        prefs = ctx.engine.set_sound_mode(mode).await.map_err(api_error)?;
    }
    if let Some(volume) = req.volume {
        prefs = ctx.engine.set_volume(volume).await.map_err(api_error)?;
    }
    if req.reset_extra_time {
        prefs = ctx.engine.reset_extra_time().await.map_err(api_error)?;
    }

    info!(
        "Audio settings: mode={}, volume={:.2}, extra={}s",
        prefs.sound_mode, prefs.volume, prefs.extra_time_seconds
    );
    Ok(Json(prefs))
}

/// GET /history?limit=N
pub async fn get_history(
    State(ctx): State<AppContext>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let Some(history) = &ctx.history else {
        return Ok(Json(HistoryResponse { entries: Vec::new() }));
    };

    let entries = history
        .list_recent(query.limit.unwrap_or(DEFAULT_HISTORY_PAGE))
        .await
        .map_err(api_error)?;
    Ok(Json(HistoryResponse { entries }))
}
