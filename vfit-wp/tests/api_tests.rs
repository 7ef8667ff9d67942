//! HTTP API integration tests
//!
//! Requests go through the full router (middleware included) with
//! `tower::ServiceExt::oneshot`; storage is an in-memory SQLite database.

mod helpers;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use helpers::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use vfit_common::events::{CompletionSummary, EquipmentEntry};
use vfit_common::WorkoutCatalog;
use vfit_wp::api::{create_router, AppContext};
use vfit_wp::audio::{AudioBackends, AudioChannel, AudioRouter, NullSink, SpeechBackend};
use vfit_wp::db::{self, HistoryStore, SettingsStore};
use vfit_wp::playback::{EngineDeps, PlaybackEngine};
use vfit_wp::PlayerConfig;

struct TestApp {
    router: axum::Router,
    engine: PlaybackEngine,
    history: Arc<HistoryStore>,
    synth: Arc<RecordingSpeech>,
}

async fn setup_test_app() -> TestApp {
    let config = PlayerConfig::default();
    let pool = db::init_memory_database().await.unwrap();
    let settings = Arc::new(SettingsStore::open(pool.clone()).await.unwrap());
    let history = Arc::new(HistoryStore::new(pool));

    let synth = RecordingSpeech::new("synth");
    let channel = Arc::new(AudioChannel::new(Arc::new(NullSink::new(config.audio.sample_rate))));
    let router = Arc::new(AudioRouter::new(
        channel,
        AudioBackends {
            synth: Some(synth.clone() as Arc<dyn SpeechBackend>),
            ..Default::default()
        },
        &config,
    ));

    let engine = PlaybackEngine::spawn(
        &config,
        EngineDeps {
            router,
            preferences: settings,
            reporter: history.clone(),
        },
    );

    let catalog = WorkoutCatalog::new(vec![
        single_exercise(30),
        two_blocks(),
        workout("Empty", vec![]),
    ]);

    let ctx = AppContext {
        engine: engine.clone(),
        catalog: Arc::new(catalog),
        history: Some(history.clone()),
        add_time_step: config.playback.add_time_step,
    };

    TestApp {
        router: create_router(ctx),
        engine,
        history,
        synth,
    }
}

async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(path);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_test_app().await;

    let (status, body) = make_request(&app.router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "workout_player");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_list_workouts() {
    let app = setup_test_app().await;

    let (status, body) = make_request(&app.router, Method::GET, "/workouts", None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["workouts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Single", "Two blocks", "Empty"]);
    assert_eq!(body["workouts"][1]["exercise_rows"], 2);
}

#[tokio::test]
async fn test_start_points() {
    let app = setup_test_app().await;

    let (status, body) = make_request(
        &app.router,
        Method::GET,
        "/workouts/two%20blocks/start-points?warmup=false",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["workout"], "Two blocks");
    assert_eq!(body["total_steps"], 6);
    assert_eq!(body["blocks"][1]["first_index"], 3);

    let (status, _) = make_request(&app.router, Method::GET, "/workouts/missing/start-points", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_playback_lifecycle() {
    let app = setup_test_app().await;

    let (status, body) = make_request(&app.router, Method::GET, "/playback/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "idle");
    assert!(body["snapshot"].is_null());

    let (status, body) = make_request(
        &app.router,
        Method::POST,
        "/playback/start",
        Some(json!({"workout": "Single", "include_warmup": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["snapshot"]["display_name"], "Squat");
    assert_eq!(body["snapshot"]["total_steps"], 2);

    // A second start while running is a conflict
    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/playback/start",
        Some(json!({"workout": "Single"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = make_request(&app.router, Method::POST, "/playback/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = make_request(&app.router, Method::GET, "/playback/state", None).await;
    assert_eq!(body["status"], "paused");

    let (status, _) = make_request(&app.router, Method::POST, "/playback/toggle", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = make_request(&app.router, Method::POST, "/playback/next", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = make_request(&app.router, Method::GET, "/playback/state", None).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["snapshot"]["display_name"], "Good Job");

    let (status, _) = make_request(&app.router, Method::POST, "/playback/exit", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = make_request(&app.router, Method::GET, "/playback/state", None).await;
    assert_eq!(body["status"], "idle");

    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_start_rejections() {
    let app = setup_test_app().await;

    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/playback/start",
        Some(json!({"workout": "Empty"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/playback/start",
        Some(json!({"workout": "Single", "start_index": 99})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/playback/start",
        Some(json!({"workout": "Nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_commands_without_workout_conflict() {
    let app = setup_test_app().await;

    for path in ["/playback/pause", "/playback/next", "/playback/add-time"] {
        let (status, body) = make_request(&app.router, Method::POST, path, None).await;
        assert_eq!(status, StatusCode::CONFLICT, "{}", path);
        assert!(body["status"].as_str().unwrap().starts_with("error"));
    }
}

#[tokio::test]
async fn test_add_time_persists_extra_time() {
    let app = setup_test_app().await;

    make_request(
        &app.router,
        Method::POST,
        "/playback/start",
        Some(json!({"workout": "Single", "include_warmup": false})),
    )
    .await;

    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/playback/add-time",
        Some(json!({"seconds": 15})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = make_request(&app.router, Method::GET, "/playback/state", None).await;
    assert_eq!(body["snapshot"]["duration_seconds"], 45);

    // Persisted by a background write
    let mut extra = 0;
    for _ in 0..50 {
        let (_, prefs) = make_request(&app.router, Method::GET, "/settings/audio", None).await;
        extra = prefs["extra_time_seconds"].as_u64().unwrap();
        if extra == 15 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(extra, 15);

    let (_, prefs) = make_request(
        &app.router,
        Method::POST,
        "/settings/audio",
        Some(json!({"reset_extra_time": true})),
    )
    .await;
    assert_eq!(prefs["extra_time_seconds"], 0);
}

#[tokio::test]
async fn test_audio_settings() {
    let app = setup_test_app().await;

    let (status, body) = make_request(&app.router, Method::GET, "/settings/audio", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sound_mode"], "voice");
    assert_eq!(body["extra_time_seconds"], 0);

    let (status, body) = make_request(
        &app.router,
        Method::POST,
        "/settings/audio",
        Some(json!({"sound_mode": "beep", "volume": 0.4})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sound_mode"], "beep");
    assert!((body["volume"].as_f64().unwrap() - 0.4).abs() < 1e-6);

    // Invalid mode changes nothing, not even the valid volume next to it
    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/settings/audio",
        Some(json!({"sound_mode": "opera", "volume": 0.9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = make_request(&app.router, Method::GET, "/settings/audio", None).await;
    assert_eq!(body["sound_mode"], "beep");
    assert!((body["volume"].as_f64().unwrap() - 0.4).abs() < 1e-6);
}

#[tokio::test]
async fn test_history_newest_first() {
    let app = setup_test_app().await;

    for (name, count) in [("Monday", 4), ("Tuesday", 6)] {
        app.history
            .insert(&CompletionSummary {
                workout_name: name.to_string(),
                elapsed_seconds: 1200,
                exercise_count: count,
                exercises_with_equipment: vec![EquipmentEntry {
                    name: "Swing".to_string(),
                    equipment: "Kettlebell".to_string(),
                }],
            })
            .await
            .unwrap();
    }

    let (status, body) = make_request(&app.router, Method::GET, "/history?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["workout_name"], "Tuesday");
    assert_eq!(entries[0]["exercise_count"], 6);
    assert_eq!(entries[0]["exercises_with_equipment"][0]["equipment"], "Kettlebell");
}

#[tokio::test]
async fn test_post_counts_as_user_gesture() {
    let app = setup_test_app().await;

    make_request(&app.router, Method::POST, "/playback/pause", None).await;
    make_request(&app.router, Method::POST, "/playback/resume", None).await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert_eq!(app.synth.prime_count(), 1);
}
