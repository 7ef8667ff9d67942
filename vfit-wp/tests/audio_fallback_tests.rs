//! Cloud speech against a mock TTS server, falling back to the synthesizer,
//! and the on-device synthesizer against a program that never exits

mod helpers;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use helpers::*;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use vfit_wp::audio::cloud::{CloudSpeech, HttpSpeechService};
use vfit_wp::audio::synth::{CommandSpeechEngine, SynthSpeech};
use vfit_wp::audio::{AudioChannel, FallbackChain, NullSink, SpeechBackend};
use vfit_wp::config::{AudioConfig, SynthConfig};

#[derive(Clone, Copy)]
enum Behavior {
    Fail,
    Hang,
    /// 200 with no body
    Empty,
    /// 200 with bytes that are not audio
    NotAudio,
}

#[derive(Clone)]
struct MockTts {
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn speak(State(mock): State<MockTts>, Json(body): Json<Value>) -> (StatusCode, Vec<u8>) {
    mock.calls.fetch_add(1, Ordering::SeqCst);
    mock.bodies.lock().unwrap().push(body);
    match mock.behavior {
        Behavior::Fail => (StatusCode::INTERNAL_SERVER_ERROR, b"quota exceeded".to_vec()),
        Behavior::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            (StatusCode::OK, Vec::new())
        }
        Behavior::Empty => (StatusCode::OK, Vec::new()),
        Behavior::NotAudio => (StatusCode::OK, b"<html><body>Service Unavailable</body></html>".to_vec()),
    }
}

/// Serve the mock on an ephemeral port; returns its `/speak` URL
async fn start_mock(behavior: Behavior) -> (String, MockTts) {
    let mock = MockTts {
        behavior,
        calls: Arc::new(AtomicUsize::new(0)),
        bodies: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/speak", post(speak))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/speak", addr), mock)
}

fn cloud_speech(url: &str) -> Arc<CloudSpeech> {
    let config = AudioConfig {
        tts_timeout_ms: 200,
        tts_retries: 1,
        tts_backoff_ms: 20,
        ..Default::default()
    };
    let service = HttpSpeechService::new(url, config.tts_timeout()).unwrap();
    let channel = Arc::new(AudioChannel::new(Arc::new(NullSink::new(config.sample_rate))));
    Arc::new(CloudSpeech::new(Arc::new(service), channel, &config))
}

#[tokio::test]
async fn test_server_error_falls_back_to_synth() {
    let (url, mock) = start_mock(Behavior::Fail).await;
    let synth = RecordingSpeech::new("synth");
    let chain = FallbackChain::new(vec![
        cloud_speech(&url) as Arc<dyn SpeechBackend>,
        synth.clone() as Arc<dyn SpeechBackend>,
    ]);

    let spoken_by = chain.speak("mancano trenta secondi", "it-IT", 1.0).await;

    assert_eq!(spoken_by, Some("synth"));
    assert_eq!(synth.texts(), vec!["mancano trenta secondi"]);
    // First attempt plus one retry
    assert_eq!(mock.calls.load(Ordering::SeqCst), 2);

    let body = mock.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["text"], "mancano trenta secondi");
    assert_eq!(body["lang"], "it-IT");
    assert_eq!(body["voice"], "it-IT-Wavenet-C");
}

#[tokio::test]
async fn test_hanging_server_is_bounded_by_timeout() {
    let (url, _mock) = start_mock(Behavior::Hang).await;
    let synth = RecordingSpeech::new("synth");
    let chain = FallbackChain::new(vec![
        cloud_speech(&url) as Arc<dyn SpeechBackend>,
        synth.clone() as Arc<dyn SpeechBackend>,
    ]);

    let started = std::time::Instant::now();
    let spoken_by = chain.speak("Plank", "en-US", 1.0).await;

    assert_eq!(spoken_by, Some("synth"));
    // Two attempts of 200 ms plus backoff, nowhere near the server's 30 s
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_unreachable_server_and_failing_synth_stay_silent() {
    let cloud = cloud_speech("http://127.0.0.1:9/speak");
    let synth = RecordingSpeech::failing("synth", Duration::ZERO);
    let chain = FallbackChain::new(vec![
        cloud as Arc<dyn SpeechBackend>,
        synth.clone() as Arc<dyn SpeechBackend>,
    ]);

    assert_eq!(chain.speak("Squat", "en-US", 1.0).await, None);
    assert_eq!(synth.texts(), vec!["Squat"]);
}

#[tokio::test]
async fn test_empty_audio_falls_back_to_synth() {
    let (url, mock) = start_mock(Behavior::Empty).await;
    let synth = RecordingSpeech::new("synth");
    let chain = FallbackChain::new(vec![
        cloud_speech(&url) as Arc<dyn SpeechBackend>,
        synth.clone() as Arc<dyn SpeechBackend>,
    ]);

    let spoken_by = chain.speak("Plank", "en-US", 1.0).await;

    assert_eq!(spoken_by, Some("synth"));
    assert_eq!(synth.count("Plank"), 1);
    // Empty audio is a failed attempt, so it was retried
    assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_undecodable_audio_falls_back_to_synth() {
    let (url, mock) = start_mock(Behavior::NotAudio).await;
    let synth = RecordingSpeech::new("synth");
    let chain = FallbackChain::new(vec![
        cloud_speech(&url) as Arc<dyn SpeechBackend>,
        synth.clone() as Arc<dyn SpeechBackend>,
    ]);

    let spoken_by = chain.speak("Plank", "en-US", 1.0).await;

    assert_eq!(spoken_by, Some("synth"));
    assert_eq!(synth.count("Plank"), 1);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_synth_program_that_never_exits_is_cut_off() {
    let config = SynthConfig {
        command: "sleep".to_string(),
        args: vec!["30".to_string()],
        list_voices_args: vec!["0".to_string()],
        watchdog_ms: 200,
        max_utterance_ms: 300,
        voice_wait_ms: 0,
        ..Default::default()
    };
    let engine = Arc::new(CommandSpeechEngine::new(&config));
    let synth = Arc::new(SynthSpeech::new(engine, &config));
    let chain = FallbackChain::new(vec![synth as Arc<dyn SpeechBackend>]);

    let started = std::time::Instant::now();
    let spoken_by = tokio::time::timeout(Duration::from_secs(5), chain.speak("ciao", "it-IT", 1.0))
        .await
        .expect("synth speak should be bounded");

    assert_eq!(spoken_by, Some("synth"));
    assert!(started.elapsed() < Duration::from_secs(2));
}
