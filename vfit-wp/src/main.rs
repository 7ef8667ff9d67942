//! Workout Player (vfit-wp) - Main entry point
//!
//! Loads a workout catalog, plays the chosen workout with audio cues and
//! optionally serves the HTTP/SSE control API. While running, single-key
//! commands on stdin control playback:
//!
//! - `p` pause/resume
//! - `n` next step, `b` previous step
//! - `+` add time to the current step
//! - `q` quit

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vfit_common::config::{ensure_data_folder, resolve_data_folder, DATA_DIR_ENV_VAR};
use vfit_common::events::PlayerEvent;
use vfit_common::human_time::{format_countdown, format_elapsed};
use vfit_common::{SoundMode, WorkoutCatalog};
use vfit_wp::api::{self, AppContext};
use vfit_wp::audio::{AudioRouter, AudioSink, NullSink};
use vfit_wp::db::{self, HistoryStore, SettingsStore};
use vfit_wp::playback::{
    CompletionReporter, EngineDeps, InMemoryPreferences, NoopReporter, PlaybackEngine,
    PreferenceStore,
};
use vfit_wp::PlayerConfig;

/// Command-line arguments for vfit-wp
#[derive(Parser, Debug)]
#[command(name = "vfit-wp")]
#[command(about = "Interval workout player with spoken cues")]
#[command(version)]
struct Args {
    /// Workout catalog (JSON)
    #[arg(short, long, env = "VFIT_WORKOUTS")]
    workouts: PathBuf,

    /// Workout to play; without it the catalog is listed (or the API waits)
    #[arg(short = 'n', long)]
    workout: Option<String>,

    /// Skip the warm-up section
    #[arg(long)]
    no_warmup: bool,

    /// Sequence index to start at
    #[arg(long, default_value = "0")]
    start_index: usize,

    /// Sound mode for this and later runs (voice, synth, beep, clips, none)
    #[arg(short, long, value_parser = parse_sound_mode)]
    sound_mode: Option<SoundMode>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "VFIT_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database
    #[arg(long, env = "VFIT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep preferences and history in memory only
    #[arg(long)]
    no_db: bool,

    /// Serve the HTTP control API
    #[arg(long)]
    serve: bool,

    /// API port (overrides the configuration file)
    #[arg(short, long, env = "VFIT_WP_PORT")]
    port: Option<u16>,

    /// Audio output device name
    #[arg(long)]
    device: Option<String>,

    /// Do not open an audio device
    #[arg(long)]
    headless: bool,
}

fn parse_sound_mode(s: &str) -> std::result::Result<SoundMode, String> {
    s.parse::<SoundMode>().map_err(|e| e.to_string())
}

/// Where preferences and completions go
struct Storage {
    preferences: Arc<dyn PreferenceStore>,
    reporter: Arc<dyn CompletionReporter>,
    history: Option<Arc<HistoryStore>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vfit_wp=debug,vfit_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting vfit-wp {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let catalog = Arc::new(
        WorkoutCatalog::load_from_file(&args.workouts)
            .with_context(|| format!("Failed to load workouts from {}", args.workouts.display()))?,
    );
    info!("Loaded {} workouts from {}", catalog.len(), args.workouts.display());

    if args.workout.is_none() && !args.serve {
        for name in catalog.names() {
            info!("Workout: {}", name);
        }
        info!("Choose one with --workout NAME");
        return Ok(());
    }

    let storage = open_storage(&args, &config).await?;
    if let Some(mode) = args.sound_mode {
        storage
            .preferences
            .set_sound_mode(mode)
            .await
            .context("Failed to store sound mode")?;
    }
    let prefs = storage.preferences.current();
    info!(
        "Audio: mode={}, volume={:.0}%, extra time {}s",
        prefs.sound_mode,
        prefs.volume * 100.0,
        prefs.extra_time_seconds
    );

    let sink = open_sink(&args, &config)?;
    let router = Arc::new(AudioRouter::from_config(&config, sink).context("Failed to set up audio")?);

    let engine = PlaybackEngine::spawn(
        &config,
        EngineDeps {
            router,
            preferences: storage.preferences,
            reporter: storage.reporter,
        },
    );

    let server_shutdown = CancellationToken::new();
    let server = if args.serve {
        let addr: SocketAddr = format!("{}:{}", config.server.bind_addr, config.server.port)
            .parse()
            .context("Invalid server address")?;
        let ctx = AppContext {
            engine: engine.clone(),
            catalog: Arc::clone(&catalog),
            history: storage.history,
            add_time_step: config.playback.add_time_step,
        };
        Some(tokio::spawn(api::run(ctx, addr, server_shutdown.clone())))
    } else {
        None
    };

    if let Some(name) = &args.workout {
        let workout = catalog.require(name)?.clone();
        engine
            .start_workout(workout, !args.no_warmup, args.start_index)
            .await
            .with_context(|| format!("Failed to start workout '{}'", name))?;
    }

    drive(&engine, config.playback.add_time_step, args.serve).await;

    server_shutdown.cancel();
    engine.shutdown().await;
    if let Some(server) = server {
        server.await.context("HTTP server task failed")??;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn open_storage(args: &Args, config: &PlayerConfig) -> Result<Storage> {
    if args.no_db {
        info!("Running without a database");
        return Ok(Storage {
            preferences: Arc::new(InMemoryPreferences::default()),
            reporter: Arc::new(NoopReporter),
            history: None,
        });
    }

    let db_path = match &config.database.path {
        Some(path) => path.clone(),
        None => {
            let folder = resolve_data_folder(args.data_dir.as_deref(), DATA_DIR_ENV_VAR);
            ensure_data_folder(&folder).context("Failed to create data folder")?;
            db::database_path(&folder)
        }
    };

    let pool = db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let settings = SettingsStore::open(pool.clone())
        .await
        .context("Failed to load preferences")?;
    let history = Arc::new(HistoryStore::new(pool));

    Ok(Storage {
        preferences: Arc::new(settings),
        reporter: history.clone(),
        history: Some(history),
    })
}

#[cfg(feature = "device-output")]
fn open_sink(args: &Args, config: &PlayerConfig) -> Result<Arc<dyn AudioSink>> {
    if args.headless {
        return Ok(Arc::new(NullSink::new(config.audio.sample_rate)));
    }
    let sink = vfit_wp::audio::output::CpalSink::open(args.device.clone())
        .context("Failed to open audio device")?;
    Ok(Arc::new(sink))
}

#[cfg(not(feature = "device-output"))]
fn open_sink(args: &Args, config: &PlayerConfig) -> Result<Arc<dyn AudioSink>> {
    if !args.headless {
        warn!(
            "Built without device output; playing silently (device: {})",
            args.device.as_deref().unwrap_or("default")
        );
    }
    Ok(Arc::new(NullSink::new(config.audio.sample_rate)))
}

/// Feed stdin commands to the engine and log progress until the workout
/// ends, the user quits, or a shutdown signal arrives.
///
/// With `keep_serving` the loop outlives finished workouts.
async fn drive(engine: &PlaybackEngine, add_time_step: u32, keep_serving: bool) {
    let mut events = engine.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_input(engine, line.trim(), add_time_step).await {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if log_event(&event) && !keep_serving {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

/// Returns false when the user asked to quit
async fn handle_input(engine: &PlaybackEngine, input: &str, add_time_step: u32) -> bool {
    let result = match input {
        "p" => engine.toggle_pause().await,
        "n" => engine.skip_next().await,
        "b" => engine.skip_previous().await,
        "+" => engine.add_extra_time(add_time_step).await,
        "q" => {
            if let Err(e) = engine.exit().await {
                warn!("Exit failed: {}", e);
            }
            return false;
        }
        "" => Ok(()),
        other => {
            info!("Unknown command '{}' (p, n, b, +, q)", other);
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("Command '{}' failed: {}", input, e);
    }
    true
}

/// Log a player event; returns true when the workout ended
fn log_event(event: &PlayerEvent) -> bool {
    match event {
        PlayerEvent::StepStarted { snapshot, .. } => {
            info!(
                "[{}/{}] {} ({})",
                snapshot.current_index + 1,
                snapshot.total_steps,
                snapshot.display_name,
                format_countdown(snapshot.remaining_seconds)
            );
        }
        PlayerEvent::Progress { snapshot, .. } => {
            debug!(
                "{} {} ({}%)",
                snapshot.display_name,
                format_countdown(snapshot.remaining_seconds),
                snapshot.percent_complete
            );
        }
        PlayerEvent::PreviewShown { next: Some(next), .. } => {
            info!("Next: {} {}", next.name, next.info);
        }
        PlayerEvent::PlaybackStateChanged {
            old_state,
            new_state,
            ..
        } => {
            info!("Playback {} -> {}", old_state, new_state);
        }
        PlayerEvent::WorkoutCompleted { summary, .. } => {
            info!(
                "Workout '{}' complete: {} exercises in {}",
                summary.workout_name,
                summary.exercise_count,
                format_elapsed(summary.elapsed_seconds)
            );
            for entry in &summary.exercises_with_equipment {
                info!("  {}: {}", entry.name, entry.equipment);
            }
            return true;
        }
        PlayerEvent::WorkoutExited { step_index, .. } => {
            info!("Workout exited at step {}", step_index + 1);
            return true;
        }
        _ => {}
    }
    false
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
