mod action;
mod api;
mod app;
mod app_state;
mod component;
mod components;
mod core;
mod mpv;
mod player;
mod tap;
mod theme;
mod visualizer;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};

use randomsound_proto::config::{Config, DEV_BASE_URL};
use randomsound_proto::state::FilterStore;

use crate::api::HttpFetcher;
use crate::core::{Command, ControllerEvent, ControllerSnapshot, PlaybackController};
use crate::player::{MpvPlayer, PlayerEvent};
use crate::visualizer::{presets::ScopeFactory, VisualizerBridge};

/// Terminal player for randomsound.uk.
#[derive(Debug, Parser)]
#[command(name = "randomsound", version, about)]
struct Args {
    /// Config file (default: ~/.config/randomsound/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// API base URL, overriding the config file.
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Talk to a local server on port 1337.
    #[arg(long, conflicts_with = "api_url")]
    dev: bool,

    /// Show the visualizer at startup.
    #[arg(long)]
    visuals: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = randomsound_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("player.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // The TUI owns stdout, so logs go to a file.  RUST_LOG overrides.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("randomsound log: {}", log_path.display());
    tracing::info!("randomsound starting…");

    // ── Config ───────────────────────────────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("config: {}; using defaults", e);
            Config::default()
        }),
    };
    if args.dev {
        config.api.base_url = DEV_BASE_URL.to_string();
    } else if let Some(url) = args.api_url {
        config.api.base_url = url;
    }
    if args.visuals {
        config.visuals.enabled = true;
    }
    tracing::info!("api: {}", config.api.base_url);

    // ── Channels ─────────────────────────────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<ControllerEvent>(256);
    let (snapshot_tx, snapshot_rx) = broadcast::channel::<ControllerSnapshot>(64);
    let (player_tx, mut player_rx) = mpsc::channel::<PlayerEvent>(64);

    // Player lifecycle events join the controller's queue.
    let forward_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(evt) = player_rx.recv().await {
            if forward_tx.send(ControllerEvent::Player(evt)).await.is_err() {
                break;
            }
        }
    });

    // ── Controller ───────────────────────────────────────────────────────────
    let player = MpvPlayer::new(config.player.default_volume, player_tx);
    let fetcher = HttpFetcher::new(&config.api, event_tx.clone())?;
    let store = FilterStore::new(config.paths.state_file.clone());
    let controller = PlaybackController::new(
        &config,
        Box::new(player),
        Box::new(fetcher),
        store,
        snapshot_tx,
    );
    let controller_task = tokio::spawn(controller.run(event_rx));

    // ── TUI ──────────────────────────────────────────────────────────────────
    let bridge = VisualizerBridge::new(Box::new(ScopeFactory), &config.visuals);
    let shutdown_tx = event_tx.clone();
    let app = app::App::new(
        bridge,
        event_tx,
        config.api.base_url.clone(),
        config.visuals.enabled,
        config.visuals.fps,
    );
    let result = app.run(snapshot_rx).await;

    // a failed TUI never sent Shutdown; a second one is ignored
    let _ = shutdown_tx
        .send(ControllerEvent::Command(Command::Shutdown))
        .await;
    if let Err(e) = controller_task.await {
        tracing::error!("controller task failed: {}", e);
    }
    tracing::info!("randomsound stopped");
    result
}
