use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use randomsound_proto::config::{Config, MetadataOnStop};
use randomsound_proto::filter::{FilterSelection, Selection};
use randomsound_proto::protocol::{PlaybackState, TrackMetadata, TrackRecord};
use randomsound_proto::state::FilterStore;
use tokio::sync::broadcast;

use super::*;
use crate::api::{ApiError, FetchRequest, TrackFetcher};
use crate::player::{AudioPlayer, AudioTap, InstanceId, PlayerError, PlayerEvent, PlayerEventKind};

// ── test doubles ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct FetchLog {
    requests: Vec<FetchRequest>,
}

#[derive(Clone, Default)]
struct RecordingFetcher(Arc<Mutex<FetchLog>>);

impl RecordingFetcher {
    fn requests(&self) -> Vec<FetchRequest> {
        self.0.lock().unwrap().requests.clone()
    }

    fn last_generation(&self) -> u64 {
        self.requests().last().map(|r| r.generation).unwrap()
    }
}

impl TrackFetcher for RecordingFetcher {
    fn dispatch(&self, request: FetchRequest) {
        self.0.lock().unwrap().requests.push(request);
    }
}

#[derive(Default)]
struct PlayerLog {
    loads: Vec<(String, String)>,
    plays: usize,
    stops: usize,
    unloads: usize,
    /// Number of upcoming `play` calls that fail.
    failing_plays: usize,
    fail_load: bool,
    /// `play` succeeds but the engine stays silent, like mpv reloading a
    /// dropped file.
    silent_plays: bool,
    instance: Option<InstanceId>,
    active: bool,
    next_id: InstanceId,
}

#[derive(Clone, Default)]
struct FakePlayer(Arc<Mutex<PlayerLog>>);

impl FakePlayer {
    fn log(&self) -> std::sync::MutexGuard<'_, PlayerLog> {
        self.0.lock().unwrap()
    }
}

#[async_trait]
impl AudioPlayer for FakePlayer {
    async fn load(&mut self, url: &str, format: &str) -> Result<InstanceId, PlayerError> {
        let mut log = self.log();
        log.loads.push((url.to_string(), format.to_string()));
        if log.fail_load {
            return Err(PlayerError::Command("load refused".to_string()));
        }
        log.next_id += 1;
        let id = log.next_id;
        log.instance = Some(id);
        log.active = false;
        Ok(id)
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        let mut log = self.log();
        log.plays += 1;
        if log.failing_plays > 0 {
            log.failing_plays -= 1;
            return Err(PlayerError::Command("blocked".to_string()));
        }
        log.active = log.instance.is_some() && !log.silent_plays;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PlayerError> {
        let mut log = self.log();
        log.stops += 1;
        log.active = false;
        Ok(())
    }

    async fn unload(&mut self) {
        let mut log = self.log();
        log.unloads += 1;
        log.instance = None;
        log.active = false;
    }

    fn is_playing(&self) -> bool {
        let log = self.log();
        log.instance.is_some() && log.active
    }

    fn audio_tap(&self) -> Option<AudioTap> {
        self.log().instance.map(AudioTap::new)
    }
}

struct Harness {
    controller: PlaybackController,
    fetcher: RecordingFetcher,
    player: FakePlayer,
    snapshots: broadcast::Receiver<ControllerSnapshot>,
    _dir: tempfile::TempDir,
}

fn harness_with(config: Config) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = FilterStore::new(dir.path().join("filters.json"));
    let fetcher = RecordingFetcher::default();
    let player = FakePlayer::default();
    let (snapshot_tx, snapshots) = broadcast::channel(64);
    let controller = PlaybackController::new(
        &config,
        Box::new(player.clone()),
        Box::new(fetcher.clone()),
        store,
        snapshot_tx,
    );
    Harness {
        controller,
        fetcher,
        player,
        snapshots,
        _dir: dir,
    }
}

fn harness() -> Harness {
    harness_with(Config::default())
}

fn track(path: &str, ext: &str, artist: &str) -> TrackMetadata {
    TrackMetadata::from_record(TrackRecord {
        path: path.to_string(),
        ext: ext.to_string(),
        artist: artist.to_string(),
        ..TrackRecord::default()
    })
    .unwrap()
}

impl Harness {
    async fn cmd(&mut self, command: Command) {
        assert!(self.controller.handle(ControllerEvent::Command(command)).await);
    }

    async fn complete(&mut self, generation: u64, outcome: Result<TrackMetadata, ApiError>) {
        self.controller
            .handle(ControllerEvent::FetchCompleted {
                generation,
                outcome,
            })
            .await;
    }

    async fn complete_latest(&mut self, outcome: Result<TrackMetadata, ApiError>) {
        let generation = self.fetcher.last_generation();
        self.complete(generation, outcome).await;
    }

    async fn player_event(&mut self, instance: InstanceId, kind: PlayerEventKind) {
        self.controller
            .handle(ControllerEvent::Player(PlayerEvent { instance, kind }))
            .await;
    }

    /// Request, answer successfully, return the loaded instance id.
    async fn play_track(&mut self, artist: &str) -> InstanceId {
        self.cmd(Command::RequestRandom).await;
        self.complete_latest(Ok(track("a/b.mp3", "mp3", artist))).await;
        self.player.log().instance.unwrap()
    }
}

// ── fetch → play ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_success_loads_stream_and_sets_metadata() {
    let mut h = harness();
    h.cmd(Command::RequestRandom).await;

    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Loading);
    assert!(snap.thinking);
    let requests = h.fetcher.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].selection, Selection::Mixes);
    assert_eq!(requests[0].attempt, 1);

    h.complete_latest(Ok(track("a/b.mp3", "mp3", "X"))).await;

    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Playing);
    assert!(!snap.thinking);
    assert!(snap.is_playing);
    assert_eq!(
        snap.metadata.as_ref().and_then(|m| m.artist.as_deref()),
        Some("X")
    );
    assert!(snap.tap.is_some());

    let log = h.player.log();
    assert_eq!(
        log.loads,
        vec![(
            "https://randomsound.uk/stream/a/b.mp3".to_string(),
            "mp3".to_string()
        )]
    );
    assert_eq!(log.plays, 1);
}

#[tokio::test]
async fn test_missing_data_stays_idle_without_touching_player() {
    let mut h = harness();
    h.cmd(Command::RequestRandom).await;
    let outcome = crate::api::parse_random_response(r#"{"status":200}"#);
    h.complete_latest(outcome).await;

    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Idle);
    assert!(!snap.thinking);
    assert_eq!(h.fetcher.requests().len(), 1);
    let log = h.player.log();
    assert!(log.loads.is_empty());
    assert_eq!(log.plays + log.stops + log.unloads, 0);
}

#[tokio::test]
async fn test_three_timeouts_make_three_attempts_then_idle() {
    let mut h = harness();
    h.cmd(Command::RequestRandom).await;
    for _ in 0..3 {
        h.complete_latest(Err(ApiError::Timeout)).await;
    }

    let requests = h.fetcher.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests.iter().map(|r| r.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(requests.iter().all(|r| r.generation == requests[0].generation));

    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Idle);
    assert!(!snap.thinking);
    assert!(h.player.log().loads.is_empty());
}

#[tokio::test]
async fn test_timeout_then_success_plays() {
    let mut h = harness();
    h.cmd(Command::RequestRandom).await;
    h.complete_latest(Err(ApiError::Timeout)).await;
    h.complete_latest(Ok(track("x", "flac", "Y"))).await;

    assert_eq!(h.fetcher.requests().len(), 2);
    assert_eq!(h.controller.snapshot().state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_status_error_is_not_retried() {
    let mut h = harness();
    h.cmd(Command::RequestRandom).await;
    h.complete_latest(Err(ApiError::Status(500))).await;

    assert_eq!(h.fetcher.requests().len(), 1);
    assert_eq!(h.controller.snapshot().state, PlaybackState::Idle);
}

#[tokio::test]
async fn test_retry_counter_resets_per_chain() {
    let mut h = harness();
    h.cmd(Command::RequestRandom).await;
    h.complete_latest(Err(ApiError::Timeout)).await;
    h.complete_latest(Err(ApiError::Timeout)).await;
    h.complete_latest(Err(ApiError::Timeout)).await;

    h.cmd(Command::RequestRandom).await;
    h.complete_latest(Err(ApiError::Timeout)).await;

    let requests = h.fetcher.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[3].attempt, 1);
    assert_eq!(requests[4].attempt, 2);
    assert!(h.controller.snapshot().thinking);
}

#[tokio::test]
async fn test_request_while_thinking_is_ignored() {
    let mut h = harness();
    assert!(h.controller.request_random_track(RequestOrigin::User));
    assert!(!h.controller.request_random_track(RequestOrigin::User));
    assert_eq!(h.fetcher.requests().len(), 1);
}

#[tokio::test]
async fn test_stale_completion_is_ignored() {
    let mut h = harness();
    h.cmd(Command::RequestRandom).await;
    let stale = h.fetcher.last_generation();
    h.cmd(Command::Stop).await;
    h.cmd(Command::RequestRandom).await;

    h.complete(stale, Ok(track("old", "mp3", "Old"))).await;
    assert!(h.player.log().loads.is_empty());
    assert!(h.controller.snapshot().thinking);

    h.complete_latest(Ok(track("new", "mp3", "New"))).await;
    let snap = h.controller.snapshot();
    assert_eq!(
        snap.metadata.and_then(|m| m.artist),
        Some("New".to_string())
    );
    assert_eq!(h.player.log().loads.len(), 1);
}

#[tokio::test]
async fn test_next_track_stops_previous_first() {
    let mut h = harness();
    h.play_track("One").await;
    h.play_track("Two").await;

    let log = h.player.log();
    assert_eq!(log.loads.len(), 2);
    assert_eq!(log.stops, 1);
}

#[tokio::test]
async fn test_failed_fetch_while_playing_keeps_playing() {
    let mut h = harness();
    h.play_track("One").await;
    h.cmd(Command::RequestRandom).await;
    h.complete_latest(Err(ApiError::Malformed("no data".into()))).await;

    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Playing);
    assert!(snap.is_playing);
}

#[tokio::test]
async fn test_load_failure_errors() {
    let mut h = harness();
    h.player.log().fail_load = true;
    h.cmd(Command::RequestRandom).await;
    h.complete_latest(Ok(track("a", "mp3", "X"))).await;

    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Errored);
    assert!(!snap.is_playing);
    assert_eq!(h.player.log().unloads, 1);
}

// ── stop ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_without_player_is_noop() {
    let mut h = harness();
    h.cmd(Command::Stop).await;

    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Idle);
    let log = h.player.log();
    assert_eq!(log.stops + log.unloads, 0);
}

#[tokio::test]
async fn test_stop_unloads_even_when_not_reported_playing() {
    let mut h = harness();
    h.play_track("X").await;
    h.player.log().active = false;
    h.cmd(Command::Stop).await;

    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Stopped);
    assert!(!snap.is_playing);
    assert!(snap.tap.is_none());
    assert_eq!(h.player.log().unloads, 1);
}

#[tokio::test]
async fn test_stop_cancels_fetch_chain() {
    let mut h = harness();
    h.cmd(Command::RequestRandom).await;
    h.cmd(Command::Stop).await;

    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Stopped);
    assert!(!snap.thinking);

    h.complete_latest(Err(ApiError::Timeout)).await;
    assert_eq!(h.fetcher.requests().len(), 1);
}

#[tokio::test]
async fn test_metadata_kept_after_stop_by_default() {
    let mut h = harness();
    h.play_track("X").await;
    h.cmd(Command::Stop).await;
    assert!(h.controller.snapshot().metadata.is_some());
}

#[tokio::test]
async fn test_metadata_cleared_after_stop_when_configured() {
    let mut config = Config::default();
    config.player.metadata_on_stop = MetadataOnStop::Clear;
    let mut h = harness_with(config);
    h.play_track("X").await;
    h.cmd(Command::Stop).await;
    assert!(h.controller.snapshot().metadata.is_none());
}

// ── player events ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_triggers_exactly_one_request() {
    let mut h = harness();
    let id = h.play_track("X").await;
    assert_eq!(h.fetcher.requests().len(), 1);

    h.player_event(id, PlayerEventKind::Ended).await;
    assert_eq!(h.fetcher.requests().len(), 2);
    assert_eq!(h.controller.snapshot().state, PlaybackState::Loading);

    h.player_event(id, PlayerEventKind::Ended).await;
    assert_eq!(h.fetcher.requests().len(), 2);
}

#[tokio::test]
async fn test_events_from_old_instance_are_ignored() {
    let mut h = harness();
    let first = h.play_track("One").await;
    h.play_track("Two").await;

    h.player_event(first, PlayerEventKind::Ended).await;
    assert_eq!(h.fetcher.requests().len(), 2);
    h.player_event(first, PlayerEventKind::Error("gone".into()))
        .await;
    assert_eq!(h.controller.snapshot().state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_error_retries_once_then_errors() {
    let mut h = harness();
    let id = h.play_track("X").await;

    h.player_event(id, PlayerEventKind::Error("autoplay".into()))
        .await;
    assert_eq!(h.player.log().plays, 2);
    assert_eq!(h.controller.snapshot().state, PlaybackState::Playing);

    h.player_event(id, PlayerEventKind::Error("autoplay".into()))
        .await;
    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Errored);
    assert!(!snap.is_playing);
    assert_eq!(h.player.log().plays, 2);
    assert_eq!(h.player.log().unloads, 1);
}

#[tokio::test]
async fn test_silent_retry_leaves_playing_until_started() {
    let mut h = harness();
    let id = h.play_track("X").await;
    {
        let mut log = h.player.log();
        log.silent_plays = true;
        log.active = false;
    }

    h.player_event(id, PlayerEventKind::Error("loading failed".into()))
        .await;
    let snap = h.controller.snapshot();
    assert_ne!(snap.state, PlaybackState::Playing);
    assert!(!snap.is_playing);
    assert_eq!(h.player.log().plays, 2);

    h.player.log().active = true;
    h.player_event(id, PlayerEventKind::Started).await;
    assert_eq!(h.controller.snapshot().state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_silent_retry_then_error_settles_errored() {
    let mut h = harness();
    let id = h.play_track("X").await;
    {
        let mut log = h.player.log();
        log.silent_plays = true;
        log.active = false;
    }

    h.player_event(id, PlayerEventKind::Error("loading failed".into()))
        .await;
    h.player_event(id, PlayerEventKind::Error("loading failed".into()))
        .await;
    let snap = h.controller.snapshot();
    assert_eq!(snap.state, PlaybackState::Errored);
    assert!(snap.tap.is_none());
    assert_eq!(h.player.log().unloads, 1);
}

#[tokio::test]
async fn test_failing_retry_errors_immediately() {
    let mut h = harness();
    let id = h.play_track("X").await;
    h.player.log().failing_plays = 1;

    h.player_event(id, PlayerEventKind::Error("decode".into()))
        .await;
    assert_eq!(h.controller.snapshot().state, PlaybackState::Errored);
}

#[tokio::test]
async fn test_started_resets_unlock_retry() {
    let mut h = harness();
    let id = h.play_track("X").await;

    h.player_event(id, PlayerEventKind::Error("blip".into())).await;
    h.player_event(id, PlayerEventKind::Started).await;
    h.player_event(id, PlayerEventKind::Error("blip".into())).await;

    assert_eq!(h.controller.snapshot().state, PlaybackState::Playing);
    assert_eq!(h.player.log().plays, 3);
}

// ── filter ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_filter_persists_and_applies_to_next_fetch() {
    let mut h = harness();
    let both = FilterSelection::new(true, true).unwrap();
    h.cmd(Command::SetFilter(both)).await;

    let store = FilterStore::new(h._dir.path().join("filters.json"));
    assert_eq!(store.load(), both);
    assert!(h.player.log().loads.is_empty());

    h.cmd(Command::RequestRandom).await;
    assert_eq!(h.fetcher.requests()[0].selection, Selection::All);
}

#[tokio::test]
async fn test_every_event_publishes_a_snapshot() {
    let mut h = harness();
    h.cmd(Command::RequestRandom).await;
    h.complete_latest(Ok(track("a/b.mp3", "mp3", "X"))).await;

    let first = h.snapshots.recv().await.unwrap();
    assert!(first.thinking);
    let second = h.snapshots.recv().await.unwrap();
    assert_eq!(second.state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_run_exits_on_shutdown_and_releases_player() {
    let h = harness();
    let player = h.player.clone();
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let task = tokio::spawn(h.controller.run(rx));

    tx.send(ControllerEvent::Command(Command::Shutdown))
        .await
        .unwrap();
    task.await.unwrap();
    assert_eq!(player.log().unloads, 1);
}
