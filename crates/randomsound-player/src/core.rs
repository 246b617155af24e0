/// PlaybackController — single-owner event loop for playback state.
///
/// Everything that wants to change playback sends a `ControllerEvent` into
/// this loop: user commands from the TUI, fetch completions from the
/// `TrackFetcher`, lifecycle events from the `AudioPlayer`.  The controller
/// owns the player exclusively and publishes a `ControllerSnapshot` on a
/// broadcast channel after every event that may have changed something.
///
/// Two tokens keep late arrivals harmless:
/// - every fetch chain gets a new `generation`; completions carrying an older
///   one are dropped (a stop bumps it too, cancelling the chain);
/// - every `load` yields a new player instance id; events for instances the
///   controller has moved past are dropped.
use randomsound_proto::config::{Config, MetadataOnStop};
use randomsound_proto::filter::FilterSelection;
use randomsound_proto::protocol::{PlaybackState, TrackMetadata};
use randomsound_proto::state::FilterStore;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::api::{ApiEndpoints, ApiError, FetchRequest, TrackFetcher};
use crate::player::{AudioPlayer, AudioTap, InstanceId, PlayerEvent, PlayerEventKind};

/// User intents, sent by the TUI.
#[derive(Debug, Clone)]
pub enum Command {
    RequestRandom,
    Stop,
    SetFilter(FilterSelection),
    Shutdown,
}

/// All inputs into the controller loop.
#[derive(Debug)]
pub enum ControllerEvent {
    Command(Command),
    FetchCompleted {
        generation: u64,
        outcome: Result<TrackMetadata, ApiError>,
    },
    Player(PlayerEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    User,
    AutoAdvance,
}

/// What the view renders from.  `is_playing` and `tap` are read from the
/// player when the snapshot is taken.
#[derive(Debug, Clone, Default)]
pub struct ControllerSnapshot {
    pub state: PlaybackState,
    pub thinking: bool,
    pub is_playing: bool,
    pub metadata: Option<TrackMetadata>,
    pub filter: FilterSelection,
    pub tap: Option<AudioTap>,
}

pub struct PlaybackController {
    player: Box<dyn AudioPlayer>,
    fetcher: Box<dyn TrackFetcher>,
    store: FilterStore,
    endpoints: ApiEndpoints,
    snapshot_tx: broadcast::Sender<ControllerSnapshot>,

    state: PlaybackState,
    /// A fetch chain is in flight.
    thinking: bool,
    metadata: Option<TrackMetadata>,
    filter: FilterSelection,

    generation: u64,
    attempts: u32,
    max_attempts: u32,

    instance: Option<InstanceId>,
    /// The current instance already had its one unlock retry.
    unlock_retried: bool,
    metadata_on_stop: MetadataOnStop,
}

impl PlaybackController {
    pub fn new(
        config: &Config,
        player: Box<dyn AudioPlayer>,
        fetcher: Box<dyn TrackFetcher>,
        store: FilterStore,
        snapshot_tx: broadcast::Sender<ControllerSnapshot>,
    ) -> Self {
        let filter = store.load();
        info!(
            "controller: filter mixes={} tunes={}",
            filter.include_mixes(),
            filter.include_tunes()
        );
        Self {
            player,
            fetcher,
            store,
            endpoints: ApiEndpoints::new(&config.api.base_url),
            snapshot_tx,
            state: PlaybackState::Idle,
            thinking: false,
            metadata: None,
            filter,
            generation: 0,
            attempts: 0,
            max_attempts: config.api.max_attempts.max(1),
            instance: None,
            unlock_retried: false,
            metadata_on_stop: config.player.metadata_on_stop,
        }
    }

    /// Run until `Shutdown` or until every sender is gone, then release the
    /// player.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<ControllerEvent>) {
        info!("controller: starting event loop");
        self.publish();

        while let Some(evt) = event_rx.recv().await {
            if !self.handle(evt).await {
                info!("controller: shutdown requested");
                break;
            }
        }

        self.player.shutdown().await;
        self.instance = None;
        info!("controller: stopped");
    }

    /// Apply one event.  Returns `false` once the loop should exit.
    pub async fn handle(&mut self, evt: ControllerEvent) -> bool {
        match evt {
            ControllerEvent::Command(Command::Shutdown) => return false,
            ControllerEvent::Command(Command::RequestRandom) => {
                self.request_random_track(RequestOrigin::User);
            }
            ControllerEvent::Command(Command::Stop) => self.stop().await,
            ControllerEvent::Command(Command::SetFilter(filter)) => self.set_filter(filter),
            ControllerEvent::FetchCompleted {
                generation,
                outcome,
            } => self.on_fetch_completed(generation, outcome).await,
            ControllerEvent::Player(evt) => self.on_player_event(evt).await,
        }
        self.publish();
        true
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let has_instance = self.instance.is_some();
        ControllerSnapshot {
            state: self.state,
            thinking: self.thinking,
            is_playing: has_instance && self.player.is_playing(),
            metadata: self.metadata.clone(),
            filter: self.filter,
            tap: if has_instance {
                self.player.audio_tap()
            } else {
                None
            },
        }
    }

    fn publish(&self) {
        // no receivers just means the TUI is gone
        let _ = self.snapshot_tx.send(self.snapshot());
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            info!("controller: {:?} → {:?}", self.state, state);
            self.state = state;
        }
    }

    // ── fetch chain ──────────────────────────────────────────────────────────

    /// Start a new fetch chain.  Returns `false` if one is already running.
    pub fn request_random_track(&mut self, origin: RequestOrigin) -> bool {
        if self.thinking {
            debug!("controller: {:?} request ignored, fetch in flight", origin);
            return false;
        }
        self.thinking = true;
        self.generation += 1;
        self.attempts = 0;
        info!(
            "controller: {:?} request, generation {}",
            origin, self.generation
        );
        self.set_state(PlaybackState::Loading);
        self.dispatch_fetch();
        true
    }

    fn dispatch_fetch(&mut self) {
        self.attempts += 1;
        self.fetcher.dispatch(FetchRequest {
            generation: self.generation,
            attempt: self.attempts,
            selection: self.filter.selection(),
        });
    }

    async fn on_fetch_completed(&mut self, generation: u64, outcome: Result<TrackMetadata, ApiError>) {
        if generation != self.generation || !self.thinking {
            debug!(
                "controller: dropping stale fetch result gen={} (current {})",
                generation, self.generation
            );
            return;
        }

        match outcome {
            Ok(meta) => {
                self.thinking = false;
                self.start_track(meta).await;
            }
            Err(ApiError::Timeout) if self.attempts < self.max_attempts => {
                warn!(
                    "controller: fetch timed out (attempt {}/{}), retrying",
                    self.attempts, self.max_attempts
                );
                self.dispatch_fetch();
            }
            Err(e) => {
                warn!(
                    "controller: giving up on fetch after {} attempt(s): {}",
                    self.attempts, e
                );
                self.thinking = false;
                self.settle_after_abort();
            }
        }
    }

    /// An abandoned chain leaves whatever was already playing alone.
    fn settle_after_abort(&mut self) {
        if self.instance.is_some() && self.player.is_playing() {
            self.set_state(PlaybackState::Playing);
        } else {
            self.set_state(PlaybackState::Idle);
        }
    }

    async fn start_track(&mut self, meta: TrackMetadata) {
        let url = self.endpoints.stream_url(&meta.path);
        let format = meta.extension.clone();

        if self.instance.is_some() {
            if let Err(e) = self.player.stop().await {
                warn!("controller: stopping previous track failed: {}", e);
            }
        }

        info!("controller: now playing {}", meta.ticker_text());
        self.metadata = Some(meta);
        self.unlock_retried = false;

        match self.player.load(&url, &format).await {
            Ok(id) => self.instance = Some(id),
            Err(e) => {
                warn!("controller: load {} failed: {}", url, e);
                self.fail_playback().await;
                return;
            }
        }
        if let Err(e) = self.player.play().await {
            warn!("controller: play failed: {}", e);
            self.fail_playback().await;
            return;
        }
        self.set_state(PlaybackState::Playing);
    }

    async fn fail_playback(&mut self) {
        self.player.unload().await;
        self.instance = None;
        if !self.thinking {
            self.set_state(PlaybackState::Errored);
        }
    }

    // ── user operations ──────────────────────────────────────────────────────

    /// Cancel any fetch chain and tear the player down.  With nothing running
    /// this does nothing at all.
    pub async fn stop(&mut self) {
        let cancelled_fetch = self.thinking;
        let had_player = self.instance.is_some();
        if !cancelled_fetch && !had_player {
            debug!("controller: stop with nothing to stop");
            return;
        }

        if cancelled_fetch {
            self.generation += 1;
            self.thinking = false;
        }
        if had_player {
            self.player.unload().await;
            self.instance = None;
        }
        if self.metadata_on_stop == MetadataOnStop::Clear {
            self.metadata = None;
        }
        self.set_state(PlaybackState::Stopped);
    }

    /// Applies to the next fetch only.
    pub fn set_filter(&mut self, filter: FilterSelection) {
        self.filter = filter;
        if let Err(e) = self.store.save(&filter) {
            warn!(
                "controller: could not persist filter to {}: {}",
                self.store.path().display(),
                e
            );
        }
    }

    // ── player events ────────────────────────────────────────────────────────

    async fn on_player_event(&mut self, evt: PlayerEvent) {
        if self.instance != Some(evt.instance) {
            debug!(
                "controller: ignoring {:?} from instance {}",
                evt.kind, evt.instance
            );
            return;
        }

        match evt.kind {
            PlayerEventKind::Started => self.on_playback_started(),
            PlayerEventKind::Ended => self.on_track_ended(),
            PlayerEventKind::Error(reason) => self.on_playback_error(&reason).await,
        }
    }

    fn on_playback_started(&mut self) {
        self.unlock_retried = false;
        if !self.thinking {
            self.set_state(PlaybackState::Playing);
        }
    }

    fn on_track_ended(&mut self) {
        self.request_random_track(RequestOrigin::AutoAdvance);
    }

    async fn on_playback_error(&mut self, reason: &str) {
        if self.unlock_retried {
            warn!("controller: playback failed again ({}), giving up", reason);
            self.fail_playback().await;
            return;
        }

        self.unlock_retried = true;
        warn!("controller: playback error ({}), retrying once", reason);
        if let Err(e) = self.player.play().await {
            warn!("controller: retry failed: {}", e);
            self.fail_playback().await;
            return;
        }
        // a reloaded instance is not audible until it reports Started
        if !self.thinking && !self.player.is_playing() {
            self.set_state(PlaybackState::Loading);
        }
    }
}

#[cfg(test)]
mod tests;
