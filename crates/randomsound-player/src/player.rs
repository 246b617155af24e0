//! Audio player capability and the mpv-backed implementation.
//!
//! The controller only sees `AudioPlayer`.  Each `load` creates a new player
//! instance with its own id; lifecycle events are stamped with that id so
//! the controller can drop events from instances it has already replaced.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBS_CORE_IDLE, OBS_PAUSE};

pub type InstanceId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEventKind {
    Started,
    Ended,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEvent {
    pub instance: InstanceId,
    pub kind: PlayerEventKind,
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("audio engine unavailable: {0}")]
    Unavailable(String),
    #[error("player command failed: {0}")]
    Command(String),
}

/// Live decoded audio of one player instance: mono f32 PCM chunks.
#[derive(Debug, Clone)]
pub struct AudioTap {
    pub id: InstanceId,
    tx: broadcast::Sender<Arc<Vec<f32>>>,
}

impl AudioTap {
    pub fn new(id: InstanceId) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { id, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<f32>>> {
        self.tx.subscribe()
    }

    /// Producer side, handed to whatever decodes the audio.
    pub fn sender(&self) -> broadcast::Sender<Arc<Vec<f32>>> {
        self.tx.clone()
    }
}

#[async_trait]
pub trait AudioPlayer: Send {
    /// Load `url` as a new instance.  Nothing is audible until `play`.
    async fn load(&mut self, url: &str, format: &str) -> Result<InstanceId, PlayerError>;
    /// Start or resume the current instance.  If the engine already dropped
    /// it after an error, this reloads it under the same id.
    async fn play(&mut self) -> Result<(), PlayerError>;
    async fn stop(&mut self) -> Result<(), PlayerError>;
    /// Tear the current instance down.  Safe to call with nothing loaded.
    async fn unload(&mut self);
    fn is_playing(&self) -> bool;
    fn audio_tap(&self) -> Option<AudioTap>;
    /// Release the engine itself; called once when the controller exits.
    async fn shutdown(&mut self) {
        self.unload().await;
    }
}

/// lavf demuxer names for the extensions the server hands out.
fn demuxer_for(format: &str) -> Option<&'static str> {
    match format {
        "mp3" => Some("mp3"),
        "flac" => Some("flac"),
        "wav" => Some("wav"),
        "ogg" => Some("ogg"),
        _ => None,
    }
}

pub struct MpvPlayer {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    volume: f32,
    events: mpsc::Sender<PlayerEvent>,
    next_instance: InstanceId,
    /// Instance the event translator stamps events with; 0 when unloaded.
    current: Arc<AtomicU64>,
    active: Arc<AtomicBool>,
    /// Set by the translator when mpv ends the file with an error.
    dropped: Arc<AtomicBool>,
    /// `(url, format)` of the current instance.
    loaded: Option<(String, String)>,
    tap: Option<(AudioTap, AbortHandle)>,
    tap_enabled: bool,
}

impl MpvPlayer {
    pub fn new(volume: f32, events: mpsc::Sender<PlayerEvent>) -> Self {
        let mut driver = MpvDriver::new();
        driver.last_volume = volume;
        let tap_enabled = randomsound_proto::platform::find_ffmpeg_binary().is_some();
        if !tap_enabled {
            warn!("ffmpeg not found, visuals will have no audio");
        }
        Self {
            driver,
            handle: None,
            volume,
            events,
            next_instance: 1,
            current: Arc::new(AtomicU64::new(0)),
            active: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicBool::new(false)),
            loaded: None,
            tap: None,
            tap_enabled,
        }
    }

    async fn ensure_handle(&mut self) -> Result<MpvHandle, PlayerError> {
        if self.handle.is_some() && !self.driver.process_alive() {
            warn!("mpv process died, respawning");
            self.handle = None;
        }
        if let Some(h) = &self.handle {
            return Ok(h.clone());
        }

        let (mpv_tx, mpv_rx) = mpsc::channel::<MpvEvent>(64);
        tokio::spawn(translate_events(
            mpv_rx,
            self.events.clone(),
            self.current.clone(),
            self.active.clone(),
            self.dropped.clone(),
        ));

        let handle = self
            .driver
            .spawn_and_connect(mpv_tx)
            .await
            .map_err(|e| PlayerError::Unavailable(e.to_string()))?;
        handle.observe_playback().await;
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    async fn open(&self, handle: &MpvHandle, url: &str, format: &str) -> Result<(), PlayerError> {
        handle
            .set_demuxer(demuxer_for(format))
            .await
            .map_err(|e| PlayerError::Command(e.to_string()))?;
        handle
            .load_paused(url, self.volume)
            .await
            .map_err(|e| PlayerError::Command(e.to_string()))
    }

    /// Reopen the current instance after mpv dropped it.  The tap keeps its
    /// id and sender so a bound visualizer stays connected.
    async fn reopen(&mut self, handle: &MpvHandle) -> Result<(), PlayerError> {
        let (url, format) = self
            .loaded
            .clone()
            .ok_or_else(|| PlayerError::Unavailable("nothing loaded".to_string()))?;
        info!(
            "player: reloading instance {} ({})",
            self.current.load(Ordering::SeqCst),
            url
        );
        self.open(handle, &url, &format).await?;
        if let Some((tap, abort)) = self.tap.take() {
            abort.abort();
            let abort = crate::tap::spawn_pcm_tap(url, tap.sender());
            self.tap = Some((tap, abort));
        }
        Ok(())
    }

    fn stop_tap(&mut self) {
        if let Some((tap, abort)) = self.tap.take() {
            debug!("player: closing audio tap {}", tap.id);
            abort.abort();
        }
    }
}

#[async_trait]
impl AudioPlayer for MpvPlayer {
    async fn load(&mut self, url: &str, format: &str) -> Result<InstanceId, PlayerError> {
        let handle = self.ensure_handle().await?;

        let id = self.next_instance;
        self.next_instance += 1;
        self.stop_tap();
        self.active.store(false, Ordering::SeqCst);
        self.dropped.store(false, Ordering::SeqCst);
        self.current.store(id, Ordering::SeqCst);
        self.loaded = Some((url.to_string(), format.to_string()));

        self.open(&handle, url, format).await?;
        info!("player: loaded instance {} ({})", id, url);

        if self.tap_enabled {
            let tap = AudioTap::new(id);
            let abort = crate::tap::spawn_pcm_tap(url.to_string(), tap.sender());
            self.tap = Some((tap, abort));
        }
        Ok(id)
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        if self.current.load(Ordering::SeqCst) == 0 {
            return Err(PlayerError::Unavailable("nothing loaded".to_string()));
        }
        let handle = self
            .handle
            .clone()
            .ok_or_else(|| PlayerError::Unavailable("nothing loaded".to_string()))?;
        if self.dropped.swap(false, Ordering::SeqCst) {
            self.reopen(&handle).await?;
        }
        handle
            .set_pause(false)
            .await
            .map_err(|e| PlayerError::Command(e.to_string()))
    }

    async fn stop(&mut self) -> Result<(), PlayerError> {
        self.active.store(false, Ordering::SeqCst);
        if let Some(handle) = &self.handle {
            handle
                .stop()
                .await
                .map_err(|e| PlayerError::Command(e.to_string()))?;
        }
        Ok(())
    }

    async fn unload(&mut self) {
        let instance = self.current.swap(0, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        self.dropped.store(false, Ordering::SeqCst);
        self.loaded = None;
        self.stop_tap();
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.stop().await {
                debug!("player: stop during unload failed: {}", e);
            }
        }
        if instance != 0 {
            info!("player: unloaded instance {}", instance);
        }
    }

    fn is_playing(&self) -> bool {
        self.current.load(Ordering::SeqCst) != 0 && self.active.load(Ordering::SeqCst)
    }

    fn audio_tap(&self) -> Option<AudioTap> {
        self.tap.as_ref().map(|(tap, _)| tap.clone())
    }

    async fn shutdown(&mut self) {
        self.unload().await;
        self.handle = None;
        self.driver.kill().await;
    }
}

/// Turn raw mpv events into `PlayerEvent`s for whichever instance is current.
///
/// `Started` fires once per instance, the first time mpv reports audio
/// flowing while unpaused.
async fn translate_events(
    mut rx: mpsc::Receiver<MpvEvent>,
    events: mpsc::Sender<PlayerEvent>,
    current: Arc<AtomicU64>,
    active: Arc<AtomicBool>,
    dropped: Arc<AtomicBool>,
) {
    let mut core_idle = true;
    let mut paused = true;
    let mut started_for: InstanceId = 0;

    while let Some(evt) = rx.recv().await {
        let instance = current.load(Ordering::SeqCst);

        let kind = if let Some((obs_id, data)) = evt.as_property_change() {
            match obs_id {
                OBS_CORE_IDLE => core_idle = data.as_bool().unwrap_or(true),
                OBS_PAUSE => paused = data.as_bool().unwrap_or(false),
                _ => continue,
            }
            let now_active = instance != 0 && !core_idle && !paused;
            active.store(now_active, Ordering::SeqCst);
            if now_active && started_for != instance {
                started_for = instance;
                Some(PlayerEventKind::Started)
            } else {
                None
            }
        } else {
            match evt.event_name() {
                Some("end-file") => {
                    let reason = evt
                        .raw
                        .get("reason")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown");
                    debug!("mpv: end-file reason={}", reason);
                    active.store(false, Ordering::SeqCst);
                    match reason {
                        "eof" => Some(PlayerEventKind::Ended),
                        "error" | "network" => {
                            // mpv is idle now; a reload must report Started again
                            dropped.store(true, Ordering::SeqCst);
                            started_for = 0;
                            let detail = evt
                                .raw
                                .get("file_error")
                                .and_then(|v| v.as_str())
                                .unwrap_or(reason)
                                .to_string();
                            Some(PlayerEventKind::Error(detail))
                        }
                        // stop/quit/redirect are our own doing
                        _ => None,
                    }
                }
                _ => None,
            }
        };

        if let (Some(kind), true) = (kind, instance != 0) {
            if events.send(PlayerEvent { instance, kind }).await.is_err() {
                break;
            }
        }
    }
    debug!("player: mpv event translator exiting");
}
