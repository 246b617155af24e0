//! VisualizerBridge — binds the current audio tap to a visualizer and drives
//! its render loop.
//!
//! The bridge owns at most one visualizer, bound to one tap id.  A new tap
//! (a new player instance) tears the old visualizer down and builds a fresh
//! one.  The render loop is a tokio interval task that renders only while
//! the playback gate is open, and is aborted whenever the binding goes away.

pub mod presets;
pub mod scope;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use randomsound_proto::config::VisualsConfig;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::player::{AudioTap, InstanceId};
use scope::DataSet;

#[derive(Debug, Error)]
pub enum VisualizerError {
    #[error("unknown preset {0:?}")]
    UnknownPreset(String),
    #[error("could not bind visualizer: {0}")]
    Bind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetStep {
    Random,
    Next,
    Previous,
}

#[derive(Debug, Clone)]
pub struct VisualizerOptions {
    pub width: u16,
    pub height: u16,
    pub samples: usize,
}

/// What the visualizer last drew, read by the TUI when it paints.
#[derive(Debug, Default)]
pub struct Surface {
    pub datasets: Vec<DataSet>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub preset: Option<String>,
    pub frames: u64,
}

pub type SharedSurface = Arc<Mutex<Surface>>;

pub trait Visualizer: Send {
    fn connect_audio(&mut self, tap: &AudioTap) -> Result<(), VisualizerError>;
    fn set_renderer_size(&mut self, width: u16, height: u16);
    fn load_preset(&mut self, preset: &str, blend_secs: f32) -> Result<(), VisualizerError>;
    /// Draw one frame.
    fn render(&mut self);
}

pub trait VisualizerFactory: Send {
    fn create(
        &self,
        surface: SharedSurface,
        options: &VisualizerOptions,
    ) -> Result<Box<dyn Visualizer>, VisualizerError>;
    fn presets(&self) -> Vec<String>;
}

type SharedVisualizer = Arc<Mutex<Box<dyn Visualizer>>>;

struct Binding {
    tap_id: InstanceId,
    visualizer: SharedVisualizer,
    render_task: JoinHandle<()>,
}

pub struct VisualizerBridge {
    factory: Box<dyn VisualizerFactory>,
    surface: SharedSurface,
    presets: Vec<String>,
    preset_index: usize,
    blend_secs: f32,
    frame_period: Duration,
    samples: usize,
    active: watch::Sender<bool>,
    binding: Option<Binding>,
}

impl VisualizerBridge {
    pub fn new(factory: Box<dyn VisualizerFactory>, config: &VisualsConfig) -> Self {
        let presets = factory.presets();
        let preset_index = if presets.is_empty() {
            0
        } else {
            rand::thread_rng().gen_range(0..presets.len())
        };
        let (active, _) = watch::channel(false);
        Self {
            factory,
            surface: Arc::new(Mutex::new(Surface::default())),
            presets,
            preset_index,
            blend_secs: config.blend_secs(),
            frame_period: Duration::from_secs_f64(1.0 / config.fps.clamp(1, 120) as f64),
            samples: config.samples.max(64) as usize,
            active,
            binding: None,
        }
    }

    pub fn surface(&self) -> SharedSurface {
        self.surface.clone()
    }

    pub fn bound_tap(&self) -> Option<InstanceId> {
        self.binding.as_ref().map(|b| b.tap_id)
    }

    pub fn current_preset(&self) -> Option<&str> {
        self.presets.get(self.preset_index).map(String::as_str)
    }

    /// Gate for the render loop: frames are drawn only while `true`.
    pub fn set_active(&self, active: bool) {
        self.active.send_replace(active);
    }

    /// Follow one controller snapshot: gate rendering on `playing`, stay
    /// bound to `tap` while the overlay is `shown`, detach otherwise.
    pub fn follow(&mut self, tap: Option<&AudioTap>, playing: bool, shown: bool, dims: Dimensions) {
        self.set_active(playing);
        match tap {
            Some(tap) if shown => self.attach(tap, dims),
            _ => self.detach(),
        }
    }

    pub fn attach(&mut self, tap: &AudioTap, dims: Dimensions) {
        if self.bound_tap() == Some(tap.id) {
            self.resize(dims);
            return;
        }
        self.detach();

        let options = VisualizerOptions {
            width: dims.width,
            height: dims.height,
            samples: self.samples,
        };
        let mut visualizer = match self.factory.create(self.surface.clone(), &options) {
            Ok(v) => v,
            Err(e) => {
                warn!("visuals: could not create visualizer: {}", e);
                return;
            }
        };
        if let Err(e) = visualizer.connect_audio(tap) {
            warn!("visuals: could not connect tap {}: {}", tap.id, e);
            return;
        }
        visualizer.set_renderer_size(dims.width, dims.height);
        if let Some(preset) = self.presets.get(self.preset_index) {
            if let Err(e) = visualizer.load_preset(preset, 0.0) {
                warn!("visuals: preset {} failed: {}", preset, e);
            }
        }

        let visualizer: SharedVisualizer = Arc::new(Mutex::new(visualizer));
        let render_task = spawn_render_loop(
            visualizer.clone(),
            self.active.subscribe(),
            self.frame_period,
        );
        info!("visuals: bound to tap {}", tap.id);
        self.binding = Some(Binding {
            tap_id: tap.id,
            visualizer,
            render_task,
        });
    }

    /// Cancel the render loop and drop the visualizer.
    pub fn detach(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        binding.render_task.abort();
        if let Ok(mut surface) = self.surface.lock() {
            surface.datasets.clear();
        }
        debug!("visuals: detached from tap {}", binding.tap_id);
    }

    pub fn resize(&mut self, dims: Dimensions) {
        if let Some(binding) = &self.binding {
            if let Ok(mut v) = binding.visualizer.lock() {
                v.set_renderer_size(dims.width, dims.height);
            }
        }
    }

    /// Move through the preset library.  A preset the bound visualizer
    /// refuses is logged and the current one stays.
    pub fn select_preset(&mut self, step: PresetStep) {
        let n = self.presets.len();
        if n == 0 {
            return;
        }
        let index = match step {
            PresetStep::Next => (self.preset_index + 1) % n,
            PresetStep::Previous => (self.preset_index + n - 1) % n,
            PresetStep::Random if n > 1 => {
                let offset = rand::thread_rng().gen_range(1..n);
                (self.preset_index + offset) % n
            }
            PresetStep::Random => 0,
        };

        let preset = &self.presets[index];
        if let Some(binding) = &self.binding {
            if let Ok(mut v) = binding.visualizer.lock() {
                if let Err(e) = v.load_preset(preset, self.blend_secs) {
                    warn!("visuals: preset {} failed: {}", preset, e);
                    return;
                }
            }
        }
        debug!("visuals: preset {}", preset);
        self.preset_index = index;
    }
}

impl Drop for VisualizerBridge {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.render_task.abort();
        }
    }
}

fn spawn_render_loop(
    visualizer: SharedVisualizer,
    active: watch::Receiver<bool>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !*active.borrow() {
                continue;
            }
            if let Ok(mut v) = visualizer.lock() {
                v.render();
            }
        }
    })
}
