//! The shipped visualizer: scope display modes as presets, drawing into the
//! shared `Surface` the TUI renders.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::Instant;

use super::scope::{DisplayMode, GraphConfig, Matrix, Oscilloscope, PhaseScatter, Spectrum};
use super::{SharedSurface, Visualizer, VisualizerError, VisualizerFactory, VisualizerOptions};
use crate::player::AudioTap;
use crate::theme;

pub const PRESETS: &[&str] = &["oscilloscope", "scatter", "peaks", "spectrum"];

fn mode_for(preset: &str) -> Option<Box<dyn DisplayMode>> {
    match preset {
        "oscilloscope" => Some(Box::new(Oscilloscope::default())),
        "scatter" => Some(Box::new(PhaseScatter)),
        "peaks" => Some(Box::new(Oscilloscope { peaks: true })),
        "spectrum" => Some(Box::new(Spectrum::default())),
        _ => None,
    }
}

/// Outgoing preset, drawn dimmed underneath the new one until `until`.
struct Blend {
    mode: Box<dyn DisplayMode>,
    until: Instant,
}

pub struct ScopeVisualizer {
    surface: SharedSurface,
    cfg: GraphConfig,
    audio: Option<broadcast::Receiver<Arc<Vec<f32>>>>,
    ring: VecDeque<f32>,
    mode: Option<(String, Box<dyn DisplayMode>)>,
    blend: Option<Blend>,
    matrix: Matrix,
}

impl ScopeVisualizer {
    pub fn new(surface: SharedSurface, options: &VisualizerOptions) -> Self {
        Self {
            surface,
            cfg: GraphConfig {
                samples: options.samples.max(64) as u32,
                columns: options.width,
                palette: vec![theme::C_SCOPE, theme::C_ACCENT],
                axis_color: theme::C_SEPARATOR,
                ..GraphConfig::default()
            },
            audio: None,
            ring: VecDeque::with_capacity(options.samples),
            mode: None,
            blend: None,
            matrix: vec![Vec::new()],
        }
    }

    fn drain_audio(&mut self) {
        let Some(rx) = self.audio.as_mut() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(chunk) => self.ring.extend(chunk.iter().copied()),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        let n = self.cfg.samples as usize;
        let excess = self.ring.len().saturating_sub(n);
        self.ring.drain(..excess);
    }

    /// Latest `samples` values, right-aligned and zero-padded on the left.
    fn fill_matrix(&mut self) {
        let n = self.cfg.samples as usize;
        let channel = &mut self.matrix[0];
        channel.clear();
        channel.resize(n.saturating_sub(self.ring.len()), 0.0);
        channel.extend(self.ring.iter().map(|&s| s as f64));
    }
}

impl Visualizer for ScopeVisualizer {
    fn connect_audio(&mut self, tap: &AudioTap) -> Result<(), VisualizerError> {
        self.audio = Some(tap.subscribe());
        self.ring.clear();
        Ok(())
    }

    fn set_renderer_size(&mut self, width: u16, _height: u16) {
        self.cfg.columns = width.max(1);
    }

    fn load_preset(&mut self, preset: &str, blend_secs: f32) -> Result<(), VisualizerError> {
        let mode = mode_for(preset).ok_or_else(|| VisualizerError::UnknownPreset(preset.to_string()))?;
        let previous = self.mode.replace((preset.to_string(), mode));
        self.blend = match previous {
            Some((_, old)) if blend_secs > 0.0 => Duration::try_from_secs_f32(blend_secs)
                .ok()
                .map(|d| Blend {
                    mode: old,
                    until: Instant::now() + d,
                }),
            _ => None,
        };
        Ok(())
    }

    fn render(&mut self) {
        self.drain_audio();
        self.fill_matrix();

        let Some((name, mode)) = self.mode.as_mut() else {
            return;
        };

        let mut datasets = Vec::new();
        if let Some(blend) = self.blend.as_mut() {
            if Instant::now() < blend.until {
                let mut faded = blend.mode.process(&self.cfg, &self.matrix);
                for ds in &mut faded {
                    ds.color = theme::C_MUTED;
                }
                datasets.extend(faded);
            } else {
                self.blend = None;
            }
        }
        datasets.extend(mode.references(&self.cfg));
        datasets.extend(mode.process(&self.cfg, &self.matrix));
        let (x_bounds, y_bounds) = mode.bounds(&self.cfg);

        if let Ok(mut surface) = self.surface.lock() {
            surface.datasets = datasets;
            surface.x_bounds = x_bounds;
            surface.y_bounds = y_bounds;
            surface.preset = Some(name.clone());
            surface.frames += 1;
        }
    }
}

#[derive(Default)]
pub struct ScopeFactory;

impl VisualizerFactory for ScopeFactory {
    fn create(
        &self,
        surface: SharedSurface,
        options: &VisualizerOptions,
    ) -> Result<Box<dyn Visualizer>, VisualizerError> {
        Ok(Box::new(ScopeVisualizer::new(surface, options)))
    }

    fn presets(&self) -> Vec<String> {
        PRESETS.iter().map(|p| p.to_string()).collect()
    }
}
