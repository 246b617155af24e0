//! AppState — shared read-only data passed to all components during render/event.
//!
//! Components read this, but never mutate it.
//! The App event-loop is the only thing that writes to AppState.

use crate::core::ControllerSnapshot;
use crate::visualizer::SharedSurface;

pub struct AppState {
    /// Latest snapshot published by the controller.
    pub snapshot: ControllerSnapshot,
    /// The visuals overlay is shown.
    pub visuals_on: bool,
    pub preset: Option<String>,
    pub surface: SharedSurface,
    /// Base URL the player talks to, shown in the header.
    pub api_base: String,
}

impl AppState {
    pub fn new(surface: SharedSurface, api_base: String, visuals_on: bool) -> Self {
        Self {
            snapshot: ControllerSnapshot::default(),
            visuals_on,
            preset: None,
            surface,
            api_base,
        }
    }

    pub fn is_thinking(&self) -> bool {
        self.snapshot.thinking
    }

    pub fn is_playing(&self) -> bool {
        self.snapshot.is_playing
    }
}
