//! Component trait — the interface every UI panel implements.
//!
//! - Components own their view state and render themselves.
//! - Components read `AppState` for data they don't own.
//! - Components return `Vec<Action>`; they never talk to the controller directly.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;

pub trait Component {
    fn id(&self) -> ComponentId;

    /// Handle a key event. Returns actions to be dispatched.
    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    /// Called each UI tick (~100ms) for animation.
    fn tick(&mut self, _state: &AppState) {}

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState);

    /// The minimum height required to render meaningfully.
    fn min_height(&self) -> u16 {
        1
    }
}
