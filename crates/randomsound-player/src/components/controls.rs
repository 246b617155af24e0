//! Controls component: the play/next and stop buttons.
//!
//! `play / next` is disabled while a fetch chain runs and shows a spinner
//! instead; `stop` is only offered while something is actually playing.

use randomsound_proto::protocol::PlaybackState;
use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{style_key_hint, style_muted, C_CONNECTING, C_PRIMARY},
    widgets::{pane_chrome::pane_chrome, spinner::Spinner},
};

#[derive(Default)]
pub struct Controls {
    spinner: Spinner,
}

/// `next` while a track is loaded or running, `play` once playback rests.
pub fn play_label(state: PlaybackState, has_track: bool) -> &'static str {
    if has_track && !state.is_resting() {
        "next"
    } else {
        "play"
    }
}

impl Controls {
    fn button<'a>(key: &'a str, label: &'a str, enabled: bool) -> Vec<Span<'a>> {
        let label_style = if enabled {
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
        } else {
            style_muted()
        };
        vec![
            Span::styled(format!("[{}] ", key), style_key_hint()),
            Span::styled(label, label_style),
            Span::raw("   "),
        ]
    }
}

impl Component for Controls {
    fn id(&self) -> ComponentId {
        ComponentId::Controls
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('r') => {
                if state.is_thinking() {
                    vec![]
                } else {
                    vec![Action::RequestRandom]
                }
            }
            KeyCode::Char('s') => vec![Action::Stop],
            _ => vec![],
        }
    }

    fn tick(&mut self, state: &AppState) {
        if state.is_thinking() {
            self.spinner.tick();
        } else {
            self.spinner.reset();
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let thinking = state.is_thinking();
        let snap = &state.snapshot;
        let label = play_label(snap.state, snap.metadata.is_some());

        let mut spans = Vec::new();
        if thinking {
            spans.push(Span::styled(
                format!("{} ", self.spinner.glyph()),
                Style::default().fg(C_CONNECTING),
            ));
        }
        spans.extend(Self::button("space", label, !thinking));
        if state.is_playing() {
            spans.extend(Self::button("s", "stop", true));
        }

        let block = pane_chrome("controls", None, thinking, None);
        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn min_height(&self) -> u16 {
        3
    }
}
