//! FilterBar component: `[m] mixes` / `[t] tunes` checkboxes.
//!
//! A toggle that would leave nothing selected is refused here, before it
//! ever reaches the controller.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tracing::debug;

use randomsound_proto::filter::FilterSelection;

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{style_key_hint, style_muted, C_FILTER_FG},
};

/// The action for a toggle key, or `None` when the key isn't a toggle or the
/// result would be empty.
pub fn toggle_for(key: KeyCode, current: &FilterSelection) -> Option<Action> {
    let toggled = match key {
        KeyCode::Char('m') => current.toggled_mixes(),
        KeyCode::Char('t') => current.toggled_tunes(),
        _ => return None,
    };
    match toggled {
        Ok(next) => Some(Action::SetFilter(next)),
        Err(e) => {
            debug!("filter: toggle refused: {}", e);
            None
        }
    }
}

#[derive(Default)]
pub struct FilterBar;

fn checkbox<'a>(key: char, label: &'a str, checked: bool) -> Vec<Span<'a>> {
    let (mark, style) = if checked {
        (
            "[x]",
            Style::default().fg(C_FILTER_FG).add_modifier(Modifier::BOLD),
        )
    } else {
        ("[ ]", style_muted())
    };
    vec![
        Span::styled(format!("{} ", key), style_key_hint()),
        Span::styled(format!("{} {}", mark, label), style),
        Span::raw("   "),
    ]
}

impl Component for FilterBar {
    fn id(&self) -> ComponentId {
        ComponentId::FilterBar
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        toggle_for(key.code, &state.snapshot.filter)
            .into_iter()
            .collect()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let f = &state.snapshot.filter;
        let mut spans = vec![Span::raw(" ")];
        spans.extend(checkbox('m', "mixes", f.include_mixes()));
        spans.extend(checkbox('t', "tunes", f.include_tunes()));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}
