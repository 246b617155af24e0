//! Header component: one-row top bar with the site title, API host and state badge.
//!
//! Not focusable.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use randomsound_proto::protocol::PlaybackState;

use crate::{
    action::ComponentId,
    app_state::AppState,
    component::Component,
    theme::{C_ACCENT, C_CONNECTING, C_ERROR, C_MUTED, C_PLAYING, C_SECONDARY},
};

pub const TITLE: &str = "randomsound.uk";

fn badge_color(state: PlaybackState) -> Color {
    match state {
        PlaybackState::Playing => C_PLAYING,
        PlaybackState::Loading => C_CONNECTING,
        PlaybackState::Errored => C_ERROR,
        PlaybackState::Idle | PlaybackState::Stopped => C_MUTED,
    }
}

#[derive(Default)]
pub struct Header;

impl Component for Header {
    fn id(&self) -> ComponentId {
        ComponentId::Header
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(8)])
            .split(area);

        let title = Line::from(vec![
            Span::styled(
                format!(" {} ", TITLE),
                Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                state.api_base.trim_end_matches('/').to_string(),
                Style::default().fg(C_SECONDARY),
            ),
        ]);
        frame.render_widget(Paragraph::new(title), cols[0]);

        let s = state.snapshot.state;
        let badge = Line::from(Span::styled(
            format!(" {} ", s.badge_label()),
            Style::default()
                .fg(badge_color(s))
                .add_modifier(Modifier::BOLD),
        ))
        .right_aligned();
        frame.render_widget(Paragraph::new(badge), cols[1]);
    }
}
