//! TrackMeta component — labelled lines for the fields the current track has.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use crate::{
    action::ComponentId,
    app_state::AppState,
    component::Component,
    theme::{style_default, style_muted, style_secondary},
    widgets::pane_chrome::pane_chrome,
};

#[derive(Default)]
pub struct TrackMeta;

impl Component for TrackMeta {
    fn id(&self) -> ComponentId {
        ComponentId::TrackMeta
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let lines: Vec<Line> = match &state.snapshot.metadata {
            Some(meta) => meta
                .display_fields()
                .into_iter()
                .map(|(label, value)| {
                    Line::from(vec![
                        Span::styled(format!("{:<8}", label), style_secondary()),
                        Span::styled(value.to_string(), style_default()),
                    ])
                })
                .collect(),
            None => vec![Line::from(Span::styled(
                "press space for a random sound",
                style_muted(),
            ))],
        };

        let block = pane_chrome("now playing", None, false, None);
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
            area,
        );
    }

    fn min_height(&self) -> u16 {
        6
    }
}
