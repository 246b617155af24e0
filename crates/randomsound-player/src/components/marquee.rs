//! Marquee component: one line of track metadata scrolling right to left.

use ratatui::{layout::Rect, text::Line, widgets::Paragraph, Frame};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::{
    action::ComponentId, app_state::AppState, component::Component, theme::style_secondary,
};

const GAP: &str = "   ·   ";

/// The `width`-cell slice of `text` looped with a gap, starting `offset`
/// glyphs in.  Text that already fits is returned as is.
pub fn marquee_window(text: &str, offset: usize, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if text.width() <= width {
        return text.to_string();
    }

    let looped: Vec<char> = text.chars().chain(GAP.chars()).collect();
    let mut out = String::new();
    let mut used = 0;
    for ch in looped.iter().cycle().skip(offset % looped.len()) {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(*ch);
        used += w;
    }
    // a wide glyph that did not fit leaves a hole
    out.extend(std::iter::repeat(' ').take(width - used));
    out
}

#[derive(Default)]
pub struct Marquee {
    text: String,
    offset: usize,
}

impl Marquee {
    fn sync(&mut self, state: &AppState) {
        let text = state
            .snapshot
            .metadata
            .as_ref()
            .map(|m| m.ticker_text())
            .unwrap_or_default();
        if text != self.text {
            self.text = text;
            self.offset = 0;
        }
    }
}

impl Component for Marquee {
    fn id(&self) -> ComponentId {
        ComponentId::Marquee
    }

    fn tick(&mut self, state: &AppState) {
        self.sync(state);
        if !self.text.is_empty() {
            self.offset = self.offset.wrapping_add(1);
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        self.sync(state);
        let line = marquee_window(&self.text, self.offset, area.width as usize);
        frame.render_widget(
            Paragraph::new(Line::styled(line, style_secondary())),
            area,
        );
    }
}
