//! Visuals component — draws the visualizer surface as a chart overlay.
//!
//! The render loop writes the surface; this only reads the last frame.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    widgets::{Axis, Chart, Clear, Dataset},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{C_BG, C_SCOPE},
    visualizer::PresetStep,
    widgets::pane_chrome::{pane_chrome, Badge},
};

#[derive(Default)]
pub struct Visuals;

impl Component for Visuals {
    fn id(&self) -> ComponentId {
        ComponentId::Visuals
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        match key.code {
            KeyCode::Char('v') => vec![Action::ToggleVisuals],
            KeyCode::Char('n') if state.visuals_on => vec![Action::Preset(PresetStep::Next)],
            KeyCode::Char('p') if state.visuals_on => vec![Action::Preset(PresetStep::Previous)],
            KeyCode::Char('x') if state.visuals_on => vec![Action::Preset(PresetStep::Random)],
            _ => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        frame.render_widget(Clear, area);
        let preset = state.preset.as_deref().unwrap_or("");
        let block = pane_chrome(
            "visuals",
            Some('v'),
            true,
            Some(Badge {
                text: preset,
                color: C_SCOPE,
            }),
        )
        .style(Style::default().bg(C_BG));

        let Ok(surface) = state.surface.lock() else {
            frame.render_widget(block, area);
            return;
        };
        let datasets: Vec<Dataset> = surface.datasets.iter().map(Dataset::from).collect();
        let chart = Chart::new(datasets)
            .block(block)
            .x_axis(Axis::default().bounds(surface.x_bounds))
            .y_axis(Axis::default().bounds(surface.y_bounds));
        frame.render_widget(chart, area);
    }

    fn min_height(&self) -> u16 {
        8
    }
}
