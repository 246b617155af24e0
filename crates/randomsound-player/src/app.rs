//! App — component-based terminal event loop.
//!
//! - `App` owns the components, `AppState`, and the `VisualizerBridge`.
//! - Terminal events and controller snapshots arrive as `AppMessage`s on one
//!   mpsc channel; timers drive spinner/marquee animation and visuals frames.
//! - Components return `Vec<Action>`; the App dispatches each Action, sending
//!   `Command`s to the controller.

use std::io;
use std::time::Duration;

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Frame, Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    components::{
        controls::Controls, filter_bar::FilterBar, header::Header, marquee::Marquee,
        track_meta::TrackMeta, visuals::Visuals,
    },
    core::{Command, ControllerEvent, ControllerSnapshot},
    theme::C_BG,
    visualizer::{Dimensions, VisualizerBridge},
};

enum AppMessage {
    Event(Event),
    Snapshot(ControllerSnapshot),
}

pub struct App {
    state: AppState,
    bridge: VisualizerBridge,
    controller_tx: mpsc::Sender<ControllerEvent>,
    frame_period: Duration,

    header: Header,
    controls: Controls,
    track_meta: TrackMeta,
    marquee: Marquee,
    filter_bar: FilterBar,
    visuals: Visuals,

    /// Where the visuals overlay was last drawn; sizes the visualizer.
    visuals_area: Rect,
    should_quit: bool,
}

impl App {
    pub fn new(
        bridge: VisualizerBridge,
        controller_tx: mpsc::Sender<ControllerEvent>,
        api_base: String,
        visuals_on: bool,
        fps: u32,
    ) -> Self {
        let mut state = AppState::new(bridge.surface(), api_base, visuals_on);
        state.preset = bridge.current_preset().map(str::to_string);
        Self {
            state,
            bridge,
            controller_tx,
            frame_period: Duration::from_millis(1000 / fps.clamp(1, 120) as u64),
            header: Header,
            controls: Controls::default(),
            track_meta: TrackMeta,
            marquee: Marquee::default(),
            filter_bar: FilterBar,
            visuals: Visuals,
            visuals_area: Rect::default(),
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        mut snapshot_rx: broadcast::Receiver<ControllerSnapshot>,
    ) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: controller snapshots → AppMessage ────────────────
        let snap_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match snapshot_rx.recv().await {
                    Ok(snap) => {
                        if snap_tx.send(AppMessage::Snapshot(snap)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("snapshot receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Spinner + marquee animation.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Redraws the overlay at the visualizer's frame rate.
        let mut visuals_tick = tokio::time::interval(self.frame_period);
        visuals_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg).await;
                }

                _ = ui_tick.tick() => {
                    let s = &self.state;
                    self.controls.tick(s);
                    self.marquee.tick(s);
                    needs_redraw = true;
                }

                _ = visuals_tick.tick() => {
                    needs_redraw = self.state.visuals_on && self.bridge.bound_tap().is_some();
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        self.bridge.detach();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        Ok(())
    }

    /// Returns `true` when the screen needs a redraw.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Snapshot(snap) => {
                self.on_snapshot(snap);
                true
            }
            AppMessage::Event(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                for action in self.handle_key(key) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Resize(w, h)) => {
                self.dispatch(Action::Resize(w, h)).await;
                true
            }
            AppMessage::Event(_) => false,
        }
    }

    fn on_snapshot(&mut self, snap: ControllerSnapshot) {
        self.state.snapshot = snap;
        self.sync_visuals();
    }

    /// Bind the bridge to the current tap while the overlay is shown.
    fn sync_visuals(&mut self) {
        let dims = self.visuals_dimensions();
        let snap = &self.state.snapshot;
        self.bridge
            .follow(snap.tap.as_ref(), snap.is_playing, self.state.visuals_on, dims);
    }

    fn visuals_dimensions(&self) -> Dimensions {
        let area = self.visuals_area;
        Dimensions {
            width: area.width.saturating_sub(2).max(1),
            height: area.height.saturating_sub(2).max(1),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('q')
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            return vec![Action::Quit];
        }

        let s = &self.state;
        let mut actions = Vec::new();
        actions.extend(self.controls.handle_key(key, s));
        actions.extend(self.filter_bar.handle_key(key, s));
        actions.extend(self.visuals.handle_key(key, s));
        actions
    }

    async fn dispatch(&mut self, action: Action) {
        debug!("action: {:?}", action);
        match action {
            Action::RequestRandom => self.send_cmd(Command::RequestRandom).await,
            Action::Stop => self.send_cmd(Command::Stop).await,
            Action::SetFilter(filter) => self.send_cmd(Command::SetFilter(filter)).await,
            Action::ToggleVisuals => {
                self.state.visuals_on = !self.state.visuals_on;
                info!("visuals: {}", if self.state.visuals_on { "on" } else { "off" });
                self.sync_visuals();
            }
            Action::Preset(step) => {
                self.bridge.select_preset(step);
                self.state.preset = self.bridge.current_preset().map(str::to_string);
            }
            Action::Resize(_, _) => {
                // the next draw recomputes the overlay area
                self.visuals_area = Rect::default();
            }
            Action::Quit => {
                self.should_quit = true;
                self.send_cmd(Command::Shutdown).await;
            }
            Action::Noop => {}
        }
    }

    async fn send_cmd(&self, cmd: Command) {
        if self
            .controller_tx
            .send(ControllerEvent::Command(cmd))
            .await
            .is_err()
        {
            warn!("controller is gone; command dropped");
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(self.controls.min_height()),
                Constraint::Min(self.track_meta.min_height()),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        self.header.draw(frame, rows[0], &self.state);
        self.controls.draw(frame, rows[1], &self.state);
        self.track_meta.draw(frame, rows[2], &self.state);
        self.marquee.draw(frame, rows[3], &self.state);
        self.filter_bar.draw(frame, rows[4], &self.state);

        if self.state.visuals_on {
            let overlay = rows[2];
            if overlay.height >= self.visuals.min_height() && overlay != self.visuals_area {
                self.visuals_area = overlay;
                self.bridge.resize(self.visuals_dimensions());
            }
            self.visuals.draw(frame, overlay, &self.state);
        }
    }
}
