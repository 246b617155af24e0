//! Action enum — all user-initiated intents and internal events.

use randomsound_proto::filter::FilterSelection;

use crate::visualizer::PresetStep;

/// Identifies a panel of the player screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Header,
    Controls,
    TrackMeta,
    Marquee,
    FilterBar,
    Visuals,
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    RequestRandom,
    Stop,
    SetFilter(FilterSelection),

    // ── Visuals ──────────────────────────────────────────────────────────────
    ToggleVisuals,
    Preset(PresetStep),

    // ── System ───────────────────────────────────────────────────────────────
    Resize(u16, u16),
    Quit,
    Noop,
}
