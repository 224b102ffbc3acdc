//! Playback state machine values.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    #[default]
    Paused,
    Playing,
}

/// What last moved the playhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlFrame {
    #[default]
    Idle,
    /// Target in ms from the start of the log.
    SeekToTime(u32),
    SeekToEvent(usize),
}

/// Point-in-time view of a player, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub elapsed: u32,
    pub duration: u32,
    pub playback_state: PlaybackState,
    pub control_frame: ControlFrame,
    pub active_index: usize,
    pub speed: f64,
}
