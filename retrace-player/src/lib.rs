//! # retrace-player — Deterministic replay of retrace logs
//!
//! Reconstructs the recorded state at any time or event index from the
//! closest preceding snapshot plus a bounded forward replay, and plays the
//! log forward frame by frame at an adjustable speed.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  one scan   ┌──────────┐
//! │ EventLog │ ──────────▸ │ LogIndex │  times + snapshot offsets
//! └────┬─────┘             └────┬─────┘
//!      │ decode on demand       │ binary search
//!      ▼                        ▼
//! ┌──────────────────────────────────────┐      tick(delta)
//! │ Player                               │ ◂──── run(): tokio interval
//! │  snapshot · pending samples · cursor │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`player`] — Seeks, play/pause and the frame driver
//! - [`index`] — One-pass time and snapshot index
//! - [`state`] — Playback and control-frame states
//! - [`config`] — Speed and frame interval

pub mod config;
pub mod error;
pub mod index;
pub mod player;
pub mod state;

pub use config::{clamp_speed, PlayerConfig, MAX_SPEED, MIN_SPEED};
pub use error::PlayerError;
pub use index::{LogIndex, SnapshotEntry};
pub use player::Player;
pub use state::{ControlFrame, PlaybackState, PlayerStatus};
