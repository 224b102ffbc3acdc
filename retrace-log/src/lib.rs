//! # retrace-log — Event buffering, recording and archives for retrace
//!
//! Holds encoded source events under a byte budget, folds evicted history
//! into a leading snapshot, and exports self-contained logs that always open
//! with a snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  Observation   ┌─────────────┐  SourceEvent  ┌──────────────┐
//! │  Observer   │ ─────────────▸ │  Recorder   │ ────────────▸ │ EventBuffer  │
//! │  (host)     │                │ (timing,    │               │ (budget,     │
//! └─────────────┘                │  snapshots) │               │  eviction)   │
//!                                └─────────────┘               └──┬────────┬──┘
//!                                                        slice()  │        │ tail()
//!                                                                 ▼        ▼
//!                                ┌─────────────┐          ┌──────────┐  ┌──────┐
//!                                │  Archive    │ ◂─────── │ EventLog │  │ Tail │
//!                                │  (file)     │          └──────────┘  └──────┘
//!                                └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`buffer`] — `EventBuffer` with eviction and `slice`
//! - [`event_log`] — Exported `vector(SourceEvent)` log with O(1) access
//! - [`tail`] — Cancellable live subscription
//! - [`recorder`] — Recording sessions and the `Observer` capability
//! - [`archive`] — Framed, checksummed archive files with recovery
//! - [`config`] — Buffer and recorder configuration

pub mod archive;
pub mod buffer;
pub mod config;
pub mod error;
pub mod event_log;
pub mod recorder;
pub mod tail;

pub use archive::{write_recording, Archive, ArchiveHeader, ArchiveWriter};
pub use buffer::{BufferStats, EventBuffer};
pub use config::{BufferConfig, RecorderConfig};
pub use error::{ArchiveError, LogError};
pub use event_log::{log_descriptor, EventLog};
pub use recorder::{Observation, Observer, Recorder, Recording};
pub use tail::Tail;
