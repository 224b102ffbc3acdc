//! # retrace-core — Recording model for retrace
//!
//! The virtual document, its reversible patch algebra, interaction and
//! telemetry payloads, source events and the snapshot fold that replays
//! them. Every type here has a wire schema in [`wire`].
//!
//! ## Architecture
//!
//! ```text
//!   observers ──▸ Patch / Interaction / Network / Console / Performance
//!                                 │
//!                                 ▼
//!                     SourceEvent { time, data }
//!                                 │ apply_event_to_snapshot
//!                                 ▼
//!   Snapshot { dom: VTree, interaction: InteractionSnapshot }
//!                 │
//!                 └─ apply_patch(tree, patch, revert)
//! ```
//!
//! ## Modules
//!
//! - [`id`] — `SyntheticId` and the host-handle registry
//! - [`vdom`] — `VNode`/`VTree` and tree composition
//! - [`patch`] — Reversible patches and `apply_patch`
//! - [`interaction`] — Pointer/keyboard/scroll events and samples
//! - [`telemetry`] — Network, console and performance payloads
//! - [`snapshot`] — State snapshots and the event fold
//! - [`event`] — `SourceEvent`
//! - [`wire`] — Codec schemas for all of the above

pub mod error;
pub mod event;
pub mod id;
pub mod interaction;
pub mod patch;
pub mod snapshot;
pub mod telemetry;
pub mod vdom;
pub mod wire;

pub use error::{ModelError, TreeIntegrityError};
pub use event::{EventData, EventKind, SourceEvent};
pub use id::{IdRegistry, SyntheticId};
pub use interaction::{Interaction, KeyState, Point, PointerState, Sample};
pub use patch::{apply_patch, NodeSplice, Patch};
pub use snapshot::{apply_event_to_snapshot, InteractionSnapshot, Snapshot};
pub use telemetry::{ConsoleLevel, ConsoleMessage, NetworkMessage, PerformanceEntry};
pub use vdom::{create_or_update_vtree, ElementNode, ElementProperties, VNode, VNodeKind, VTree};
pub use wire::{peek_kind, peek_time, FORMAT_VERSION};

pub use retrace_codec::Schema;
