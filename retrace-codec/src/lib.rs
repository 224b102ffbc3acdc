//! # retrace-codec — Descriptor-driven binary codec
//!
//! Values are laid out according to a [`Descriptor`] tree. Every container
//! carries an offset table, so any sub-value can be reached without parsing
//! its siblings and any encoded sub-value can be copied out and decoded on
//! its own.
//!
//! ## Architecture
//!
//! ```text
//!               encode()                       decode()
//! ┌────────┐  sizing + write   ┌──────────┐   materialize   ┌────────┐
//! │ Value  │ ────────────────▸ │  bytes   │ ──────────────▸ │ Value  │
//! └────────┘                   └────┬─────┘                 └────────┘
//!      ▲                            │ decode_lazy()
//!      │ Schema::to_value           ▼
//! ┌────────┐                   ┌──────────┐
//! │ record │                   │ View<'a> │  field / item / entries / copy
//! └────────┘                   └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`descriptor`] — Schema nodes and builders
//! - [`value`] — Dynamically-typed eager values
//! - [`encode`] — Sizing pass and single-write encoder
//! - [`view`] — Lazy borrowed views and eager decode
//! - [`schema`] — Typed records bound to a descriptor

pub mod descriptor;
pub mod encode;
pub mod error;
pub mod schema;
pub mod value;
pub mod view;

pub use descriptor::{Descriptor, Field, IntBits, Variant};
pub use encode::{byte_length, copy, encode, encode_vector_from_items, utf8_byte_length};
pub use error::{DecodeError, EncodeError};
pub use schema::{decode_record, encode_record, Schema};
pub use value::{fields_exact, Value};
pub use view::{decode, decode_lazy, Entries, Items, View};
