//! Typed records on top of descriptors.
//!
//! A record type implements [`Schema`] by naming its descriptor and
//! converting to and from the positional [`Value`] form. Descriptors are
//! built once and cached for the life of the process:
//!
//! ```ignore
//! impl Schema for Point {
//!     fn descriptor() -> &'static Descriptor {
//!         static D: OnceLock<Descriptor> = OnceLock::new();
//!         D.get_or_init(|| Descriptor::structure([("x", Descriptor::i32()), ("y", Descriptor::i32())]))
//!     }
//!     ...
//! }
//! ```

use crate::descriptor::Descriptor;
use crate::encode::encode;
use crate::error::{DecodeError, EncodeError};
use crate::value::Value;
use crate::view::{decode, View};

pub trait Schema: Sized {
    fn descriptor() -> &'static Descriptor;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, DecodeError>;

    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encode(Self::descriptor(), &self.to_value())
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::from_value(decode(Self::descriptor(), bytes)?)
    }

    /// Materialize a lazily navigated sub-value.
    fn from_view(view: View<'_>) -> Result<Self, DecodeError> {
        Self::from_value(view.materialize()?)
    }
}

/// Encode a typed record under its own descriptor.
pub fn encode_record<T: Schema>(record: &T) -> Result<Vec<u8>, EncodeError> {
    record.encode()
}

/// Decode a typed record from a standalone buffer.
pub fn decode_record<T: Schema>(bytes: &[u8]) -> Result<T, DecodeError> {
    T::decode(bytes)
}
