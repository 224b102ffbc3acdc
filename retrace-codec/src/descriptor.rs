//! Schema nodes describing how a value is laid out in bytes.
//!
//! A [`Descriptor`] is a closed tree: primitives at the leaves, containers
//! (`Array`, `Vector`, `Dict`, `Struct`, `Union`) in between. Any node can be
//! wrapped in [`Descriptor::Nullable`] to gain a one-byte presence prefix.
//!
//! Field count, field order and union tags are part of the wire format.
//! Reordering fields changes the byte layout.

/// Integer width supported by the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntBits {
    B8,
    B16,
    B32,
}

impl IntBits {
    /// Encoded width in bytes.
    pub fn bytes(self) -> usize {
        match self {
            IntBits::B8 => 1,
            IntBits::B16 => 2,
            IntBits::B32 => 4,
        }
    }

    /// Width in bits.
    pub fn bits(self) -> u8 {
        (self.bytes() * 8) as u8
    }

    /// Inclusive value range representable at this width.
    pub fn range(self, signed: bool) -> (i64, i64) {
        match (self, signed) {
            (IntBits::B8, true) => (i8::MIN as i64, i8::MAX as i64),
            (IntBits::B8, false) => (0, u8::MAX as i64),
            (IntBits::B16, true) => (i16::MIN as i64, i16::MAX as i64),
            (IntBits::B16, false) => (0, u16::MAX as i64),
            (IntBits::B32, true) => (i32::MIN as i64, i32::MAX as i64),
            (IntBits::B32, false) => (0, u32::MAX as i64),
        }
    }
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub descriptor: Descriptor,
}

impl Field {
    pub fn new(name: impl Into<String>, descriptor: Descriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }
}

/// One arm of a union: the tag byte written on the wire plus the struct
/// payload that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub tag: u8,
    pub name: String,
    pub fields: Vec<Field>,
}

impl Variant {
    pub fn new<N, I>(tag: u8, name: N, fields: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (&'static str, Descriptor)>,
    {
        Self {
            tag,
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(name, descriptor)| Field::new(name, descriptor))
                .collect(),
        }
    }

    /// Variant without payload fields.
    pub fn unit(tag: u8, name: impl Into<String>) -> Self {
        Self {
            tag,
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Position of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Serializable type description.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    /// Little-endian integer, 8/16/32 bits.
    Integer { signed: bool, bits: IntBits },
    /// Fixed-width character array, zero padded.
    Char { bytes: usize },
    /// Length-prefixed UTF-8.
    String,
    /// One byte, 0 or 1.
    Bool,
    /// Length-prefixed raw bytes.
    Buffer,
    /// Fixed number of items behind an offset table.
    Array { size: usize, items: Box<Descriptor> },
    /// Counted items behind an offset table.
    Vector { items: Box<Descriptor> },
    /// Counted `(key, value offset)` pairs followed by value payloads.
    Dict {
        key: Box<Descriptor>,
        value: Box<Descriptor>,
    },
    /// Offset table followed by field payloads in declaration order.
    Struct { fields: Vec<Field> },
    /// One tag byte followed by the selected variant's struct payload.
    Union {
        tag_field: String,
        variants: Vec<Variant>,
    },
    /// Presence byte, then the inner value when present.
    Nullable(Box<Descriptor>),
}

impl Descriptor {
    pub fn u8() -> Self {
        Descriptor::Integer {
            signed: false,
            bits: IntBits::B8,
        }
    }

    pub fn i8() -> Self {
        Descriptor::Integer {
            signed: true,
            bits: IntBits::B8,
        }
    }

    pub fn u16() -> Self {
        Descriptor::Integer {
            signed: false,
            bits: IntBits::B16,
        }
    }

    pub fn i16() -> Self {
        Descriptor::Integer {
            signed: true,
            bits: IntBits::B16,
        }
    }

    pub fn u32() -> Self {
        Descriptor::Integer {
            signed: false,
            bits: IntBits::B32,
        }
    }

    pub fn i32() -> Self {
        Descriptor::Integer {
            signed: true,
            bits: IntBits::B32,
        }
    }

    pub fn char(bytes: usize) -> Self {
        Descriptor::Char { bytes }
    }

    pub fn string() -> Self {
        Descriptor::String
    }

    pub fn bool() -> Self {
        Descriptor::Bool
    }

    pub fn buffer() -> Self {
        Descriptor::Buffer
    }

    pub fn array(size: usize, items: Descriptor) -> Self {
        Descriptor::Array {
            size,
            items: Box::new(items),
        }
    }

    pub fn vector(items: Descriptor) -> Self {
        Descriptor::Vector {
            items: Box::new(items),
        }
    }

    pub fn dict(key: Descriptor, value: Descriptor) -> Self {
        Descriptor::Dict {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn structure<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Descriptor)>,
    {
        Descriptor::Struct {
            fields: fields
                .into_iter()
                .map(|(name, descriptor)| Field::new(name, descriptor))
                .collect(),
        }
    }

    pub fn union(tag_field: impl Into<String>, variants: Vec<Variant>) -> Self {
        Descriptor::Union {
            tag_field: tag_field.into(),
            variants,
        }
    }

    /// Wrap in a presence byte. Wrapping twice is a no-op.
    pub fn nullable(self) -> Self {
        match self {
            Descriptor::Nullable(_) => self,
            other => Descriptor::Nullable(Box::new(other)),
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Descriptor::Nullable(_))
    }

    /// Encoded size for fixed-width primitives.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Descriptor::Integer { bits, .. } => Some(bits.bytes()),
            Descriptor::Char { bytes } => Some(*bytes),
            Descriptor::Bool => Some(1),
            _ => None,
        }
    }

    /// Short name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Descriptor::Integer { .. } => "integer",
            Descriptor::Char { .. } => "char",
            Descriptor::String => "string",
            Descriptor::Bool => "bool",
            Descriptor::Buffer => "buffer",
            Descriptor::Array { .. } => "array",
            Descriptor::Vector { .. } => "vector",
            Descriptor::Dict { .. } => "dict",
            Descriptor::Struct { .. } => "struct",
            Descriptor::Union { .. } => "union",
            Descriptor::Nullable(_) => "nullable",
        }
    }

    /// Look up a union variant by its tag byte.
    pub fn variant(&self, tag: u8) -> Option<&Variant> {
        match self {
            Descriptor::Union { variants, .. } => variants.iter().find(|v| v.tag == tag),
            Descriptor::Nullable(inner) => inner.variant(tag),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_ranges() {
        assert_eq!(IntBits::B8.range(false), (0, 255));
        assert_eq!(IntBits::B16.range(true), (-32768, 32767));
        assert_eq!(IntBits::B32.range(false).1, u32::MAX as i64);
        assert_eq!(IntBits::B32.bits(), 32);
    }

    #[test]
    fn test_nullable_is_idempotent() {
        let d = Descriptor::string().nullable().nullable();
        match d {
            Descriptor::Nullable(inner) => assert_eq!(*inner, Descriptor::String),
            other => panic!("expected nullable, got {other:?}"),
        }
    }

    #[test]
    fn test_variant_lookup() {
        let d = Descriptor::union(
            "type",
            vec![
                Variant::new(0, "a", [("x", Descriptor::u8())]),
                Variant::unit(7, "b"),
            ],
        );
        assert_eq!(d.variant(7).map(|v| v.name.as_str()), Some("b"));
        assert!(d.variant(1).is_none());
        assert_eq!(d.variant(0).and_then(|v| v.field_index("x")), Some(0));
    }

    #[test]
    fn test_fixed_size() {
        assert_eq!(Descriptor::i16().fixed_size(), Some(2));
        assert_eq!(Descriptor::char(6).fixed_size(), Some(6));
        assert_eq!(Descriptor::string().fixed_size(), None);
    }
}
