//! Lazy, borrowed views over encoded buffers.
//!
//! A [`View`] is a `(descriptor, buffer, offset)` triple. Navigating into a
//! struct field, vector item or dict value only reads the relevant offset
//! table entry and produces another view; nothing is decoded until a leaf
//! accessor (`as_i64`, `as_str`, ...) or [`View::materialize`] is called.
//!
//! Views borrow the buffer for `'a`. The borrow checker therefore enforces
//! that no view survives a mutation or drop of its backing storage; values
//! that must outlive the buffer are produced with [`View::materialize`] or
//! [`View::copy`].

use byteorder::{ByteOrder, LittleEndian};

use crate::descriptor::{Descriptor, Field, IntBits, Variant};
use crate::error::DecodeError;
use crate::value::Value;

const OFFSET: usize = 4;

/// Decode `buffer` eagerly into an owned [`Value`].
pub fn decode(descriptor: &Descriptor, buffer: &[u8]) -> Result<Value, DecodeError> {
    View::new(descriptor, buffer).materialize()
}

/// Wrap `buffer` in a lazy view. No bytes are read until accessed.
pub fn decode_lazy<'a>(descriptor: &'a Descriptor, buffer: &'a [u8]) -> View<'a> {
    View::new(descriptor, buffer)
}

#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    descriptor: &'a Descriptor,
    buf: &'a [u8],
    offset: usize,
}

impl<'a> View<'a> {
    pub fn new(descriptor: &'a Descriptor, buf: &'a [u8]) -> Self {
        Self::at(descriptor, buf, 0)
    }

    fn at(descriptor: &'a Descriptor, buf: &'a [u8], offset: usize) -> Self {
        Self {
            descriptor,
            buf,
            offset,
        }
    }

    pub fn descriptor(&self) -> &'a Descriptor {
        self.descriptor
    }

    /// Absolute offset of this value inside the backing buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The whole backing buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    // ───────────────────────────────────────────────────────────────
    // Nullability
    // ───────────────────────────────────────────────────────────────

    /// `true` if this is a nullable value whose presence byte is 0.
    pub fn is_null(&self) -> Result<bool, DecodeError> {
        Ok(self.present()?.is_none())
    }

    /// Step through a presence byte. Non-nullable views return themselves.
    pub fn present(self) -> Result<Option<View<'a>>, DecodeError> {
        match self.descriptor {
            Descriptor::Nullable(inner) => match read_u8(self.buf, self.offset)? {
                0 => Ok(None),
                1 => Ok(Some(View::at(inner, self.buf, self.offset + 1))),
                byte => Err(DecodeError::InvalidPresence {
                    byte,
                    offset: self.offset,
                }),
            },
            _ => Ok(Some(self)),
        }
    }

    fn resolve(self) -> Result<View<'a>, DecodeError> {
        self.present()?.ok_or(DecodeError::UnexpectedNull)
    }

    // ───────────────────────────────────────────────────────────────
    // Leaf accessors
    // ───────────────────────────────────────────────────────────────

    pub fn as_i64(&self) -> Result<i64, DecodeError> {
        let v = self.resolve()?;
        match v.descriptor {
            Descriptor::Integer { signed, bits } => read_int(v.buf, v.offset, *signed, *bits),
            d => Err(kind_mismatch("integer", d)),
        }
    }

    pub fn as_u32(&self) -> Result<u32, DecodeError> {
        let value = self.as_i64()?;
        u32::try_from(value).map_err(|_| DecodeError::IntegerOutOfRange {
            value,
            target: "u32",
        })
    }

    pub fn as_u8(&self) -> Result<u8, DecodeError> {
        let value = self.as_i64()?;
        u8::try_from(value).map_err(|_| DecodeError::IntegerOutOfRange {
            value,
            target: "u8",
        })
    }

    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        let v = self.resolve()?;
        match v.descriptor {
            Descriptor::Bool => read_bool(v.buf, v.offset),
            d => Err(kind_mismatch("bool", d)),
        }
    }

    /// Borrow string contents straight out of the buffer.
    pub fn as_str(&self) -> Result<&'a str, DecodeError> {
        let v = self.resolve()?;
        match v.descriptor {
            Descriptor::String => {
                let bytes = read_prefixed(v.buf, v.offset)?;
                utf8(bytes, v.offset + OFFSET)
            }
            Descriptor::Char { bytes } => {
                let raw = slice(v.buf, v.offset, *bytes)?;
                let end = raw.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
                utf8(&raw[..end], v.offset)
            }
            d => Err(kind_mismatch("string", d)),
        }
    }

    /// Borrow buffer contents straight out of the backing buffer.
    pub fn as_bytes(&self) -> Result<&'a [u8], DecodeError> {
        let v = self.resolve()?;
        match v.descriptor {
            Descriptor::Buffer => read_prefixed(v.buf, v.offset),
            d => Err(kind_mismatch("buffer", d)),
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Containers
    // ───────────────────────────────────────────────────────────────

    /// Item count for arrays, vectors and dicts; field count for structs
    /// and unions.
    pub fn len(&self) -> Result<usize, DecodeError> {
        let v = self.resolve()?;
        match v.descriptor {
            Descriptor::Array { size, .. } => Ok(*size),
            Descriptor::Vector { .. } | Descriptor::Dict { .. } => {
                Ok(read_u32(v.buf, v.offset)? as usize)
            }
            Descriptor::Struct { fields } => Ok(fields.len()),
            Descriptor::Union { .. } => Ok(v.variant()?.fields.len()),
            d => Err(kind_mismatch("container", d)),
        }
    }

    pub fn is_empty(&self) -> Result<bool, DecodeError> {
        Ok(self.len()? == 0)
    }

    /// O(1) access to an array or vector item.
    pub fn item(&self, index: usize) -> Result<View<'a>, DecodeError> {
        let v = self.resolve()?;
        let (items, len, table) = match v.descriptor {
            Descriptor::Array { size, items } => (items, *size, v.offset),
            Descriptor::Vector { items } => {
                (items, read_u32(v.buf, v.offset)? as usize, v.offset + OFFSET)
            }
            d => return Err(kind_mismatch("list", d)),
        };
        if index >= len {
            return Err(DecodeError::IndexOutOfRange { index, len });
        }
        let rel = read_u32(v.buf, table + index * OFFSET)? as usize;
        Ok(View::at(items, v.buf, v.offset + rel))
    }

    /// Iterate array or vector items lazily.
    pub fn items(&self) -> Result<Items<'a>, DecodeError> {
        let list = self.resolve()?;
        let len = list.len()?;
        Ok(Items {
            list,
            index: 0,
            len,
        })
    }

    /// Union tag byte.
    pub fn tag(&self) -> Result<u8, DecodeError> {
        let v = self.resolve()?;
        match v.descriptor {
            Descriptor::Union { .. } => read_u8(v.buf, v.offset),
            d => Err(kind_mismatch("union", d)),
        }
    }

    /// The union variant selected by the tag byte.
    pub fn variant(&self) -> Result<&'a Variant, DecodeError> {
        let v = self.resolve()?;
        match v.descriptor {
            Descriptor::Union { variants, .. } => {
                let tag = read_u8(v.buf, v.offset)?;
                variants
                    .iter()
                    .find(|var| var.tag == tag)
                    .ok_or(DecodeError::UnknownTag {
                        tag,
                        offset: v.offset,
                    })
            }
            d => Err(kind_mismatch("union", d)),
        }
    }

    /// Field `index` of a struct, or of a union's selected variant. Only the
    /// field's offset table slot is read.
    pub fn field(&self, index: usize) -> Result<View<'a>, DecodeError> {
        let (fields, start) = self.struct_parts()?;
        let field = fields.get(index).ok_or(DecodeError::IndexOutOfRange {
            index,
            len: fields.len(),
        })?;
        let rel = read_u32(self.buf, start + index * OFFSET)? as usize;
        Ok(View::at(&field.descriptor, self.buf, start + rel))
    }

    /// Field lookup by name.
    pub fn field_named(&self, name: &str) -> Result<View<'a>, DecodeError> {
        let (fields, _) = self.struct_parts()?;
        let index = fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| DecodeError::MissingField(name.to_owned()))?;
        self.field(index)
    }

    /// Field list and absolute start of the struct payload.
    fn struct_parts(&self) -> Result<(&'a [Field], usize), DecodeError> {
        let v = self.resolve()?;
        match v.descriptor {
            Descriptor::Struct { fields } => Ok((fields, v.offset)),
            Descriptor::Union { .. } => Ok((&v.variant()?.fields, v.offset + 1)),
            d => Err(kind_mismatch("struct", d)),
        }
    }

    /// Iterate dict entries as `(key, value)` view pairs.
    pub fn entries(&self) -> Result<Entries<'a>, DecodeError> {
        let dict = self.resolve()?;
        match dict.descriptor {
            Descriptor::Dict { key, value } => Ok(Entries {
                key,
                value,
                buf: dict.buf,
                start: dict.offset,
                cursor: dict.offset + OFFSET,
                remaining: read_u32(dict.buf, dict.offset)? as usize,
            }),
            d => Err(kind_mismatch("dict", d)),
        }
    }

    /// Linear lookup of a string-keyed dict entry.
    pub fn get(&self, key: &str) -> Result<Option<View<'a>>, DecodeError> {
        for entry in self.entries()? {
            let (k, v) = entry?;
            if k.as_str()? == key {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    // ───────────────────────────────────────────────────────────────
    // Extent, copy, materialize
    // ───────────────────────────────────────────────────────────────

    /// Number of bytes this value occupies in the buffer.
    pub fn extent(&self) -> Result<usize, DecodeError> {
        if let Descriptor::Nullable(_) = self.descriptor {
            return match self.present()? {
                None => Ok(1),
                Some(inner) => Ok(1 + inner.extent()?),
            };
        }
        match self.descriptor {
            Descriptor::Integer { bits, .. } => {
                slice(self.buf, self.offset, bits.bytes())?;
                Ok(bits.bytes())
            }
            Descriptor::Char { bytes } => {
                slice(self.buf, self.offset, *bytes)?;
                Ok(*bytes)
            }
            Descriptor::Bool => {
                read_u8(self.buf, self.offset)?;
                Ok(1)
            }
            Descriptor::String | Descriptor::Buffer => {
                Ok(OFFSET + read_prefixed(self.buf, self.offset)?.len())
            }
            Descriptor::Array { size, .. } => match size {
                0 => Ok(0),
                n => self.tail_extent(n - 1),
            },
            Descriptor::Vector { .. } => match read_u32(self.buf, self.offset)? as usize {
                0 => Ok(OFFSET),
                n => self.tail_extent(n - 1),
            },
            Descriptor::Dict { .. } => {
                let mut end = OFFSET;
                for entry in self.entries()? {
                    let (_, value) = entry?;
                    end = value.offset - self.offset + value.extent()?;
                }
                // An empty dict is just its count; otherwise the last value
                // ends the payload.
                Ok(end)
            }
            Descriptor::Struct { fields } => match fields.len() {
                0 => Ok(0),
                n => self.tail_extent(n - 1),
            },
            Descriptor::Union { .. } => {
                let fields = &self.variant()?.fields;
                match fields.len() {
                    0 => Ok(1),
                    n => {
                        let last = self.field(n - 1)?;
                        Ok(last.offset - self.offset + last.extent()?)
                    }
                }
            }
            Descriptor::Nullable(_) => unreachable!("handled above"),
        }
    }

    /// Extent of a container whose last element is at `last`.
    fn tail_extent(&self, last: usize) -> Result<usize, DecodeError> {
        let view = match self.descriptor {
            Descriptor::Struct { .. } => self.field(last)?,
            _ => self.item(last)?,
        };
        Ok(view.offset - self.offset + view.extent()?)
    }

    /// Copy exactly this value's bytes into an independent buffer. All
    /// offsets are container-relative, so the copy decodes on its own under
    /// the same descriptor.
    pub fn copy(&self) -> Result<Vec<u8>, DecodeError> {
        let len = self.extent()?;
        Ok(slice(self.buf, self.offset, len)?.to_vec())
    }

    /// Decode the whole value eagerly.
    pub fn materialize(&self) -> Result<Value, DecodeError> {
        if let Descriptor::Nullable(_) = self.descriptor {
            return match self.present()? {
                None => Ok(Value::Null),
                Some(inner) => inner.materialize(),
            };
        }
        match self.descriptor {
            Descriptor::Integer { .. } => Ok(Value::Int(self.as_i64()?)),
            Descriptor::Char { .. } | Descriptor::String => Ok(Value::Str(self.as_str()?.to_owned())),
            Descriptor::Bool => Ok(Value::Bool(self.as_bool()?)),
            Descriptor::Buffer => Ok(Value::Bytes(self.as_bytes()?.to_vec())),
            Descriptor::Array { .. } | Descriptor::Vector { .. } => {
                let items = self
                    .items()?
                    .map(|item| item.and_then(|v| v.materialize()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(items))
            }
            Descriptor::Dict { .. } => {
                let entries = self
                    .entries()?
                    .map(|entry| {
                        let (k, v) = entry?;
                        Ok((k.materialize()?, v.materialize()?))
                    })
                    .collect::<Result<Vec<_>, DecodeError>>()?;
                Ok(Value::Map(entries))
            }
            Descriptor::Struct { fields } => Ok(Value::Struct(self.materialize_fields(fields.len())?)),
            Descriptor::Union { .. } => {
                let variant = self.variant()?;
                Ok(Value::Union {
                    tag: variant.tag,
                    fields: self.materialize_fields(variant.fields.len())?,
                })
            }
            Descriptor::Nullable(_) => unreachable!("handled above"),
        }
    }

    fn materialize_fields(&self, count: usize) -> Result<Vec<Value>, DecodeError> {
        (0..count).map(|i| self.field(i)?.materialize()).collect()
    }
}

/// Lazy iterator over array/vector items.
pub struct Items<'a> {
    list: View<'a>,
    index: usize,
    len: usize,
}

impl<'a> Iterator for Items<'a> {
    type Item = Result<View<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.len {
            return None;
        }
        let item = self.list.item(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len - self.index;
        (left, Some(left))
    }
}

/// Lazy iterator over dict entries. Keys are stored inline, so walking is
/// sequential; values are reached through their offsets.
pub struct Entries<'a> {
    key: &'a Descriptor,
    value: &'a Descriptor,
    buf: &'a [u8],
    start: usize,
    cursor: usize,
    remaining: usize,
}

impl<'a> Entries<'a> {
    fn step(&mut self) -> Result<(View<'a>, View<'a>), DecodeError> {
        let key = View::at(self.key, self.buf, self.cursor);
        let key_len = key.extent()?;
        let slot = self.cursor + key_len;
        let rel = read_u32(self.buf, slot)? as usize;
        self.cursor = slot + OFFSET;
        Ok((key, View::at(self.value, self.buf, self.start + rel)))
    }
}

impl<'a> Iterator for Entries<'a> {
    type Item = Result<(View<'a>, View<'a>), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let entry = self.step();
        if entry.is_err() {
            // Cursor position is unknown past a malformed key.
            self.remaining = 0;
        }
        Some(entry)
    }
}

// ───────────────────────────────────────────────────────────────────
// Bounds-checked readers
// ───────────────────────────────────────────────────────────────────

fn slice(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or(DecodeError::Truncated {
            offset,
            needed: len,
            len: buf.len(),
        })
}

fn read_u8(buf: &[u8], offset: usize) -> Result<u8, DecodeError> {
    Ok(slice(buf, offset, 1)?[0])
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, DecodeError> {
    Ok(LittleEndian::read_u32(slice(buf, offset, OFFSET)?))
}

fn read_bool(buf: &[u8], offset: usize) -> Result<bool, DecodeError> {
    match read_u8(buf, offset)? {
        0 => Ok(false),
        1 => Ok(true),
        byte => Err(DecodeError::InvalidBool { byte, offset }),
    }
}

fn read_int(buf: &[u8], offset: usize, signed: bool, bits: IntBits) -> Result<i64, DecodeError> {
    let raw = slice(buf, offset, bits.bytes())?;
    Ok(match (bits, signed) {
        (IntBits::B8, false) => raw[0] as i64,
        (IntBits::B8, true) => raw[0] as i8 as i64,
        (IntBits::B16, false) => LittleEndian::read_u16(raw) as i64,
        (IntBits::B16, true) => LittleEndian::read_i16(raw) as i64,
        (IntBits::B32, false) => LittleEndian::read_u32(raw) as i64,
        (IntBits::B32, true) => LittleEndian::read_i32(raw) as i64,
    })
}

fn read_prefixed(buf: &[u8], offset: usize) -> Result<&[u8], DecodeError> {
    let len = read_u32(buf, offset)? as usize;
    slice(buf, offset + OFFSET, len)
}

fn utf8(bytes: &[u8], offset: usize) -> Result<&str, DecodeError> {
    std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset })
}

fn kind_mismatch(expected: &'static str, found: &Descriptor) -> DecodeError {
    DecodeError::KindMismatch {
        expected,
        found: found.kind(),
    }
}
