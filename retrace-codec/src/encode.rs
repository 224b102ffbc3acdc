//! Sizing pass and single-write encoder.
//!
//! Encoding is two-phase:
//!
//! ```text
//! value ──byte_length()──▸ exact size ──alloc──▸ [0u8; size] ──Writer──▸ bytes
//! ```
//!
//! Every descriptor/value mismatch is caught by the sizing pass, so a failed
//! encode never leaves a half-written buffer behind.
//!
//! Layout summary (all integers little-endian, all offsets u32 relative to
//! the start of the enclosing container):
//!
//! ```text
//! nullable  [presence u8][inner?]
//! string    [byte count u32][utf-8]
//! buffer    [len u32][bytes]
//! array     [offset u32 × size][items]
//! vector    [count u32][offset u32 × count][items]
//! dict      [count u32]([key][value offset u32]) × count [values]
//! struct    [offset u32 × fields][payloads]
//! union     [tag u8][struct payload]
//! ```

use byteorder::{ByteOrder, LittleEndian};

use crate::descriptor::{Descriptor, Field, IntBits};
use crate::error::EncodeError;
use crate::value::Value;

const OFFSET: usize = 4;

/// Byte length of a string's UTF-8 encoding, computed per code point.
pub fn utf8_byte_length(s: &str) -> usize {
    s.chars()
        .map(|c| match c as u32 {
            cp if cp < 0x80 => 1,
            cp if cp < 0x800 => 2,
            cp if cp < 0x10000 => 3,
            _ => 4,
        })
        .sum()
}

/// Exact serialized size of `value` under `descriptor`.
pub fn byte_length(descriptor: &Descriptor, value: &Value) -> Result<usize, EncodeError> {
    let len = size_of(descriptor, value)?;
    if len > u32::MAX as usize {
        return Err(EncodeError::TooLarge);
    }
    Ok(len)
}

/// Encode `value` into a freshly allocated buffer of exactly
/// [`byte_length`] bytes.
pub fn encode(descriptor: &Descriptor, value: &Value) -> Result<Vec<u8>, EncodeError> {
    let len = byte_length(descriptor, value)?;
    let mut writer = Writer {
        buf: vec![0u8; len],
        pos: 0,
    };
    writer.write(descriptor, value)?;
    debug_assert_eq!(writer.pos, len, "sizing pass and writer disagree");
    Ok(writer.buf)
}

/// Assemble a vector from items that are already encoded under the vector's
/// item descriptor. Items are copied verbatim; encoded values are
/// relocatable, so no re-encoding is needed.
pub fn encode_vector_from_items<B: AsRef<[u8]>>(items: &[B]) -> Result<Vec<u8>, EncodeError> {
    let header = OFFSET + items.len() * OFFSET;
    let body: usize = items.iter().map(|i| i.as_ref().len()).sum();
    let len = header + body;
    if len > u32::MAX as usize {
        return Err(EncodeError::TooLarge);
    }

    let mut buf = vec![0u8; len];
    LittleEndian::write_u32(&mut buf[0..OFFSET], items.len() as u32);
    let mut pos = header;
    for (i, item) in items.iter().enumerate() {
        let bytes = item.as_ref();
        let slot = OFFSET + i * OFFSET;
        LittleEndian::write_u32(&mut buf[slot..slot + OFFSET], pos as u32);
        buf[pos..pos + bytes.len()].copy_from_slice(bytes);
        pos += bytes.len();
    }
    Ok(buf)
}

/// Produce an independent copy of an encoded buffer.
///
/// Values decoded lazily borrow their buffer; anything that has to outlive
/// the source (for example across an eviction) must be copied first.
pub fn copy(buffer: &[u8]) -> Vec<u8> {
    buffer.to_vec()
}

// ───────────────────────────────────────────────────────────────────
// Sizing
// ───────────────────────────────────────────────────────────────────

fn size_of(descriptor: &Descriptor, value: &Value) -> Result<usize, EncodeError> {
    if let Descriptor::Nullable(inner) = descriptor {
        return match value {
            Value::Null => Ok(1),
            v => Ok(1 + size_of(inner, v)?),
        };
    }
    if value.is_null() {
        return Err(EncodeError::UnexpectedNull(descriptor.kind()));
    }

    match (descriptor, value) {
        (Descriptor::Integer { signed, bits }, Value::Int(v)) => {
            check_int(*v, *signed, *bits)?;
            Ok(bits.bytes())
        }
        (Descriptor::Char { bytes }, Value::Str(s)) => {
            let len = utf8_byte_length(s);
            if len > *bytes {
                return Err(EncodeError::CharOverflow {
                    len,
                    capacity: *bytes,
                });
            }
            Ok(*bytes)
        }
        (Descriptor::String, Value::Str(s)) => Ok(OFFSET + utf8_byte_length(s)),
        (Descriptor::Bool, Value::Bool(_)) => Ok(1),
        (Descriptor::Buffer, Value::Bytes(b)) => Ok(OFFSET + b.len()),
        (Descriptor::Array { size, items }, Value::List(list)) => {
            if list.len() != *size {
                return Err(EncodeError::ArrayLength {
                    expected: *size,
                    got: list.len(),
                });
            }
            let body = sum_sizes(items, list)?;
            Ok(size * OFFSET + body)
        }
        (Descriptor::Vector { items }, Value::List(list)) => {
            let body = sum_sizes(items, list)?;
            Ok(OFFSET + list.len() * OFFSET + body)
        }
        (Descriptor::Dict { key, value: val }, Value::Map(entries)) => {
            let mut total = OFFSET;
            for (k, v) in entries {
                total += size_of(key, k)? + OFFSET + size_of(val, v)?;
            }
            Ok(total)
        }
        (Descriptor::Struct { fields }, Value::Struct(values)) => struct_size(fields, values),
        (Descriptor::Union { variants, .. }, Value::Union { tag, fields: values }) => {
            let variant = variants
                .iter()
                .find(|v| v.tag == *tag)
                .ok_or(EncodeError::UnknownTag(*tag))?;
            Ok(1 + struct_size(&variant.fields, values)?)
        }
        (d, v) => Err(EncodeError::Mismatch {
            expected: d.kind(),
            found: v.kind(),
        }),
    }
}

fn sum_sizes(items: &Descriptor, list: &[Value]) -> Result<usize, EncodeError> {
    list.iter().try_fold(0usize, |acc, v| Ok(acc + size_of(items, v)?))
}

fn struct_size(fields: &[Field], values: &[Value]) -> Result<usize, EncodeError> {
    if fields.len() != values.len() {
        return Err(EncodeError::FieldCount {
            expected: fields.len(),
            got: values.len(),
        });
    }
    let mut total = fields.len() * OFFSET;
    for (field, value) in fields.iter().zip(values) {
        total += size_of(&field.descriptor, value)?;
    }
    Ok(total)
}

fn check_int(value: i64, signed: bool, bits: IntBits) -> Result<(), EncodeError> {
    let (min, max) = bits.range(signed);
    if value < min || value > max {
        return Err(EncodeError::IntegerOutOfRange {
            value,
            bits: bits.bits(),
            signed,
        });
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────────
// Writing
// ───────────────────────────────────────────────────────────────────

/// Cursor over a pre-sized, zeroed buffer.
struct Writer {
    buf: Vec<u8>,
    pos: usize,
}

impl Writer {
    fn write(&mut self, descriptor: &Descriptor, value: &Value) -> Result<(), EncodeError> {
        if let Descriptor::Nullable(inner) = descriptor {
            return match value {
                Value::Null => {
                    self.put_u8(0);
                    Ok(())
                }
                v => {
                    self.put_u8(1);
                    self.write(inner, v)
                }
            };
        }

        match (descriptor, value) {
            (Descriptor::Integer { bits, .. }, Value::Int(v)) => {
                let end = self.pos + bits.bytes();
                let slot = &mut self.buf[self.pos..end];
                match bits {
                    IntBits::B8 => slot[0] = *v as u8,
                    IntBits::B16 => LittleEndian::write_u16(slot, *v as u16),
                    IntBits::B32 => LittleEndian::write_u32(slot, *v as u32),
                }
                self.pos = end;
            }
            (Descriptor::Char { bytes }, Value::Str(s)) => {
                // Padding stays zero from allocation.
                self.buf[self.pos..self.pos + s.len()].copy_from_slice(s.as_bytes());
                self.pos += bytes;
            }
            (Descriptor::String, Value::Str(s)) => self.put_bytes(s.as_bytes()),
            (Descriptor::Bool, Value::Bool(b)) => self.put_u8(u8::from(*b)),
            (Descriptor::Buffer, Value::Bytes(b)) => self.put_bytes(b),
            (Descriptor::Array { items, .. }, Value::List(list)) => {
                let start = self.pos;
                self.pos += list.len() * OFFSET;
                self.write_items(start, start, items, list)?;
            }
            (Descriptor::Vector { items }, Value::List(list)) => {
                let start = self.pos;
                self.put_u32(list.len() as u32);
                self.pos += list.len() * OFFSET;
                self.write_items(start, start + OFFSET, items, list)?;
            }
            (Descriptor::Dict { key, value: val }, Value::Map(entries)) => {
                let start = self.pos;
                self.put_u32(entries.len() as u32);
                let mut slots = Vec::with_capacity(entries.len());
                for (k, _) in entries {
                    self.write(key, k)?;
                    slots.push(self.pos);
                    self.pos += OFFSET;
                }
                for (slot, (_, v)) in slots.into_iter().zip(entries) {
                    self.patch_u32(slot, (self.pos - start) as u32);
                    self.write(val, v)?;
                }
            }
            (Descriptor::Struct { fields }, Value::Struct(values)) => {
                self.write_struct(fields, values)?;
            }
            (Descriptor::Union { variants, .. }, Value::Union { tag, fields: values }) => {
                let variant = variants
                    .iter()
                    .find(|v| v.tag == *tag)
                    .ok_or(EncodeError::UnknownTag(*tag))?;
                self.put_u8(*tag);
                self.write_struct(&variant.fields, values)?;
            }
            (d, v) => {
                return Err(EncodeError::Mismatch {
                    expected: d.kind(),
                    found: v.kind(),
                })
            }
        }
        Ok(())
    }

    /// Write items after an offset table starting at `table`; offsets are
    /// relative to `start`.
    fn write_items(
        &mut self,
        start: usize,
        table: usize,
        items: &Descriptor,
        list: &[Value],
    ) -> Result<(), EncodeError> {
        for (i, item) in list.iter().enumerate() {
            self.patch_u32(table + i * OFFSET, (self.pos - start) as u32);
            self.write(items, item)?;
        }
        Ok(())
    }

    fn write_struct(&mut self, fields: &[Field], values: &[Value]) -> Result<(), EncodeError> {
        let start = self.pos;
        self.pos += fields.len() * OFFSET;
        for (i, (field, value)) in fields.iter().zip(values).enumerate() {
            self.patch_u32(start + i * OFFSET, (self.pos - start) as u32);
            self.write(&field.descriptor, value)?;
        }
        Ok(())
    }

    fn put_u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn put_u32(&mut self, v: u32) {
        self.patch_u32(self.pos, v);
        self.pos += OFFSET;
    }

    fn patch_u32(&mut self, at: usize, v: u32) {
        LittleEndian::write_u32(&mut self.buf[at..at + OFFSET], v);
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Variant;

    #[test]
    fn test_utf8_byte_length_ranges() {
        assert_eq!(utf8_byte_length("abc"), 3);
        assert_eq!(utf8_byte_length("é"), 2);
        assert_eq!(utf8_byte_length("€"), 3);
        assert_eq!(utf8_byte_length("😀"), 4);
        assert_eq!(utf8_byte_length("a€😀"), "a€😀".len());
    }

    #[test]
    fn test_integer_layout_little_endian() {
        let bytes = encode(&Descriptor::u32(), &Value::Int(0x0102_0304)).unwrap();
        assert_eq!(bytes, vec![0x04, 0x03, 0x02, 0x01]);

        let bytes = encode(&Descriptor::i16(), &Value::Int(-2)).unwrap();
        assert_eq!(bytes, vec![0xFE, 0xFF]);
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = encode(&Descriptor::u8(), &Value::Int(256)).unwrap_err();
        assert_eq!(
            err,
            EncodeError::IntegerOutOfRange {
                value: 256,
                bits: 8,
                signed: false
            }
        );
        assert!(encode(&Descriptor::i8(), &Value::Int(-129)).is_err());
    }

    #[test]
    fn test_nullable_presence_byte() {
        let d = Descriptor::u16().nullable();
        assert_eq!(encode(&d, &Value::Null).unwrap(), vec![0]);
        assert_eq!(encode(&d, &Value::Int(5)).unwrap(), vec![1, 5, 0]);
    }

    #[test]
    fn test_null_for_non_nullable() {
        let err = encode(&Descriptor::string(), &Value::Null).unwrap_err();
        assert_eq!(err, EncodeError::UnexpectedNull("string"));
    }

    #[test]
    fn test_string_layout() {
        let bytes = encode(&Descriptor::string(), &Value::from("hé")).unwrap();
        assert_eq!(bytes, vec![3, 0, 0, 0, b'h', 0xC3, 0xA9]);
    }

    #[test]
    fn test_char_padding_and_overflow() {
        let d = Descriptor::char(4);
        assert_eq!(encode(&d, &Value::from("ab")).unwrap(), vec![b'a', b'b', 0, 0]);
        assert_eq!(
            encode(&d, &Value::from("abcde")).unwrap_err(),
            EncodeError::CharOverflow { len: 5, capacity: 4 }
        );
    }

    #[test]
    fn test_struct_offset_table() {
        let d = Descriptor::structure([("a", Descriptor::u8()), ("b", Descriptor::string())]);
        let v = Value::Struct(vec![Value::Int(9), Value::from("xy")]);
        let bytes = encode(&d, &v).unwrap();
        // 2 offsets, then u8, then string
        assert_eq!(&bytes[0..4], &8u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &9u32.to_le_bytes());
        assert_eq!(bytes[8], 9);
        assert_eq!(&bytes[9..13], &2u32.to_le_bytes());
        assert_eq!(&bytes[13..], b"xy");
    }

    #[test]
    fn test_vector_layout() {
        let d = Descriptor::vector(Descriptor::u8());
        let bytes = encode(&d, &Value::list([7u8, 8])).unwrap();
        assert_eq!(
            bytes,
            vec![2, 0, 0, 0, 12, 0, 0, 0, 13, 0, 0, 0, 7, 8]
        );
    }

    #[test]
    fn test_dict_layout() {
        let d = Descriptor::dict(Descriptor::u8(), Descriptor::u8());
        let v = Value::Map(vec![
            (Value::Int(1), Value::Int(10)),
            (Value::Int(2), Value::Int(20)),
        ]);
        let bytes = encode(&d, &v).unwrap();
        // count, (key, off) x2, values
        assert_eq!(
            bytes,
            vec![2, 0, 0, 0, 1, 14, 0, 0, 0, 2, 15, 0, 0, 0, 10, 20]
        );
    }

    #[test]
    fn test_union_tag_prefix() {
        let d = Descriptor::union(
            "type",
            vec![Variant::new(3, "x", [("n", Descriptor::u8())])],
        );
        let v = Value::Union {
            tag: 3,
            fields: vec![Value::Int(42)],
        };
        assert_eq!(encode(&d, &v).unwrap(), vec![3, 4, 0, 0, 0, 42]);

        let bad = Value::Union {
            tag: 4,
            fields: vec![],
        };
        assert_eq!(encode(&d, &bad).unwrap_err(), EncodeError::UnknownTag(4));
    }

    #[test]
    fn test_array_length_mismatch() {
        let d = Descriptor::array(2, Descriptor::u8());
        assert_eq!(
            encode(&d, &Value::list([1u8])).unwrap_err(),
            EncodeError::ArrayLength { expected: 2, got: 1 }
        );
    }

    #[test]
    fn test_vector_from_items_matches_encode() {
        let d = Descriptor::vector(Descriptor::string());
        let direct = encode(&d, &Value::list(["a", "bcd"])).unwrap();
        let items = vec![
            encode(&Descriptor::string(), &Value::from("a")).unwrap(),
            encode(&Descriptor::string(), &Value::from("bcd")).unwrap(),
        ];
        assert_eq!(encode_vector_from_items(&items).unwrap(), direct);
    }

    #[test]
    fn test_mismatch_detected_before_write() {
        let d = Descriptor::structure([("a", Descriptor::u8()), ("b", Descriptor::bool())]);
        let v = Value::Struct(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            byte_length(&d, &v).unwrap_err(),
            EncodeError::Mismatch {
                expected: "bool",
                found: "integer"
            }
        );
    }
}
