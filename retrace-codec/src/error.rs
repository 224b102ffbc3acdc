use thiserror::Error;

/// Value does not fit its descriptor. Raised during the sizing pass, before
/// any byte of the destination buffer is written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("descriptor expects {expected}, value is {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("null value for non-nullable {0}")]
    UnexpectedNull(&'static str),
    #[error("integer {value} does not fit {bits} bits (signed: {signed})")]
    IntegerOutOfRange { value: i64, bits: u8, signed: bool },
    #[error("char field holds {len} bytes, capacity is {capacity}")]
    CharOverflow { len: usize, capacity: usize },
    #[error("array expects {expected} items, got {got}")]
    ArrayLength { expected: usize, got: usize },
    #[error("struct expects {expected} fields, got {got}")]
    FieldCount { expected: usize, got: usize },
    #[error("unknown union tag {0}")]
    UnknownTag(u8),
    #[error("encoded size exceeds the 32-bit offset range")]
    TooLarge,
}

/// Malformed or truncated buffer, or a decoded value that does not match
/// the shape the caller asked for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer truncated: need {needed} bytes at offset {offset}, buffer holds {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("union tag {tag} at offset {offset} is out of range")]
    UnknownTag { tag: u8, offset: usize },
    #[error("invalid bool byte {byte:#04x} at offset {offset}")]
    InvalidBool { byte: u8, offset: usize },
    #[error("invalid presence byte {byte:#04x} at offset {offset}")]
    InvalidPresence { byte: u8, offset: usize },
    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("expected {expected}, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("unexpected null")]
    UnexpectedNull,
    #[error("expected {expected} fields, found {got}")]
    FieldCount { expected: usize, got: usize },
    #[error("no field named '{0}'")]
    MissingField(String),
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("integer {value} out of range for {target}")]
    IntegerOutOfRange { value: i64, target: &'static str },
    #[error("invalid value: {0}")]
    Invalid(String),
}
