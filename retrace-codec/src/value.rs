//! Dynamically-typed values, the eager form of decoded data.
//!
//! Struct and union payloads are positional: `Value::Struct(fields)` holds
//! the fields in descriptor declaration order. Typed records convert to and
//! from this representation through [`crate::Schema`].

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Bool(bool),
    /// `String` and `Char` descriptors.
    Str(String),
    Bytes(Vec<u8>),
    /// `Array` and `Vector` descriptors.
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct(Vec<Value>),
    Union { tag: u8, fields: Vec<Value> },
}

impl Value {
    /// Short name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "integer",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Bytes(_) => "buffer",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
            Value::Union { .. } => "union",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `None` becomes `Null`.
    pub fn nullable<T: Into<Value>>(value: Option<T>) -> Value {
        value.map_or(Value::Null, Into::into)
    }

    /// List of values converted element-wise.
    pub fn list<T, I>(items: I) -> Value
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// `Null` becomes `None`.
    pub fn into_option(self) -> Option<Value> {
        match self {
            Value::Null => None,
            other => Some(other),
        }
    }

    pub fn into_i64(self) -> Result<i64, DecodeError> {
        match self {
            Value::Int(v) => Ok(v),
            other => Err(mismatch("integer", &other)),
        }
    }

    pub fn into_u8(self) -> Result<u8, DecodeError> {
        narrow(self.into_i64()?, "u8")
    }

    pub fn into_u16(self) -> Result<u16, DecodeError> {
        narrow(self.into_i64()?, "u16")
    }

    pub fn into_u32(self) -> Result<u32, DecodeError> {
        narrow(self.into_i64()?, "u32")
    }

    pub fn into_i32(self) -> Result<i32, DecodeError> {
        narrow(self.into_i64()?, "i32")
    }

    pub fn into_bool(self) -> Result<bool, DecodeError> {
        match self {
            Value::Bool(v) => Ok(v),
            other => Err(mismatch("bool", &other)),
        }
    }

    pub fn into_string(self) -> Result<String, DecodeError> {
        match self {
            Value::Str(v) => Ok(v),
            other => Err(mismatch("string", &other)),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, DecodeError> {
        match self {
            Value::Bytes(v) => Ok(v),
            other => Err(mismatch("buffer", &other)),
        }
    }

    pub fn into_list(self) -> Result<Vec<Value>, DecodeError> {
        match self {
            Value::List(v) => Ok(v),
            other => Err(mismatch("list", &other)),
        }
    }

    pub fn into_map(self) -> Result<Vec<(Value, Value)>, DecodeError> {
        match self {
            Value::Map(v) => Ok(v),
            other => Err(mismatch("map", &other)),
        }
    }

    /// Destructure a struct with exactly `N` fields.
    pub fn into_fields<const N: usize>(self) -> Result<[Value; N], DecodeError> {
        match self {
            Value::Struct(fields) => fields_exact(fields),
            other => Err(mismatch("struct", &other)),
        }
    }

    /// Split a union into its tag and positional fields.
    pub fn into_union(self) -> Result<(u8, Vec<Value>), DecodeError> {
        match self {
            Value::Union { tag, fields } => Ok((tag, fields)),
            other => Err(mismatch("union", &other)),
        }
    }
}

/// Convert a positional field list into a fixed-size array.
pub fn fields_exact<const N: usize>(fields: Vec<Value>) -> Result<[Value; N], DecodeError> {
    let got = fields.len();
    fields
        .try_into()
        .map_err(|_| DecodeError::FieldCount { expected: N, got })
}

fn mismatch(expected: &'static str, found: &Value) -> DecodeError {
    DecodeError::KindMismatch {
        expected,
        found: found.kind(),
    }
}

fn narrow<T: TryFrom<i64>>(value: i64, target: &'static str) -> Result<T, DecodeError> {
    T::try_from(value).map_err(|_| DecodeError::IntegerOutOfRange { value, target })
}

macro_rules! int_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

int_from!(u8, i8, u16, i16, u32, i32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}
