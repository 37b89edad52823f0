//! The dynamically-typed value produced by decoding and consumed by encoding.

/// A single decoded field value, or a single encoder input value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer result (signed integer types, nibble-decimal variable capture).
    Int(i64),
    /// Unsigned integer result (unsigned integer types, raw bitfield/bool capture).
    UInt(u64),
    /// Floating-point result: IEEE float types, modifier-chain output, nibble-decimal.
    Float(f64),
    /// Boolean bit result.
    Bool(bool),
    /// Short string result: ascii/hex/base64 decode, enum/lookup label.
    Str(String),
    /// Raw byte run.
    Bytes(Vec<u8>),
}

impl Value {
    /// Reads the value as an `f64`, the common numeric interchange type
    /// used by the modifier chain. Strings and byte buffers have no
    /// numeric reading and return `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Str(_) | Value::Bytes(_) => None,
        }
    }

    /// Reads the value as an `i64`, truncating floats toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => Some(*v as i64),
            Value::Float(v) => Some(*v as i64),
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            Value::Str(_) | Value::Bytes(_) => None,
        }
    }

    /// Reads the value as a `bool` (nonzero numeric or `true`).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::UInt(v) => Some(*v != 0),
            Value::Float(v) => Some(*v != 0.0),
            Value::Str(_) | Value::Bytes(_) => None,
        }
    }

    /// Reads the value as a `&str`, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Reads the value as a byte slice, if it is a byte buffer.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }
}
