//! Error types for schema compilation, decoding, and encoding.

use std::fmt;

/// Errors raised while building or loading a [`crate::schema::Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The binary descriptor's magic bytes or header length were invalid.
    InvalidHeader,
    /// A field's declared size does not fit its type (e.g. a 0-byte integer).
    InvalidFieldSize,
    /// A bitfield's `bit_start + bit_width` exceeds 8 (spans past one byte).
    InvalidBitfield,
    /// A lookup table exceeded the suggested maximum of 16 entries.
    TooManyLookupEntries,
    /// A `match` case list exceeded the suggested maximum of 8 values.
    TooManyMatchValues,
    /// A single `match` field had more than the suggested maximum of 16 cases.
    TooManyCases,
    /// A schema exceeded the suggested maximum of 32 fields.
    TooManyFields,
    /// A field name exceeded the suggested maximum of 32 characters.
    NameTooLong,
    /// A `match` case's field range pointed outside the schema's field list.
    InvalidCaseRange,
    /// A type string did not match any known grammar production.
    UnknownTypeString,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::InvalidHeader => write!(f, "invalid descriptor header"),
            CompileError::InvalidFieldSize => write!(f, "invalid field size"),
            CompileError::InvalidBitfield => write!(f, "bitfield does not fit within one byte"),
            CompileError::TooManyLookupEntries => write!(f, "too many lookup table entries"),
            CompileError::TooManyMatchValues => write!(f, "too many match-list values"),
            CompileError::TooManyCases => write!(f, "too many cases in a match field"),
            CompileError::TooManyFields => write!(f, "too many fields in schema"),
            CompileError::NameTooLong => write!(f, "field name too long"),
            CompileError::InvalidCaseRange => write!(f, "match case field range out of bounds"),
            CompileError::UnknownTypeString => write!(f, "unrecognized type string"),
        }
    }
}

impl std::error::Error for CompileError {}

impl CompileError {
    /// The stable integer error code from the public interface's error
    /// table. Descriptor header problems and unknown type strings are
    /// parse errors (-1); bounds violations against a fixed-capacity table
    /// (too many fields, too-long names, lookup/match-list overflow) are
    /// the reserved internal/overflow code (-3); a `match` case pointing
    /// outside the schema's field list is the match-specific code (-5).
    pub fn code(&self) -> i32 {
        match self {
            CompileError::InvalidHeader | CompileError::UnknownTypeString => -1,
            CompileError::InvalidCaseRange => -5,
            CompileError::InvalidFieldSize
            | CompileError::InvalidBitfield
            | CompileError::TooManyLookupEntries
            | CompileError::TooManyMatchValues
            | CompileError::TooManyCases
            | CompileError::TooManyFields
            | CompileError::NameTooLong => -3,
        }
    }
}

/// Errors raised while decoding a payload against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload ran out of bytes before a field could be fully read.
    BufferUnderrun,
    /// The decoder encountered a field type it cannot handle (should not
    /// occur for a schema that compiled successfully).
    UnsupportedType,
    /// The input payload exceeded the suggested maximum of 256 bytes.
    PayloadTooLarge,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::BufferUnderrun => write!(f, "buffer underrun"),
            DecodeError::UnsupportedType => write!(f, "unsupported type"),
            DecodeError::PayloadTooLarge => write!(f, "payload exceeds the maximum size"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl DecodeError {
    /// The stable integer error code from the public interface's error table.
    pub fn code(&self) -> i32 {
        match self {
            DecodeError::BufferUnderrun => -2,
            DecodeError::UnsupportedType => -6,
            DecodeError::PayloadTooLarge => -3,
        }
    }
}

/// Errors raised while encoding named values into a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A required field name was absent from the input map.
    MissingInput(String),
    /// The field's type has no encoder (`ascii`, `hex`, `base64`, `bytes`,
    /// `enum`), matching the reference implementation's `encode_field`
    /// switch, which only ever writes the numeric/bitfield/skip types.
    UnsupportedType(String),
    /// A value could not be represented in the field's declared width.
    Overflow(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::MissingInput(name) => write!(f, "missing input for field `{name}`"),
            EncodeError::UnsupportedType(name) => {
                write!(f, "field `{name}` has a type the encoder does not support")
            }
            EncodeError::Overflow(name) => {
                write!(f, "value for field `{name}` overflows its declared width")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

impl EncodeError {
    /// The stable integer error code from the public interface's error table.
    pub fn code(&self) -> i32 {
        match self {
            EncodeError::MissingInput(_) => -7,
            EncodeError::UnsupportedType(_) => -6,
            EncodeError::Overflow(_) => -3,
        }
    }
}

/// The `0 = OK` case from the public interface's error table, for callers
/// that want a single stable integer across all three error enums (e.g. an
/// FFI boundary) rather than matching on `Result`.
pub const OK: i32 = 0;
