//! `payload_schema` decodes and encodes small binary payloads against a
//! runtime schema: a flat list of typed, named fields with optional scaling,
//! lookup tables, and conditional branching.
//!
//! It is built for the kind of fixed-size radio payload a LoRaWAN sensor or
//! similar constrained device emits, where the wire format is described once
//! (by hand, or loaded from a compact binary descriptor shipped alongside
//! the firmware) and then used to decode every uplink and encode every
//! downlink without generating any per-device code.
//!
//! ```
//! use payload_schema::bits::Endian;
//! use payload_schema::field::build;
//! use payload_schema::schema::Schema;
//!
//! let schema = Schema::compile(
//!     "sensor-v1",
//!     Endian::Big,
//!     vec![build::u16("temperature").with_mult(0.1)],
//! )
//! .unwrap();
//!
//! let decoded = payload_schema::decoder::decode(&schema, &[0x00, 0x7B]).unwrap();
//! assert_eq!(decoded.get("temperature").unwrap().as_f64(), Some(12.3));
//! ```
//!
//! The crate is organized around the five pieces of the interpreter:
//!
//! - [`bits`]: fixed-width integer/float codecs and single-byte bit
//!   extraction, in both byte orders.
//! - [`field`] and [`schema`]: the immutable field list a schema compiles
//!   down to, plus the human-readable type-string grammar used to build one.
//! - [`descriptor`]: the compact binary form a schema can be loaded from or
//!   serialized to.
//! - [`decoder`] and [`encoder`]: walking a schema over bytes in each
//!   direction.

pub mod bits;
pub mod decoder;
pub mod descriptor;
pub mod encoder;
pub mod errors;
pub mod field;
pub mod schema;
pub mod value;

#[cfg(feature = "serde")]
pub mod serde_schema;

pub use decoder::{DecodeResult, DecodedField};
pub use encoder::EncodeResult;
pub use errors::{CompileError, DecodeError, EncodeError};
pub use schema::{Schema, SchemaBuilder};
pub use value::Value;
