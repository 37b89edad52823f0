//! Schema-driven decoding (component D): walks a [`Schema`]'s fields over a
//! byte buffer, maintaining a byte cursor, a transient variable environment
//! for `match` dispatch, and the accumulated named output.

use std::collections::{BTreeMap, HashMap};

use crate::bits::{self, Endian};
use crate::errors::DecodeError;
use crate::field::{Field, FieldType};
use crate::schema::Schema;
use crate::value::Value;

/// One named field from a [`DecodeResult`]: its value plus the schema type
/// it was decoded as, per spec §3's "decoded field" data model.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub name: String,
    pub value: Value,
    pub type_tag: FieldType,
}

/// The outcome of a [`decode_full`] call: an ordered list of decoded fields
/// (in schema declaration order, per spec §3's field-order invariant), the
/// number of bytes the cursor advanced through, and - when decoding did not
/// run to completion - the error that stopped it.
///
/// A decode error short-circuits rather than rolling back: `fields` holds
/// whatever was produced before the failing field, and `bytes_consumed`
/// reflects the cursor's last successful advance, so a caller that only
/// cares about the fields read so far does not have to re-decode a prefix
/// of the payload by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub fields: Vec<DecodedField>,
    pub bytes_consumed: usize,
    pub error: Option<DecodeError>,
}

impl DecodeResult {
    /// Looks up a field's value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Looks up a decoded field by its position in declaration order.
    pub fn get_index(&self, index: usize) -> Option<&DecodedField> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Typed accessor with a default for a missing or non-numeric field.
    pub fn as_i64(&self, name: &str, default: i64) -> i64 {
        self.get(name).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Typed accessor with a default for a missing or non-numeric field.
    pub fn as_f64(&self, name: &str, default: f64) -> f64 {
        self.get(name).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Typed accessor with a default for a missing or non-boolean field.
    pub fn as_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Typed accessor with a default for a missing or non-string field.
    pub fn as_str<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).and_then(Value::as_str).unwrap_or(default)
    }

    /// Collapses the ordered field list into a name-keyed map, the shape
    /// [`encoder::encode`](crate::encoder::encode) consumes.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.fields.iter().map(|f| (f.name.clone(), f.value.clone())).collect()
    }
}

/// Decodes `data` against `schema`, returning every named (non-internal,
/// non-`match`) field's value as a name-keyed map.
///
/// Field names starting with `_` are treated as internal: they still bind
/// a `match` variable if `var` is set, but are not present in the output
/// map, mirroring spec §4.D's "leading underscore suppresses output" rule.
/// Callers that need field order, the original type tag, the number of
/// bytes consumed, or the fields produced before a decode error (spec §3's
/// full "decode result") should use [`decode_full`] instead - this wrapper
/// discards all of that and reports only the first error.
pub fn decode(schema: &Schema, data: &[u8]) -> Result<BTreeMap<String, Value>, DecodeError> {
    let result = decode_full(schema, data);
    match result.error {
        Some(err) => Err(err),
        None => Ok(result.to_map()),
    }
}

/// Decodes `data` against `schema`, returning the full [`DecodeResult`]:
/// fields in schema declaration order, each tagged with the [`FieldType`]
/// it was read as, the total byte count the cursor advanced through, and
/// (per spec §3/§7) whatever error stopped decoding short of the schema's
/// last field. Unlike [`decode`], this never discards partial progress -
/// `result.error.is_none()` is the only way to tell a full decode from one
/// that stopped early.
pub fn decode_full(schema: &Schema, data: &[u8]) -> DecodeResult {
    if data.len() > MAX_PAYLOAD {
        return DecodeResult { fields: Vec::new(), bytes_consumed: 0, error: Some(DecodeError::PayloadTooLarge) };
    }
    let mut pos = 0usize;
    let mut vars: HashMap<String, i64> = HashMap::new();
    let mut out = Vec::new();
    let error = decode_range(&schema.fields, 0, schema.fields.len(), schema.default_endian, data, &mut pos, &mut vars, &mut out).err();
    DecodeResult { fields: out, bytes_consumed: pos, error }
}

/// Suggested maximum payload size from spec §5/§6; a hosted build enforces
/// it as a catchable error rather than letting an oversized buffer pass
/// through unchecked.
const MAX_PAYLOAD: usize = 256;

fn decode_range(
    fields: &[Field],
    start: usize,
    count: usize,
    default_endian: Endian,
    data: &[u8],
    pos: &mut usize,
    vars: &mut HashMap<String, i64>,
    out: &mut Vec<DecodedField>,
) -> Result<(), DecodeError> {
    let end = start + count;
    let mut i = start;
    while i < end {
        let field = &fields[i];
        if let FieldType::Match = field.ty {
            if let Some(var_name) = &field.match_var {
                let value = *vars.get(var_name).unwrap_or(&0);
                if let Some(case) = field.cases.iter().find(|c| c.matches(value)) {
                    decode_range(fields, case.field_start, case.field_count, default_endian, data, pos, vars, out)?;
                }
            }
            // Every case's field range lives in this same flat array,
            // immediately following the match field; skip past the whole
            // span regardless of which branch matched so an unmatched
            // branch's fields are never decoded at the top level.
            i = field
                .cases
                .iter()
                .map(|c| c.field_start + c.field_count)
                .max()
                .unwrap_or(i + 1)
                .max(i + 1);
            continue;
        }
        let endian = field.endian.unwrap_or(default_endian);
        match &field.ty {
            FieldType::UInt(width) => {
                let raw = bits::read_uint(data, *pos, *width as usize, endian)?;
                capture_var(field, raw as i64, vars);
                emit_numeric(field, raw as f64, Value::UInt(raw), out);
                *pos += *width as usize;
            }
            FieldType::SInt(width) => {
                let raw = bits::read_sint(data, *pos, *width as usize, endian)?;
                capture_var(field, raw, vars);
                emit_numeric(field, raw as f64, Value::Int(raw), out);
                *pos += *width as usize;
            }
            FieldType::F16 => {
                let bits_raw = bits::read_uint(data, *pos, 2, endian)? as u16;
                let raw = bits::half_to_f64(bits_raw);
                capture_var(field, raw as i64, vars);
                emit_numeric(field, raw, Value::Float(raw), out);
                *pos += 2;
            }
            FieldType::F32 => {
                let raw = bits::read_f32(data, *pos, endian)? as f64;
                capture_var(field, raw as i64, vars);
                emit_numeric(field, raw, Value::Float(raw), out);
                *pos += 4;
            }
            FieldType::F64 => {
                let raw = bits::read_f64(data, *pos, endian)?;
                capture_var(field, raw as i64, vars);
                emit_numeric(field, raw, Value::Float(raw), out);
                *pos += 8;
            }
            FieldType::Bool { bit_start } => {
                need_bytes(data, *pos, 1)?;
                let raw = bits::extract_bits(data[*pos], *bit_start, 1);
                capture_var(field, raw as i64, vars);
                emit_value(field, Value::Bool(raw != 0), out);
                if field.consume {
                    *pos += 1;
                }
            }
            FieldType::Bitfield { bit_start, bit_width } => {
                need_bytes(data, *pos, 1)?;
                let raw = bits::extract_bits(data[*pos], *bit_start, *bit_width);
                capture_var(field, raw as i64, vars);
                emit_value(field, Value::UInt(raw as u64), out);
                if field.consume {
                    *pos += 1;
                }
            }
            FieldType::Skip { size } => {
                need_bytes(data, *pos, *size)?;
                *pos += *size;
            }
            FieldType::Ascii { size } => {
                need_bytes(data, *pos, *size)?;
                let raw = &data[*pos..*pos + *size];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                let text = String::from_utf8_lossy(&raw[..end]).into_owned();
                emit_value(field, Value::Str(text), out);
                *pos += *size;
            }
            FieldType::Hex { size } => {
                need_bytes(data, *pos, *size)?;
                let raw = &data[*pos..*pos + *size];
                let text = raw.iter().map(|b| format!("{b:02X}")).collect::<String>();
                emit_value(field, Value::Str(text), out);
                *pos += *size;
            }
            FieldType::Base64 { size } => {
                need_bytes(data, *pos, *size)?;
                let raw = &data[*pos..*pos + *size];
                emit_value(field, Value::Str(base64_encode(raw)), out);
                *pos += *size;
            }
            FieldType::Bytes { size } => {
                need_bytes(data, *pos, *size)?;
                let raw = data[*pos..*pos + *size].to_vec();
                emit_value(field, Value::Bytes(raw), out);
                *pos += *size;
            }
            FieldType::Enum { size } => {
                let raw = bits::read_uint(data, *pos, *size as usize, endian)?;
                capture_var(field, raw as i64, vars);
                let label = field
                    .lookup
                    .iter()
                    .find(|(key, _)| *key == raw as i64)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_else(|| format!("unknown({raw})"));
                emit_value(field, Value::Str(label), out);
                *pos += *size as usize;
            }
            FieldType::UDec => {
                need_bytes(data, *pos, 1)?;
                let byte = data[*pos];
                let whole = (byte >> 4) & 0x0F;
                let frac = byte & 0x0F;
                let raw = whole as f64 + (frac as f64) / 10.0;
                let value = apply_modifiers(raw, field);
                emit_value(field, Value::Float(value), out);
                *pos += 1;
            }
            FieldType::SDec => {
                need_bytes(data, *pos, 1)?;
                let byte = data[*pos];
                let whole_nibble = ((byte >> 4) & 0x0F) as i64;
                let whole = if whole_nibble >= 8 { whole_nibble - 16 } else { whole_nibble };
                let frac = (byte & 0x0F) as f64;
                let raw = whole as f64 + frac / 10.0;
                let value = apply_modifiers(raw, field);
                emit_value(field, Value::Float(value), out);
                *pos += 1;
            }
            FieldType::Match => unreachable!("handled above before dispatching on type"),
        }
        i += 1;
    }
    Ok(())
}

fn need_bytes(data: &[u8], pos: usize, len: usize) -> Result<(), DecodeError> {
    if pos + len > data.len() {
        Err(DecodeError::BufferUnderrun)
    } else {
        Ok(())
    }
}

fn capture_var(field: &Field, raw: i64, vars: &mut HashMap<String, i64>) {
    if let Some(name) = &field.var {
        vars.insert(name.clone(), raw);
    }
}

fn apply_modifiers(value: f64, field: &Field) -> f64 {
    let mut v = value;
    if let Some(mult) = field.mult {
        v *= mult;
    }
    if let Some(div) = field.div {
        if div != 0.0 {
            v /= div;
        }
    }
    if let Some(add) = field.add {
        v += add;
    }
    v
}

/// Applies the modifier chain to a raw numeric reading and emits either the
/// unmodified raw value (when no modifier is set, preserving its native
/// int/uint type) or the modifier chain's floating-point result.
fn emit_numeric(field: &Field, raw: f64, unmodified: Value, out: &mut Vec<DecodedField>) {
    if field.mult.is_none() && field.div.is_none() && field.add.is_none() {
        emit_value(field, unmodified, out);
    } else {
        emit_value(field, Value::Float(apply_modifiers(raw, field)), out);
    }
}

fn emit_value(field: &Field, value: Value, out: &mut Vec<DecodedField>) {
    if let Some(first) = field.name.chars().next() {
        if first != '_' {
            out.push(DecodedField { name: field.name.clone(), value, type_tag: field.ty.clone() });
        }
    }
}

const BASE64_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = *chunk.get(1).unwrap_or(&0) as u32;
        let b2 = *chunk.get(2).unwrap_or(&0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;
        out.push(BASE64_ALPHABET[((triple >> 18) & 0x3F) as usize] as char);
        out.push(BASE64_ALPHABET[((triple >> 12) & 0x3F) as usize] as char);
        out.push(if chunk.len() > 1 { BASE64_ALPHABET[((triple >> 6) & 0x3F) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { BASE64_ALPHABET[(triple & 0x3F) as usize] as char } else { '=' });
    }
    out
}
