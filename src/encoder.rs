//! Schema-driven encoding (component E): the inverse of [`crate::decoder`],
//! turning a named value map back into bytes.

use std::collections::{BTreeMap, HashMap};

use crate::bits::{self, Endian};
use crate::errors::EncodeError;
use crate::field::{Field, FieldType};
use crate::schema::Schema;
use crate::value::Value;

/// The outcome of an [`encode_full`] call: the bytes written before either
/// reaching the schema's last field or hitting an error, plus (per spec
/// §7) whatever error stopped encoding short of the full schema. Mirrors
/// [`crate::decoder::DecodeResult`] on the encode side.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeResult {
    pub bytes: Vec<u8>,
    pub error: Option<EncodeError>,
}

/// Encodes `values` against `schema`, producing the bytes that would decode
/// back to (at least) the fields provided. Fields whose name starts with
/// `_`, and `match` fields, are skipped entirely: neither read from `values`
/// nor written to the output, matching decode's corresponding suppression.
///
/// The output grows as fields are written rather than being sized up front,
/// since a `match` field can select branches of different lengths; the
/// final length is however many bytes the selected path actually touched.
///
/// This discards the bytes written before an error and reports only the
/// first one; callers that need the partial output (spec §7: "the output
/// buffer's length reflecting the last fully-written field") should use
/// [`encode_full`] instead.
pub fn encode(schema: &Schema, values: &BTreeMap<String, Value>) -> Result<Vec<u8>, EncodeError> {
    let result = encode_full(schema, values);
    match result.error {
        Some(err) => Err(err),
        None => Ok(result.bytes),
    }
}

/// Encodes `values` against `schema`, returning the full [`EncodeResult`]:
/// never discards the bytes written so far, even when a field's value is
/// missing, overflows its width, or has no encoder - `result.error.is_none()`
/// is the only way to tell a full encode from one that stopped early.
pub fn encode_full(schema: &Schema, values: &BTreeMap<String, Value>) -> EncodeResult {
    let mut out = Vec::new();
    let mut pos = 0usize;
    let mut vars: HashMap<String, i64> = HashMap::new();
    let error = encode_range(&schema.fields, 0, schema.fields.len(), schema.default_endian, values, &mut out, &mut pos, &mut vars).err();
    EncodeResult { bytes: out, error }
}

fn ensure_len(out: &mut Vec<u8>, needed: usize) {
    if out.len() < needed {
        out.resize(needed, 0);
    }
}

fn encode_range(
    fields: &[Field],
    start: usize,
    count: usize,
    default_endian: Endian,
    values: &BTreeMap<String, Value>,
    out: &mut Vec<u8>,
    pos: &mut usize,
    vars: &mut HashMap<String, i64>,
) -> Result<(), EncodeError> {
    let end = start + count;
    let mut i = start;
    while i < end {
        let field = &fields[i];

        if let FieldType::Match = field.ty {
            if let Some(var_name) = &field.match_var {
                let value = *vars.get(var_name).unwrap_or(&0);
                if let Some(case) = field.cases.iter().find(|c| c.matches(value)) {
                    encode_range(fields, case.field_start, case.field_count, default_endian, values, out, pos, vars)?;
                }
            }
            i = field
                .cases
                .iter()
                .map(|c| c.field_start + c.field_count)
                .max()
                .unwrap_or(i + 1)
                .max(i + 1);
            continue;
        }

        if field.name.starts_with('_') {
            if let FieldType::Skip { size } = field.ty {
                ensure_len(out, *pos + size);
                *pos += size;
            }
            i += 1;
            continue;
        }

        let endian = field.endian.unwrap_or(default_endian);
        match &field.ty {
            FieldType::UInt(width) => {
                let value = required(values, field)?;
                let raw = inverse_modifiers(require_f64(value, field)?, field);
                let rounded = round_half_away_from_zero(raw);
                let max = if *width >= 8 { u64::MAX } else { (1u64 << (*width as u32 * 8)) - 1 };
                if rounded < 0 || rounded as u64 > max {
                    return Err(EncodeError::Overflow(field.name.clone()));
                }
                capture_var(field, rounded, vars);
                ensure_len(out, *pos + *width as usize);
                bits::write_uint(out, *pos, rounded as u64, *width as usize, endian);
                *pos += *width as usize;
            }
            FieldType::SInt(width) => {
                let value = required(values, field)?;
                let raw = inverse_modifiers(require_f64(value, field)?, field);
                let rounded = round_half_away_from_zero(raw);
                let bit_width = *width as u32 * 8;
                let (min, max) = if bit_width >= 64 {
                    (i64::MIN, i64::MAX)
                } else {
                    (-(1i64 << (bit_width - 1)), (1i64 << (bit_width - 1)) - 1)
                };
                if rounded < min || rounded > max {
                    return Err(EncodeError::Overflow(field.name.clone()));
                }
                capture_var(field, rounded, vars);
                ensure_len(out, *pos + *width as usize);
                bits::write_uint(out, *pos, rounded as u64, *width as usize, endian);
                *pos += *width as usize;
            }
            FieldType::F16 => {
                let value = required(values, field)?;
                let raw = inverse_modifiers(require_f64(value, field)?, field);
                let half = bits::f64_to_half(raw);
                ensure_len(out, *pos + 2);
                bits::write_uint(out, *pos, half as u64, 2, endian);
                *pos += 2;
            }
            FieldType::F32 => {
                let value = required(values, field)?;
                let raw = inverse_modifiers(require_f64(value, field)?, field);
                ensure_len(out, *pos + 4);
                bits::write_uint(out, *pos, (raw as f32).to_bits() as u64, 4, endian);
                *pos += 4;
            }
            FieldType::F64 => {
                let value = required(values, field)?;
                let raw = inverse_modifiers(require_f64(value, field)?, field);
                ensure_len(out, *pos + 8);
                bits::write_uint(out, *pos, raw.to_bits(), 8, endian);
                *pos += 8;
            }
            FieldType::Bool { bit_start: _ } => {
                let value = required(values, field)?;
                let b = value.as_bool().ok_or_else(|| EncodeError::UnsupportedType(field.name.clone()))?;
                capture_var(field, if b { 1 } else { 0 }, vars);
                ensure_len(out, *pos + 1);
                out[*pos] = if b { 1 } else { 0 };
                *pos += 1;
            }
            FieldType::Bitfield { bit_start, bit_width } => {
                let value = required(values, field)?;
                let raw = value.as_i64().ok_or_else(|| EncodeError::UnsupportedType(field.name.clone()))?;
                if raw < 0 || raw >= (1i64 << *bit_width) {
                    return Err(EncodeError::Overflow(field.name.clone()));
                }
                capture_var(field, raw, vars);
                ensure_len(out, *pos + 1);
                out[*pos] = bits::insert_bits(out[*pos], *bit_start, *bit_width, raw as u8);
                if field.consume {
                    *pos += 1;
                }
            }
            FieldType::Skip { size } => {
                ensure_len(out, *pos + *size);
                *pos += *size;
            }
            FieldType::Ascii { .. }
            | FieldType::Hex { .. }
            | FieldType::Base64 { .. }
            | FieldType::Bytes { .. }
            | FieldType::Enum { .. } => {
                return Err(EncodeError::UnsupportedType(field.name.clone()));
            }
            FieldType::UDec => {
                let value = required(values, field)?;
                let raw_val = inverse_modifiers(require_f64(value, field)?, field);
                let whole = raw_val.trunc() as i64;
                let frac_part = raw_val - whole as f64;
                let frac = (frac_part.abs() * 10.0).round() as i64;
                let whole = whole.clamp(0, 9);
                let frac = frac.min(9);
                ensure_len(out, *pos + 1);
                out[*pos] = (((whole as u8) & 0x0F) << 4) | ((frac as u8) & 0x0F);
                *pos += 1;
            }
            FieldType::SDec => {
                let value = required(values, field)?;
                let raw_val = inverse_modifiers(require_f64(value, field)?, field);
                let mut whole = raw_val.trunc() as i64;
                let mut frac_part = raw_val - whole as f64;
                if raw_val < 0.0 && frac_part != 0.0 {
                    whole -= 1;
                    frac_part = raw_val - whole as f64;
                }
                let frac = (frac_part * 10.0).round() as i64;
                let whole = whole.clamp(-8, 7);
                let frac = frac.clamp(0, 9);
                ensure_len(out, *pos + 1);
                out[*pos] = (((whole as u8) & 0x0F) << 4) | ((frac as u8) & 0x0F);
                *pos += 1;
            }
            FieldType::Match => unreachable!("handled above before dispatching on type"),
        }
        i += 1;
    }
    Ok(())
}

fn capture_var(field: &Field, raw: i64, vars: &mut HashMap<String, i64>) {
    if let Some(name) = &field.var {
        vars.insert(name.clone(), raw);
    }
}

fn required<'a>(values: &'a BTreeMap<String, Value>, field: &Field) -> Result<&'a Value, EncodeError> {
    values.get(&field.name).ok_or_else(|| EncodeError::MissingInput(field.name.clone()))
}

fn require_f64(value: &Value, field: &Field) -> Result<f64, EncodeError> {
    value.as_f64().ok_or_else(|| EncodeError::UnsupportedType(field.name.clone()))
}

fn inverse_modifiers(value: f64, field: &Field) -> f64 {
    let mut v = value;
    if let Some(add) = field.add {
        v -= add;
    }
    if let Some(mult) = field.mult {
        if mult != 0.0 {
            v /= mult;
        }
    }
    if let Some(div) = field.div {
        v *= div;
    }
    v
}

fn round_half_away_from_zero(v: f64) -> i64 {
    if v >= 0.0 {
        (v + 0.5).floor() as i64
    } else {
        (v - 0.5).ceil() as i64
    }
}
