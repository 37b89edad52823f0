//! The compiled, immutable schema model (component B) plus the human-
//! readable type-string grammar used to build fields by hand.

use crate::bits::Endian;
use crate::errors::CompileError;
use crate::field::{Case, CaseMatch, Field, FieldType};

const MAX_FIELDS: usize = 32;
const MAX_NAME_LEN: usize = 32;

/// An ordered, validated list of fields plus a default byte order.
///
/// A `Schema` is immutable once built: [`Schema::compile`] (or
/// [`crate::descriptor::load_binary`]) is the only way to produce one, and
/// every field in it has already passed [`Field::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub default_endian: Endian,
    pub fields: Vec<Field>,
}

impl Schema {
    /// Validates `fields` against the structural limits and per-field rules
    /// in spec §6, and checks that every `match` field's case ranges point
    /// at real, in-bounds field slices, producing an immutable [`Schema`].
    pub fn compile(name: impl Into<String>, default_endian: Endian, fields: Vec<Field>) -> Result<Self, CompileError> {
        let name = name.into();
        if name.len() > MAX_NAME_LEN {
            return Err(CompileError::NameTooLong);
        }
        if fields.len() > MAX_FIELDS {
            return Err(CompileError::TooManyFields);
        }
        for field in &fields {
            field.validate()?;
        }
        for (idx, field) in fields.iter().enumerate() {
            if matches!(field.ty, FieldType::Match) {
                validate_match_cases(&fields, idx, field)?;
            }
        }
        Ok(Schema { name, default_endian, fields })
    }

    /// Builds a schema from fields already known to be well formed (used by
    /// the binary descriptor loader, which tolerates truncation by simply
    /// stopping early rather than failing compilation).
    pub(crate) fn from_parts(name: String, default_endian: Endian, fields: Vec<Field>) -> Self {
        Schema { name, default_endian, fields }
    }

    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Builds a [`Schema`] one field at a time, the programmatic counterpart to
/// [`crate::descriptor::load_binary`]: `SchemaBuilder::new` plus
/// [`SchemaBuilder::with_endian`] cover `schema_new`/`schema_set_endian`,
/// [`SchemaBuilder::add_field`] covers `schema_add_field`, and
/// [`SchemaBuilder::add_field_from_type_str`] is the builder-level
/// convenience that runs a name + type string straight through
/// [`parse_type_string`] without the caller hand-constructing a [`Field`].
///
/// Sequential bitfields built via the `u<width>:<count>` shorthand carry the
/// `bit_start: 255` sentinel until [`SchemaBuilder::build`] resolves them
/// with [`resolve_sequential_bitfields`], so a builder-assembled schema
/// never hands the decoder or encoder an unresolved sentinel.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    default_endian: Endian,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>, default_endian: Endian) -> Self {
        SchemaBuilder { name: name.into(), default_endian, fields: Vec::new() }
    }

    pub fn with_endian(mut self, default_endian: Endian) -> Self {
        self.default_endian = default_endian;
        self
    }

    pub fn add_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Parses `type_str` through [`parse_type_string`] and appends it as a
    /// field named `name`, with no modifiers, variable binding, or lookup
    /// table attached. Chain `.add_field` instead when the field needs any
    /// of those, since the type string grammar alone has no syntax for them.
    pub fn add_field_from_type_str(mut self, name: impl Into<String>, type_str: &str) -> Result<Self, CompileError> {
        let ty = parse_type_string(type_str)?;
        self.fields.push(Field::new(name, ty));
        Ok(self)
    }

    /// Resolves any sequential-bitfield sentinels and compiles the
    /// accumulated fields into an immutable [`Schema`].
    pub fn build(mut self) -> Result<Schema, CompileError> {
        resolve_sequential_bitfields(&mut self.fields);
        Schema::compile(self.name, self.default_endian, self.fields)
    }
}

const MAX_MATCH_CASES: usize = 16;

fn validate_match_cases(fields: &[Field], match_index: usize, match_field: &Field) -> Result<(), CompileError> {
    if match_field.cases.len() > MAX_MATCH_CASES {
        return Err(CompileError::TooManyCases);
    }
    for case in &match_field.cases {
        if case.field_start + case.field_count > fields.len() {
            return Err(CompileError::InvalidCaseRange);
        }
        if case.field_start <= match_index && match_index < case.field_start + case.field_count {
            return Err(CompileError::InvalidCaseRange);
        }
        if let CaseMatch::List(values) = &case.matcher {
            if values.len() > 8 {
                return Err(CompileError::TooManyMatchValues);
            }
        }
        if let CaseMatch::Range(min, max) = &case.matcher {
            if min == max {
                return Err(CompileError::InvalidCaseRange);
            }
        }
    }
    Ok(())
}

/// A single field built from a parsed type string, before the caller
/// attaches name/endian/modifiers/lookup/match data via [`Field`]'s builder
/// methods.
pub fn parse_type_string(spec: &str) -> Result<FieldType, CompileError> {
    let spec = spec.trim();
    if let Some(rest) = spec.strip_prefix("bits<") {
        // bits<start,width>
        let rest = rest.strip_suffix('>').ok_or(CompileError::UnknownTypeString)?;
        let mut parts = rest.split(',');
        let start: u8 = parts.next().and_then(|s| s.trim().parse().ok()).ok_or(CompileError::UnknownTypeString)?;
        let width: u8 = parts.next().and_then(|s| s.trim().parse().ok()).ok_or(CompileError::UnknownTypeString)?;
        if parts.next().is_some() {
            return Err(CompileError::UnknownTypeString);
        }
        return Ok(FieldType::Bitfield { bit_start: start, bit_width: width });
    }
    if let Some(rest) = spec.strip_prefix("bits:") {
        // bits:width@start
        let mut halves = rest.splitn(2, '@');
        let width: u8 = halves.next().and_then(|s| s.trim().parse().ok()).ok_or(CompileError::UnknownTypeString)?;
        let start: u8 = halves.next().and_then(|s| s.trim().parse().ok()).ok_or(CompileError::UnknownTypeString)?;
        return Ok(FieldType::Bitfield { bit_start: start, bit_width: width });
    }
    if let Some(bracket) = spec.find('[') {
        let (base, rest) = spec.split_at(bracket);
        let rest = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')).ok_or(CompileError::UnknownTypeString)?;
        if base != "u8" {
            return Err(CompileError::UnknownTypeString);
        }
        if let Some(plus) = rest.find("+:") {
            // u8[a+:w] - start a, width w
            let (a, w) = rest.split_at(plus);
            let w = &w[2..];
            let start: u8 = a.trim().parse().map_err(|_| CompileError::UnknownTypeString)?;
            let width: u8 = w.trim().parse().map_err(|_| CompileError::UnknownTypeString)?;
            return Ok(FieldType::Bitfield { bit_start: start, bit_width: width });
        }
        if let Some(colon) = rest.find(':') {
            // u8[a:b] - inclusive bit range a..=b
            let (a, b) = rest.split_at(colon);
            let b = &b[1..];
            let a: u8 = a.trim().parse().map_err(|_| CompileError::UnknownTypeString)?;
            let b: u8 = b.trim().parse().map_err(|_| CompileError::UnknownTypeString)?;
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            return Ok(FieldType::Bitfield { bit_start: start, bit_width: end - start + 1 });
        }
        return Err(CompileError::UnknownTypeString);
    }

    // Sequential bitfield shorthand: u<width>:<count>, packed left-to-right
    // from bit 0 of the current byte by the schema builder, not by the
    // parser itself (the parser has no notion of "current bit offset").
    if let Some(rest) = spec.strip_prefix('u') {
        if let Some(colon) = rest.find(':') {
            let (width_str, count_str) = rest.split_at(colon);
            let count_str = &count_str[1..];
            if let (Ok(width), Ok(_count)) = (width_str.parse::<u8>(), count_str.parse::<u8>()) {
                if width > 0 && width <= 8 {
                    // bit_start is resolved later; 255 is the "unresolved" sentinel.
                    return Ok(FieldType::Bitfield { bit_start: 255, bit_width: width });
                }
            }
        }
    }

    Ok(match spec {
        "u8" => FieldType::UInt(1),
        "u16" => FieldType::UInt(2),
        "u24" => FieldType::UInt(3),
        "u32" => FieldType::UInt(4),
        "u64" => FieldType::UInt(8),
        "s8" | "i8" => FieldType::SInt(1),
        "s16" | "i16" => FieldType::SInt(2),
        "s24" | "i24" => FieldType::SInt(3),
        "s32" | "i32" => FieldType::SInt(4),
        "s64" | "i64" => FieldType::SInt(8),
        "f16" | "half" => FieldType::F16,
        "f32" | "float" => FieldType::F32,
        "f64" | "double" => FieldType::F64,
        "bool" => FieldType::Bool { bit_start: 0 },
        "udec" => FieldType::UDec,
        "sdec" => FieldType::SDec,
        "match" => FieldType::Match,
        _ => return Err(CompileError::UnknownTypeString),
    })
}

/// Resolves any `Bitfield { bit_start: 255, .. }` sentinels left by the
/// `u<width>:<count>` sequential shorthand, packing fields left-to-right
/// starting at bit 0 of whatever byte is "current" for that run, and
/// wrapping to a new byte (and marking the last field of the byte as the
/// one that advances the cursor) whenever a field would not fit in the
/// bits remaining.
pub fn resolve_sequential_bitfields(fields: &mut [Field]) {
    let mut bit_cursor: u8 = 0;
    let mut run_start: Option<usize> = None;
    for idx in 0..fields.len() {
        let is_sequential = matches!(fields[idx].ty, FieldType::Bitfield { bit_start: 255, .. });
        if !is_sequential {
            if let Some(start) = run_start.take() {
                mark_last_consumer(fields, start, idx);
            }
            bit_cursor = 0;
            continue;
        }
        if run_start.is_none() {
            run_start = Some(idx);
            bit_cursor = 0;
        }
        let width = match fields[idx].ty {
            FieldType::Bitfield { bit_width, .. } => bit_width,
            _ => unreachable!(),
        };
        if bit_cursor + width > 8 {
            mark_last_consumer(fields, run_start.unwrap(), idx);
            run_start = Some(idx);
            bit_cursor = 0;
        }
        fields[idx].ty = FieldType::Bitfield { bit_start: bit_cursor, bit_width: width };
        fields[idx].consume = false;
        bit_cursor += width;
    }
    if let Some(start) = run_start {
        mark_last_consumer(fields, start, fields.len());
    }
}

fn mark_last_consumer(fields: &mut [Field], start: usize, end: usize) {
    if end > start {
        fields[end - 1].consume = true;
    }
}

/// Convenience match-case constructors re-exported for callers that build
/// schemas entirely from [`parse_type_string`] plus hand-written cases.
pub use crate::field::build;
