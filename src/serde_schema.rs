//! JSON/YAML-friendly schema definitions (feature `serde`).
//!
//! These DTOs mirror [`crate::field`] and [`crate::schema`] but use plain,
//! serializable shapes (tagged enums, owned strings) instead of the
//! internal types, so a schema can be authored as data and loaded at
//! startup without writing Rust. [`SchemaDef::compile`] is the bridge back
//! to a real [`Schema`].

use serde::{Deserialize, Serialize};

use crate::bits::Endian;
use crate::errors::CompileError;
use crate::field::{Case, CaseMatch, Field, FieldType};
use crate::schema::{self, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndianDef {
    Big,
    Little,
}

impl From<EndianDef> for Endian {
    fn from(value: EndianDef) -> Self {
        match value {
            EndianDef::Big => Endian::Big,
            EndianDef::Little => Endian::Little,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CaseMatchDef {
    Single { value: i64 },
    List { values: Vec<i64> },
    Range { min: i64, max: i64 },
    Default,
}

impl From<CaseMatchDef> for CaseMatch {
    fn from(value: CaseMatchDef) -> Self {
        match value {
            CaseMatchDef::Single { value } => CaseMatch::Single(value),
            CaseMatchDef::List { values } => CaseMatch::List(values),
            CaseMatchDef::Range { min, max } => CaseMatch::Range(min, max),
            CaseMatchDef::Default => CaseMatch::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDef {
    #[serde(flatten)]
    pub matcher: CaseMatchDef,
    pub field_start: usize,
    pub field_count: usize,
}

impl From<CaseDef> for Case {
    fn from(value: CaseDef) -> Self {
        Case {
            matcher: value.matcher.into(),
            field_start: value.field_start,
            field_count: value.field_count,
        }
    }
}

/// Either a type-string (`"u16"`, `"u8[2:4]"`, ...) or an explicit type
/// tag; [`FieldDef::compile`] accepts whichever the caller supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldTypeDef {
    TypeString(String),
    Explicit {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        size: Option<u8>,
        #[serde(default)]
        bit_start: Option<u8>,
        #[serde(default)]
        bit_width: Option<u8>,
    },
}

impl FieldTypeDef {
    fn compile(&self) -> Result<FieldType, CompileError> {
        match self {
            FieldTypeDef::TypeString(s) => schema::parse_type_string(s),
            FieldTypeDef::Explicit { type_name, size, bit_start, bit_width } => match type_name.as_str() {
                "skip" => Ok(FieldType::Skip { size: size.unwrap_or(0) as usize }),
                "ascii" => Ok(FieldType::Ascii { size: size.unwrap_or(0) as usize }),
                "hex" => Ok(FieldType::Hex { size: size.unwrap_or(0) as usize }),
                "base64" => Ok(FieldType::Base64 { size: size.unwrap_or(0) as usize }),
                "bytes" => Ok(FieldType::Bytes { size: size.unwrap_or(0) as usize }),
                "enum" => Ok(FieldType::Enum { size: size.unwrap_or(1) }),
                "bitfield" => Ok(FieldType::Bitfield {
                    bit_start: bit_start.unwrap_or(0),
                    bit_width: bit_width.unwrap_or(1),
                }),
                "bool" => Ok(FieldType::Bool { bit_start: bit_start.unwrap_or(0) }),
                other => schema::parse_type_string(other),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldTypeDef,
    #[serde(default)]
    pub endian: Option<EndianDef>,
    #[serde(default = "default_true")]
    pub consume: bool,
    #[serde(default)]
    pub mult: Option<f64>,
    #[serde(default)]
    pub div: Option<f64>,
    #[serde(default)]
    pub add: Option<f64>,
    #[serde(default)]
    pub var: Option<String>,
    #[serde(default)]
    pub lookup: Vec<(i64, String)>,
    #[serde(default)]
    pub match_var: Option<String>,
    #[serde(default)]
    pub cases: Vec<CaseDef>,
}

fn default_true() -> bool {
    true
}

impl FieldDef {
    fn compile(self) -> Result<Field, CompileError> {
        let ty = self.ty.compile()?;
        let mut field = Field::new(self.name, ty).with_consume(self.consume);
        if let Some(endian) = self.endian {
            field = field.with_endian(endian.into());
        }
        if let Some(mult) = self.mult {
            field = field.with_mult(mult);
        }
        if let Some(div) = self.div {
            field = field.with_div(div);
        }
        if let Some(add) = self.add {
            field = field.with_add(add);
        }
        if let Some(var) = self.var {
            field = field.with_var(var);
        }
        if !self.lookup.is_empty() {
            field = field.with_lookup(self.lookup);
        }
        if let Some(match_var) = self.match_var {
            let cases = self.cases.into_iter().map(Case::from).collect();
            field = field.with_match(match_var, cases);
        }
        Ok(field)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    pub name: String,
    #[serde(default = "default_endian")]
    pub endian: EndianDef,
    pub fields: Vec<FieldDef>,
}

fn default_endian() -> EndianDef {
    EndianDef::Big
}

impl SchemaDef {
    /// Compiles this definition into a [`Schema`], resolving any
    /// sequential-bitfield shorthand before running the usual structural
    /// validation.
    pub fn compile(self) -> Result<Schema, CompileError> {
        let mut fields: Vec<Field> = self.fields.into_iter().map(FieldDef::compile).collect::<Result<_, _>>()?;
        schema::resolve_sequential_bitfields(&mut fields);
        Schema::compile(self.name, self.endian.into(), fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_schema() {
        let def = SchemaDef {
            name: "sensor".to_string(),
            endian: EndianDef::Big,
            fields: vec![FieldDef {
                name: "temperature".to_string(),
                ty: FieldTypeDef::TypeString("u16".to_string()),
                endian: None,
                consume: true,
                mult: Some(0.1),
                div: None,
                add: None,
                var: None,
                lookup: Vec::new(),
                match_var: None,
                cases: Vec::new(),
            }],
        };
        let schema = def.compile().unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.fields[0].name, "temperature");
    }

    #[test]
    fn round_trips_through_serde_json_value() {
        let def = SchemaDef {
            name: "sensor".to_string(),
            endian: EndianDef::Little,
            fields: vec![FieldDef {
                name: "humidity".to_string(),
                ty: FieldTypeDef::TypeString("u8".to_string()),
                endian: None,
                consume: true,
                mult: None,
                div: None,
                add: None,
                var: None,
                lookup: Vec::new(),
                match_var: None,
                cases: Vec::new(),
            }],
        };
        let value = serde_json::to_value(&def).unwrap();
        let back: SchemaDef = serde_json::from_value(value).unwrap();
        assert_eq!(def, back);
    }
}
