use std::collections::BTreeMap;

use payload_schema::bits::Endian;
use payload_schema::descriptor;
use payload_schema::encoder;
use payload_schema::field::{build, Case};
use payload_schema::field::{Field, FieldType};
use payload_schema::schema::Schema;
use payload_schema::value::Value;
use payload_schema::{decoder, CompileError, DecodeError, EncodeError};

#[test]
fn scenario_scaled_sensor_reading() {
    let schema = Schema::compile("s", Endian::Big, vec![build::u16("temperature").with_mult(0.1)]).unwrap();
    let out = decoder::decode(&schema, &[0x01, 0x2C]).unwrap();
    assert_eq!(out.get("temperature"), Some(&Value::Float(30.0)));
}

#[test]
fn scenario_signed_offset_reading() {
    let schema = Schema::compile("s", Endian::Big, vec![build::s16("delta").with_mult(0.01)]).unwrap();
    let out = decoder::decode(&schema, &[0xFF, 0x9C]).unwrap();
    let value = out.get("delta").unwrap().as_f64().unwrap();
    assert!((value - (-1.0)).abs() < 1e-6);
}

#[test]
fn scenario_bitfield_status_byte() {
    let fields = vec![
        build::bitfield("low_battery", 0, 1, false),
        build::bitfield("charging", 1, 1, false),
        build::bitfield("mode", 2, 2, true),
    ];
    let schema = Schema::compile("s", Endian::Big, fields).unwrap();
    let out = decoder::decode(&schema, &[0b0000_0111]).unwrap();
    assert_eq!(out.get("low_battery"), Some(&Value::UInt(1)));
    assert_eq!(out.get("charging"), Some(&Value::UInt(1)));
    assert_eq!(out.get("mode"), Some(&Value::UInt(1)));
}

#[test]
fn scenario_enum_lookup() {
    let schema = Schema::compile(
        "s",
        Endian::Big,
        vec![Field::new("state", FieldType::Enum { size: 1 })
            .with_lookup(vec![(0, "idle".to_string()), (1, "active".to_string())])],
    )
    .unwrap();
    let out = decoder::decode(&schema, &[1]).unwrap();
    assert_eq!(out.get("state"), Some(&Value::Str("active".to_string())));
}

#[test]
fn scenario_match_dispatch_by_message_type() {
    let fields = vec![
        build::u8("msg_type").with_var("msg_type"),
        Field::new("dispatch", FieldType::Match).with_match(
            "msg_type",
            vec![
                Case::single(1, 2, 1),
                Case::single(2, 3, 1),
                Case::default(4, 0),
            ],
        ),
        build::u16("temperature").with_mult(0.1),
        build::u16("humidity").with_mult(0.1),
    ];
    let schema = Schema::compile("s", Endian::Big, fields).unwrap();

    let temp_reading = decoder::decode(&schema, &[1, 0x00, 0x64]).unwrap();
    assert_eq!(temp_reading.get("temperature"), Some(&Value::Float(10.0)));
    assert!(temp_reading.get("humidity").is_none());

    let humidity_reading = decoder::decode(&schema, &[2, 0x00, 0xC8]).unwrap();
    assert_eq!(humidity_reading.get("humidity"), Some(&Value::Float(20.0)));
}

#[test]
fn scenario_ascii_and_bytes() {
    let fields = vec![build::ascii("label", 4), build::bytes("raw", 2)];
    let schema = Schema::compile("s", Endian::Big, fields).unwrap();
    let out = decoder::decode(&schema, b"OK\0\0\xDE\xAD").unwrap();
    assert_eq!(out.get("label"), Some(&Value::Str("OK".to_string())));
    assert_eq!(out.get("raw"), Some(&Value::Bytes(vec![0xDE, 0xAD])));
}

#[test]
fn scenario_udec_and_sdec_values() {
    let schema = Schema::compile("s", Endian::Big, vec![build::udec("u"), build::sdec("s")]).unwrap();
    let out = decoder::decode(&schema, &[0x37, 0xD7]).unwrap();
    assert_eq!(out.get("u"), Some(&Value::Float(3.7)));
    let sdec = out.get("s").unwrap().as_f64().unwrap();
    assert!((sdec - (-2.3)).abs() < 1e-9);

    let mut values = BTreeMap::new();
    values.insert("u".to_string(), Value::Float(3.7));
    values.insert("s".to_string(), Value::Float(-2.3));
    let bytes = encoder::encode(&schema, &values).unwrap();
    assert_eq!(bytes, vec![0x37, 0xD7]);
}

#[test]
fn scenario_hex_and_base64_decode_only() {
    let fields = vec![build::hex("h", 2), build::base64("b64", 3)];
    let schema = Schema::compile("s", Endian::Big, fields).unwrap();
    let out = decoder::decode(&schema, &[0xDE, 0xAD, b'f', b'o', b'o']).unwrap();
    assert_eq!(out.get("h"), Some(&Value::Str("DEAD".to_string())));
    assert_eq!(out.get("b64"), Some(&Value::Str("Zm9v".to_string())));

    let mut values = BTreeMap::new();
    values.insert("h".to_string(), Value::Str("DEAD".to_string()));
    values.insert("b64".to_string(), Value::Str("Zm9v".to_string()));
    assert_eq!(
        encoder::encode(&schema, &values),
        Err(EncodeError::UnsupportedType("h".to_string()))
    );
}

#[test]
fn scenario_binary_descriptor_truncation_is_tolerated() {
    let schema = Schema::compile(
        "s",
        Endian::Big,
        vec![
            Field::new("temperature", FieldType::UInt(2)).with_mult(0.1),
            Field::new("humidity", FieldType::UInt(1)),
        ],
    )
    .unwrap();
    let mut bytes = descriptor::to_binary(&schema);
    bytes.truncate(bytes.len() - 2);
    let loaded = descriptor::load_binary(&bytes).unwrap();
    assert_eq!(loaded.fields.len(), 1);
    assert_eq!(loaded.fields[0].name, "temperature");
}

#[test]
fn scenario_buffer_underrun_is_reported_not_panicked() {
    let schema = Schema::compile("s", Endian::Big, vec![build::u32("x")]).unwrap();
    assert_eq!(decoder::decode(&schema, &[0x00]), Err(DecodeError::BufferUnderrun));
}

#[test]
fn scenario_bad_descriptor_header_is_rejected() {
    assert_eq!(descriptor::load_binary(&[0, 0, 0]), Err(CompileError::InvalidHeader));
}

#[test]
fn scenario_descriptor_round_trip_with_lookup_and_addend() {
    let schema = Schema::compile(
        "s",
        Endian::Big,
        vec![
            Field::new("mode", FieldType::Enum { size: 1 })
                .with_lookup(vec![(0, "off".to_string()), (1, "on".to_string())]),
            Field::new("pressure", FieldType::UInt(2)).with_mult(0.1).with_add(-50.0),
        ],
    )
    .unwrap();
    let bytes = descriptor::to_binary(&schema);
    let loaded = descriptor::load_binary(&bytes).unwrap();
    assert_eq!(loaded.fields.len(), 2);
    assert_eq!(loaded.fields[0].lookup, vec![(0, "off".to_string()), (1, "on".to_string())]);
    assert!((loaded.fields[1].add.unwrap() - (-50.0)).abs() < 1e-6);
}
