use criterion::{black_box, criterion_group, criterion_main, Criterion};

use payload_schema::bits::Endian;
use payload_schema::decoder;
use payload_schema::encoder;
use payload_schema::field::build;
use payload_schema::schema::Schema;
use payload_schema::value::Value;
use std::collections::BTreeMap;

fn schema_with_fields(count: usize) -> Schema {
    let fields = (0..count)
        .map(|i| build::u16(format!("field_{i}")).with_mult(0.1))
        .collect();
    Schema::compile("bench", Endian::Big, fields).unwrap()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for field_count in [1usize, 10, 20, 32] {
        let schema = schema_with_fields(field_count);
        let data = vec![0x12u8; field_count * 2];
        group.bench_function(format!("{field_count}_fields"), |b| {
            b.iter(|| decoder::decode(black_box(&schema), black_box(&data)).unwrap())
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for field_count in [1usize, 10, 20, 32] {
        let schema = schema_with_fields(field_count);
        let mut values = BTreeMap::new();
        for i in 0..field_count {
            values.insert(format!("field_{i}"), Value::Float(1.0));
        }
        group.bench_function(format!("{field_count}_fields"), |b| {
            b.iter(|| encoder::encode(black_box(&schema), black_box(&values)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
