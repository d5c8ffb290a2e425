use std::hint::black_box;

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use inpout::{Codec, Value, ValueSet};

fn make_record(i: i64) -> Value {
    Value::map([
        ("id", Value::Int(i)),
        ("name", Value::from(format!("user-{i}"))),
        ("score", Value::Float(i as f64 * 0.5)),
        ("tags", Value::Array(vec![Value::from("a"), Value::from("b")])),
    ])
}

fn bench_encode_scalars(c: &mut Criterion) {
    let codec = Codec::global();
    let values = [
        ("int", Value::Int(1_000_000)),
        ("str", Value::from("x".repeat(128))),
        ("bin", Value::Bin(vec![7; 4096])),
    ];

    let mut group = c.benchmark_group("encode scalar");
    for (name, value) in &values {
        group.bench_with_input(BenchmarkId::from_parameter(name), value, |b, v| {
            b.iter(|| black_box(codec.encode(black_box(v)).unwrap()))
        });
    }
    group.finish();
}

fn bench_records(c: &mut Criterion) {
    let codec = Codec::global();

    let mut group = c.benchmark_group("records");
    for size in [10i64, 1_000] {
        let value = Value::Array((0..size).map(make_record).collect());
        let bytes = codec.encode(&value).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &value, |b, v| {
            b.iter(|| black_box(codec.encode(black_box(v)).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(codec.decode(black_box(bytes)).unwrap()))
        });
    }
    group.finish();
}

fn bench_extensions(c: &mut Criterion) {
    let codec = Codec::global();
    let set: ValueSet = (0..1_000).map(Value::Int).collect();
    let set = Value::ext(set);
    let ts = Value::ext(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let set_bytes = codec.encode(&set).unwrap();

    c.bench_function("set 1000 encode", |b| {
        b.iter(|| black_box(codec.encode(black_box(&set)).unwrap()))
    });
    c.bench_function("set 1000 decode", |b| {
        b.iter(|| black_box(codec.decode(black_box(&set_bytes)).unwrap()))
    });
    c.bench_function("timestamp roundtrip", |b| {
        b.iter(|| {
            let bytes = codec.encode(black_box(&ts)).unwrap();
            black_box(codec.decode(&bytes).unwrap());
        })
    });
}

fn bench_stream_decoder(c: &mut Criterion) {
    let codec = Codec::global();
    let mut encoder = codec.make_encoder();
    let mut buffer = Vec::new();
    for i in 0..1_000 {
        encoder.encode_into(&make_record(i), &mut buffer).unwrap();
    }

    c.bench_function("stream decode 1000 records", |b| {
        b.iter(|| {
            let count = codec
                .make_decoder(black_box(&buffer[..]))
                .map(|v| v.unwrap())
                .count();
            black_box(count);
        })
    });
}

criterion_group!(
    benches,
    bench_encode_scalars,
    bench_records,
    bench_extensions,
    bench_stream_decoder
);
criterion_main!(benches);
