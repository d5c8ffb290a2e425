use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use inpout::{load_many, save_many, LoadOptions, SaveOptions, Value};
use tempfile::tempdir;

fn make_values(n: i64) -> Vec<Value> {
    (0..n)
        .map(|i| {
            Value::map([
                ("id", Value::Int(i)),
                ("payload", Value::from("lorem ipsum dolor sit amet ".repeat(4))),
            ])
        })
        .collect()
}

fn bench_save(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let values = make_values(1_000);

    let mut group = c.benchmark_group("save_many 1000");
    for compression in [false, true] {
        let name = if compression { "lz4" } else { "raw" };
        let path = dir.path().join(format!("save.{name}"));
        let opts = SaveOptions {
            compression,
            ..SaveOptions::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(name), &opts, |b, opts| {
            b.iter(|| black_box(save_many(&values, &path, opts).unwrap()))
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let values = make_values(1_000);

    let mut group = c.benchmark_group("load_many 1000");
    for compression in [false, true] {
        let name = if compression { "lz4" } else { "raw" };
        let path = dir.path().join(format!("load.{name}"));
        let save = SaveOptions {
            compression,
            ..SaveOptions::default()
        };
        save_many(&values, &path, &save).unwrap();
        let load = LoadOptions {
            compression,
            ..LoadOptions::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(name), &load, |b, load| {
            b.iter(|| {
                let count = load_many(&path, load).unwrap().map(|v| v.unwrap()).count();
                black_box(count);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);
