// Copyright 2026 the Format Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use format_tape::builder::BuildConfig;
use format_tape::cache::FormatCache;
use format_tape::host::ValueHost;
use format_tape::parser::Mode;
use format_tape::trace::{TraceMask, TraceOutcome, TraceSink};
use format_tape::value::Value;
use format_tape::vm::{Limits, Packer, Unpacker, compile_pack, compile_unpack};

fn bench_templates(c: &mut Criterion) {
    bench_compile(c);
    bench_cache_hit(c);
    bench_pack_bytes_star(c);
    bench_pack_bytes_unroll_threshold(c);
    bench_pack_bytes_traced_run(c);
    bench_pack_record(c);
    bench_unpack_words_star(c);
    bench_unpack_record(c);
    bench_base64_round_trip(c);
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for format in ["C", "n C2 a*", "N n (C a4)6 Z* m0 U*"] {
        group.bench_with_input(BenchmarkId::from_parameter(format), format, |b, format| {
            b.iter(|| {
                let compiled = compile_pack(format.as_bytes(), &BuildConfig::default()).unwrap();
                black_box(compiled);
            });
        });
    }
    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let cache = FormatCache::default();
    let format = b"N n (C a4)6 Z* m0 U*";
    cache.pack(format).unwrap();
    c.bench_function("cache_hit", |b| {
        b.iter(|| black_box(cache.pack(format).unwrap()));
    });
}

fn bench_pack_bytes_star(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_bytes_star");
    let compiled = compile_pack(b"C*", &BuildConfig::default()).unwrap();
    for &len in &[16_usize, 256, 4096] {
        let values = byte_values(len);
        let mut packer = Packer::new(ValueHost::new(), wide_open_limits());
        group.bench_with_input(BenchmarkId::from_parameter(len), &values, |b, values| {
            b.iter(|| {
                let out = packer.run(&compiled, values, TraceMask::NONE, None).unwrap();
                black_box(out);
            });
        });
    }
    group.finish();
}

fn bench_pack_bytes_unroll_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_bytes_unroll_threshold");
    let values = byte_values(64);
    for &threshold in &[0_usize, 4, 64] {
        let config = BuildConfig {
            unroll_threshold: threshold,
        };
        let compiled = compile_pack(b"C64", &config).unwrap();
        let mut packer = Packer::new(ValueHost::new(), wide_open_limits());
        group.bench_with_input(BenchmarkId::from_parameter(threshold), &values, |b, values| {
            b.iter(|| {
                let out = packer.run(&compiled, values, TraceMask::NONE, None).unwrap();
                black_box(out);
            });
        });
    }
    group.finish();
}

fn bench_pack_bytes_traced_run(c: &mut Criterion) {
    let compiled = compile_pack(b"C*", &BuildConfig::default()).unwrap();
    let values = byte_values(256);
    let mut packer = Packer::new(ValueHost::new(), wide_open_limits());
    let mut sink = CountingRuns::default();
    let mask = sink.mask();
    c.bench_function("pack_bytes_traced_run", |b| {
        b.iter(|| {
            let out = packer
                .run(&compiled, &values, mask, Some(&mut sink))
                .unwrap();
            black_box(out);
        });
    });
}

fn bench_pack_record(c: &mut Criterion) {
    let compiled = compile_pack(b"N n C2 a8 e G", &BuildConfig::default()).unwrap();
    let values = record_values();
    let mut packer = Packer::new(ValueHost::new(), wide_open_limits());
    c.bench_function("pack_record", |b| {
        b.iter(|| {
            let out = packer.run(&compiled, &values, TraceMask::NONE, None).unwrap();
            black_box(out);
        });
    });
}

fn bench_unpack_words_star(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack_words_star");
    let compiled = compile_unpack(b"N*", &BuildConfig::default()).unwrap();
    for &len in &[16_usize, 256, 4096] {
        let bytes: Vec<u8> = (0..len * 4).map(|i| i as u8).collect();
        let mut unpacker = Unpacker::new(ValueHost::new(), wide_open_limits());
        group.bench_with_input(BenchmarkId::from_parameter(len), &bytes, |b, bytes| {
            b.iter(|| {
                let out = unpacker.run(&compiled, bytes, TraceMask::NONE, None).unwrap();
                black_box(out);
            });
        });
    }
    group.finish();
}

fn bench_unpack_record(c: &mut Criterion) {
    let format = b"N n C2 a8 e G";
    let packed = {
        let compiled = compile_pack(format, &BuildConfig::default()).unwrap();
        Packer::new(ValueHost::new(), wide_open_limits())
            .run(&compiled, &record_values(), TraceMask::NONE, None)
            .unwrap()
            .bytes
    };
    let compiled = compile_unpack(format, &BuildConfig::default()).unwrap();
    let mut unpacker = Unpacker::new(ValueHost::new(), wide_open_limits());
    c.bench_function("unpack_record", |b| {
        b.iter(|| {
            let out = unpacker.run(&compiled, &packed, TraceMask::NONE, None).unwrap();
            black_box(out);
        });
    });
}

fn bench_base64_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("base64_round_trip");
    let pack_m = compile_pack(b"m", &BuildConfig::default()).unwrap();
    let unpack_m = compile_unpack(b"m", &BuildConfig::default()).unwrap();
    for &len in &[45_usize, 1024, 16 * 1024] {
        let values = [Value::bytes((0..len).map(|i| i as u8).collect::<Vec<_>>())];
        let mut packer = Packer::new(ValueHost::new(), wide_open_limits());
        let mut unpacker = Unpacker::new(ValueHost::new(), wide_open_limits());
        group.bench_with_input(BenchmarkId::from_parameter(len), &values, |b, values| {
            b.iter(|| {
                let out = packer.run(&pack_m, values, TraceMask::NONE, None).unwrap();
                let back = unpacker
                    .run(&unpack_m, &out.bytes, TraceMask::NONE, None)
                    .unwrap();
                black_box(back);
            });
        });
    }
    group.finish();
}

fn byte_values(len: usize) -> Vec<Value> {
    (0..len).map(|i| Value::Int((i % 256) as i64)).collect()
}

fn record_values() -> Vec<Value> {
    vec![
        Value::Int(0xdead_beef),
        Value::Int(443),
        Value::Int(4),
        Value::Int(1),
        Value::from("payload"),
        Value::Float(0.5),
        Value::Float(-1.25),
    ]
}

fn wide_open_limits() -> Limits {
    Limits {
        poll_interval: u32::MAX,
        ..Limits::default()
    }
}

#[derive(Default)]
struct CountingRuns {
    _count: u64,
}

impl TraceSink for CountingRuns {
    fn mask(&self) -> TraceMask {
        TraceMask::RUN
    }

    fn run_start(&mut self, _mode: Mode, _format: &[u8], _source_len: usize) {
        self._count = self._count.wrapping_add(1);
    }

    fn run_end(&mut self, _mode: Mode, _outcome: TraceOutcome<'_>) {
        self._count = self._count.wrapping_add(1);
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(std::time::Duration::from_millis(300))
        .measurement_time(std::time::Duration::from_millis(1200))
        .sample_size(60);
    targets = bench_templates
}
criterion_main!(benches);
