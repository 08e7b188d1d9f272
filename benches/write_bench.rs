// Write performance benchmarks for mtable

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mtable::{CompressionType, Sorter, SorterOptions, TableWriter, WriterOptions};
use rand::seq::SliceRandom;
use std::hint::black_box;
use tempfile::TempDir;

fn benchmark_sequential_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_write");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut run = 0u64;
            b.iter(|| {
                run += 1;
                let path = temp_dir.path().join(format!("t{}.mtbl", run));
                let mut writer = TableWriter::new(&path, WriterOptions::default()).unwrap();
                for i in 0..size {
                    let key = format!("key{:08}", i);
                    let value = format!("value{:08}", i);
                    writer.add(key.as_bytes(), value.as_bytes()).unwrap();
                }
                black_box(writer.finalize().unwrap());
                std::fs::remove_file(&path).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");
    let size = 10000;

    for compression in CompressionType::ALL {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::from_parameter(compression), |b| {
            let temp_dir = TempDir::new().unwrap();
            let mut run = 0u64;
            b.iter(|| {
                run += 1;
                let path = temp_dir.path().join(format!("t{}.mtbl", run));
                let options = WriterOptions::new().compression(compression);
                let mut writer = TableWriter::new(&path, options).unwrap();
                for i in 0..size {
                    let key = format!("key{:08}", i);
                    let value = format!("value{:08}_with_some_padding", i);
                    writer.add(key.as_bytes(), value.as_bytes()).unwrap();
                }
                black_box(writer.finalize().unwrap());
                std::fs::remove_file(&path).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_sorter(c: &mut Criterion) {
    let mut group = c.benchmark_group("sorter");
    let size = 10000;

    let mut keys: Vec<String> = (0..size).map(|i| format!("key{:08}", i)).collect();
    keys.shuffle(&mut rand::rng());

    for (name, max_memory) in [("in_memory", 64 * 1024 * 1024), ("spilling", 64 * 1024)] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(name, |b| {
            let temp_dir = TempDir::new().unwrap();
            let mut run = 0u64;
            b.iter(|| {
                run += 1;
                let options = SorterOptions::new().temp_dir(temp_dir.path()).max_memory(max_memory);
                let mut sorter = Sorter::new(options).unwrap();
                for key in &keys {
                    sorter.add(key.as_bytes(), b"value").unwrap();
                }

                let path = temp_dir.path().join(format!("t{}.mtbl", run));
                let mut writer = TableWriter::new(&path, WriterOptions::default()).unwrap();
                sorter.write(&mut writer).unwrap();
                sorter.close().unwrap();
                black_box(writer.finalize().unwrap());
                std::fs::remove_file(&path).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_sequential_write, benchmark_compression, benchmark_sorter);
criterion_main!(benches);
