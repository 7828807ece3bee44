use brc_aggregator::models::{KeyStorage, KeyTable};
use brc_aggregator::processors::ParallelProcessor;
use brc_aggregator::readers::{decode, ByteScanner, InMemorySource, SimdLevel};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const STATIONS: [&str; 12] = [
    "Abha",
    "Bulawayo",
    "Cracow",
    "Dar es Salaam",
    "Hamburg",
    "Istanbul",
    "Las Palmas de Gran Canaria",
    "Palembang",
    "Petropavlovsk-Kamchatsky",
    "St. John's",
    "Wrocław",
    "Ürümqi",
];

// Create measurement lines for benchmarking
fn create_measurements(rows: usize) -> Vec<u8> {
    let mut text = String::with_capacity(rows * 16);
    for i in 0..rows {
        let tenths = (i * 37 % 1999) as i32 - 999;
        let sign = if tenths < 0 { "-" } else { "" };
        text.push_str(&format!(
            "{};{}{}.{}\n",
            STATIONS[i % STATIONS.len()],
            sign,
            tenths.abs() / 10,
            tenths.abs() % 10
        ));
    }
    text.into_bytes()
}

fn benchmark_decoder(c: &mut Criterion) {
    let values: Vec<&[u8]> = vec![
        &b"1.2\nXXXXX"[..],
        &b"-1.2\nXXXX"[..],
        &b"12.3\nXXXX"[..],
        &b"-12.3\r\nXX"[..],
    ];

    c.bench_function("decode_value", |b| {
        b.iter(|| {
            let mut sum = 0i64;
            for value in &values {
                let (tenths, consumed) = decode(black_box(value));
                sum += tenths as i64 + consumed as i64;
            }
            black_box(sum)
        })
    });
}

fn benchmark_scanner_levels(c: &mut Criterion) {
    let data = create_measurements(10_000);
    let mut group = c.benchmark_group("scan_delimiters");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for level in SimdLevel::available() {
        let scanner = ByteScanner::with_level(level);
        group.bench_with_input(BenchmarkId::from_parameter(level), &data, |b, data| {
            b.iter(|| {
                let mut cursor = 0;
                let mut found = 0usize;
                while let Some(semicolon) = scanner.index_of_delimiter(data, cursor) {
                    found += 1;
                    cursor = semicolon + 1;
                }
                black_box(found)
            })
        });
    }
    group.finish();
}

fn benchmark_key_table(c: &mut Criterion) {
    let keys: Vec<String> = (0..10_000).map(|i| format!("station-{}", i % 413)).collect();

    c.bench_function("key_table_accumulate", |b| {
        b.iter(|| {
            let mut table = KeyTable::new(10_000, KeyStorage::Borrowed);
            for (i, key) in keys.iter().enumerate() {
                if let Ok(acc) = table.get_or_create(key.as_bytes()) {
                    acc.apply(i as i32 % 999);
                }
            }
            black_box(table.len())
        })
    });
}

fn benchmark_end_to_end(c: &mut Criterion) {
    let source = InMemorySource::new(create_measurements(200_000));
    let mut group = c.benchmark_group("process_in_memory");
    group.sample_size(20);

    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            let processor = ParallelProcessor::new(workers);
            b.iter(|| {
                let report = processor.process_source(&source, None).unwrap();
                black_box(report.len())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_decoder,
    benchmark_scanner_levels,
    benchmark_key_table,
    benchmark_end_to_end
);
criterion_main!(benches);
