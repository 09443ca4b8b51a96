use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use csv_record_source::ingestion::csv::{ParserConfig, RecordParser};
use csv_record_source::ingestion::{CsvReader, InMemorySource, ReaderOptions};
use csv_record_source::ReaderError;
use tokio_util::sync::CancellationToken;

fn build_csv(rows: usize) -> String {
    let mut s = String::from("id,name,score,active\n");
    for i in 0..rows {
        s.push_str(&format!("{i},user_{i},{}.5,{}\n", i % 100, i % 2 == 0));
    }
    s
}

async fn read_all(reader: &CsvReader) -> usize {
    let cancel = CancellationToken::new();
    let mut n = 0;
    while reader.connect(&cancel).await.is_ok() {
        loop {
            match reader.read(&cancel).await {
                Ok((msg, _ack)) => {
                    black_box(msg);
                    n += 1;
                }
                Err(ReaderError::NotConnected) => break,
                Err(e) => panic!("unexpected read error: {e}"),
            }
        }
    }
    n
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_parser");
    for rows in [1_000usize, 10_000] {
        let input = build_csv(rows);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &input, |b, input| {
            b.iter(|| {
                let parser = RecordParser::new(input.as_bytes(), ParserConfig::default());
                black_box(parser.count())
            })
        });
    }
    group.finish();
}

fn bench_reader(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("csv_reader");
    for rows in [1_000usize, 10_000] {
        let input = build_csv(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &input, |b, input| {
            b.iter(|| {
                let reader = CsvReader::new(
                    InMemorySource::new(vec![input.clone()]),
                    ReaderOptions::default(),
                );
                let n = rt.block_on(read_all(&reader));
                assert_eq!(n, rows);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parser, bench_reader);
criterion_main!(benches);
