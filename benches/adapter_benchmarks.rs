use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use graphbench::sql::parse_statement;
use graphbench::{
    open_adapter, AdapterKind, BenchConfig, BenchmarkEngine, EngineConfig, RecordPayload, RecordSource, SharedBuffer,
    Stage, StatsReporter,
};
use tokio::runtime::Runtime;

/// Benchmark the INSERT stage per adapter
fn bench_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("insert");
    group.sample_size(10);

    for kind in [AdapterKind::Embedded, AdapterKind::Traversal, AdapterKind::Remote] {
        let payloads: Vec<String> = RecordSource::Embedded
            .produce(1000)
            .unwrap()
            .map(|r| r.unwrap().encode())
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(kind), &payloads, |b, payloads| {
            b.iter(|| {
                rt.block_on(async {
                    let config = BenchConfig { adapter: kind, ..BenchConfig::default() };
                    let adapter = open_adapter(&config).await.unwrap();
                    let ids = adapter.insert(payloads).await.unwrap();
                    criterion::black_box(ids.len());
                })
            });
        });
    }
    group.finish();
}

/// Benchmark a complete pipeline run
fn bench_pipeline(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    for limit in [100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(limit), &limit, |b, &limit| {
            b.iter(|| {
                rt.block_on(async {
                    let adapter = open_adapter(&BenchConfig::default()).await.unwrap();
                    let config = EngineConfig {
                        limit,
                        stages: Stage::PIPELINE.into_iter().collect(),
                        ..EngineConfig::default()
                    };
                    let report = BenchmarkEngine::new(adapter.as_ref(), config)
                        .run(&mut StatsReporter::with_sink(SharedBuffer::new()))
                        .await
                        .unwrap();
                    criterion::black_box(report.stats);
                })
            });
        });
    }
    group.finish();
}

/// Benchmark statement parsing
fn bench_parse(c: &mut Criterion) {
    let statements = [
        "SELECT FROM inputstructure",
        "SELECT count(*) AS count FROM predictionstructure",
        "SELECT expand(inE('e_endpoint')) FROM ?",
        "INSERT INTO predictionstructure SET json = ?, alerts = ?",
        "CREATE EDGE e_endpoint FROM ? TO ?",
    ];
    c.bench_function("parse_statement", |b| {
        b.iter(|| {
            for text in &statements {
                criterion::black_box(parse_statement(text).unwrap());
            }
        });
    });
}

/// Benchmark payload encoding
fn bench_encode(c: &mut Criterion) {
    let payload = RecordPayload::new(graphbench::records::RECORD_TEMPLATE);
    c.bench_function("payload_encode", |b| {
        b.iter(|| criterion::black_box(payload.encode()));
    });
}

criterion_group!(benches, bench_insert, bench_pipeline, bench_parse, bench_encode);
criterion_main!(benches);
