//! End-to-end runs of the stage pipeline

mod common;

use std::io::{self, Write};

use common::CountingAdapter;
use graphbench::{
    open_adapter, AdapterKind, BenchConfig, BenchError, BenchmarkEngine, EngineConfig, GraphStats, RecordSource,
    SharedBuffer, Stage, StageSet, StatsReporter,
};

fn stages(list: &[Stage]) -> StageSet {
    list.iter().copied().collect()
}

fn three_endpoints() -> Vec<String> {
    vec!["Carcinogenicity".into(), "Hepatoxicity".into(), "Mutagenicity".into()]
}

#[tokio::test]
async fn test_create_endpoints_and_insert_only() {
    for kind in [AdapterKind::Embedded, AdapterKind::Traversal, AdapterKind::Remote] {
        let adapter = open_adapter(&BenchConfig { adapter: kind, ..BenchConfig::default() }).await.unwrap();
        let config = EngineConfig {
            limit: 5,
            stages: stages(&[Stage::CreateEndpoint, Stage::Insert]),
            endpoints: three_endpoints(),
            ..EngineConfig::default()
        };
        let buffer = SharedBuffer::new();
        let report = BenchmarkEngine::new(adapter.as_ref(), config)
            .run(&mut StatsReporter::with_sink(buffer.clone()))
            .await
            .unwrap();

        assert_eq!(report.stats, GraphStats { structures: 5, predictions: 0, endpoints: 3 }, "{}", kind);
        assert_eq!(report.endpoints, 3);
        assert_eq!(report.structures, 5);
        let ran: Vec<Stage> = report.timings.iter().map(|t| t.stage).collect();
        assert_eq!(ran, vec![Stage::CreateEndpoint, Stage::Insert]);

        let output = buffer.contents();
        assert!(output.contains("Insert input structures (5)"));
        assert_eq!(
            output.lines().last(),
            Some("No of structures 5. No of prediction structures 0. No of endpoints 3.")
        );
    }
}

#[tokio::test]
async fn test_full_pipeline() {
    for kind in [AdapterKind::Embedded, AdapterKind::Traversal, AdapterKind::Remote] {
        let adapter = open_adapter(&BenchConfig { adapter: kind, ..BenchConfig::default() }).await.unwrap();
        let config = EngineConfig { limit: 7, ..EngineConfig::default() };
        let report = BenchmarkEngine::new(adapter.as_ref(), config)
            .run(&mut StatsReporter::with_sink(SharedBuffer::new()))
            .await
            .unwrap();

        assert_eq!(report.stats, GraphStats { structures: 7, predictions: 7, endpoints: 7 }, "{}", kind);
        let ran: Vec<Stage> = report.timings.iter().map(|t| t.stage).collect();
        assert_eq!(
            ran,
            vec![
                Stage::Delete,
                Stage::CreateEndpoint,
                Stage::Insert,
                Stage::GeneratePrediction,
                Stage::Query,
                Stage::Query,
                Stage::Find,
                Stage::Find,
            ]
        );
        // 7 predictions + 7 endpoint edges + alerts 1+2+2+1+1+2+2
        assert_eq!(report.timings[5].items, 25);
        // first endpoint gets exactly one of the seven predictions
        assert_eq!(report.timings[7].items, 1);
    }
}

#[tokio::test]
async fn test_repeated_runs_start_from_empty() {
    let adapter = open_adapter(&BenchConfig::default()).await.unwrap();
    for _ in 0..2 {
        let config = EngineConfig { limit: 3, endpoints: three_endpoints(), ..EngineConfig::default() };
        let report = BenchmarkEngine::new(adapter.as_ref(), config)
            .run(&mut StatsReporter::with_sink(SharedBuffer::new()))
            .await
            .unwrap();
        assert_eq!(report.stats, GraphStats { structures: 3, predictions: 3, endpoints: 3 });
    }
}

#[tokio::test]
async fn test_skipped_stages_read_back_existing_data() {
    let adapter = open_adapter(&BenchConfig::default()).await.unwrap();
    let seed = EngineConfig {
        limit: 4,
        stages: stages(&[Stage::CreateEndpoint, Stage::Insert]),
        endpoints: three_endpoints(),
        ..EngineConfig::default()
    };
    BenchmarkEngine::new(adapter.as_ref(), seed)
        .run(&mut StatsReporter::with_sink(SharedBuffer::new()))
        .await
        .unwrap();

    let predict_only = EngineConfig {
        limit: 4,
        stages: stages(&[Stage::GeneratePrediction]),
        endpoints: three_endpoints(),
        ..EngineConfig::default()
    };
    let report = BenchmarkEngine::new(adapter.as_ref(), predict_only)
        .run(&mut StatsReporter::with_sink(SharedBuffer::new()))
        .await
        .unwrap();

    assert_eq!(report.endpoints, 3);
    assert_eq!(report.structures, 4);
    assert_eq!(report.predictions, 4);
    assert_eq!(report.stats, GraphStats { structures: 4, predictions: 4, endpoints: 3 });
}

#[tokio::test]
async fn test_batching_does_not_change_results() {
    let mut results = Vec::new();
    for batch_size in [10_000, 25_000] {
        let adapter = CountingAdapter::new(open_adapter(&BenchConfig::default()).await.unwrap());
        let config = EngineConfig {
            limit: 25_000,
            batch_size,
            stages: stages(&[Stage::CreateEndpoint, Stage::Insert, Stage::GeneratePrediction]),
            ..EngineConfig::default()
        };
        let report = BenchmarkEngine::new(&adapter, config)
            .run(&mut StatsReporter::with_sink(SharedBuffer::new()))
            .await
            .unwrap();
        results.push((report.stats, adapter.inserts(), adapter.predicts()));
    }

    let expected = GraphStats { structures: 25_000, predictions: 25_000, endpoints: 7 };
    assert_eq!(results[0], (expected, 3, 3));
    assert_eq!(results[1], (expected, 1, 1));
}

#[tokio::test]
async fn test_no_endpoints_means_no_predictions() {
    let adapter = open_adapter(&BenchConfig::default()).await.unwrap();
    let config = EngineConfig {
        limit: 3,
        stages: stages(&[Stage::Insert, Stage::GeneratePrediction, Stage::Find]),
        endpoints: vec![],
        ..EngineConfig::default()
    };
    let report = BenchmarkEngine::new(adapter.as_ref(), config)
        .run(&mut StatsReporter::with_sink(SharedBuffer::new()))
        .await
        .unwrap();

    assert_eq!(report.predictions, 0);
    assert_eq!(report.stats, GraphStats { structures: 3, predictions: 0, endpoints: 0 });
    let find: Vec<&str> = report
        .timings
        .iter()
        .filter(|t| t.stage == Stage::Find)
        .map(|t| t.operation.as_str())
        .collect();
    assert_eq!(find, vec!["Search all endpoints"]);
}

#[tokio::test]
async fn test_records_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("records.txt");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{{\"a\":1}}\n{{\"a\":2}}\n{{\"a\":3}}").unwrap();
    drop(file);

    let adapter = open_adapter(&BenchConfig::default()).await.unwrap();
    let config = EngineConfig {
        limit: 10,
        stages: stages(&[Stage::Insert]),
        source: RecordSource::File(path),
        ..EngineConfig::default()
    };
    let report = BenchmarkEngine::new(adapter.as_ref(), config)
        .run(&mut StatsReporter::with_sink(SharedBuffer::new()))
        .await
        .unwrap();
    assert_eq!(report.stats.structures, 3);

    let payloads: Vec<String> = adapter.query_all_structures().await.unwrap().into_iter().map(|s| s.payload).collect();
    assert!(payloads.contains(&"eyJhIjoxfQ==".to_string()));
}

#[tokio::test]
async fn test_missing_data_file() {
    let adapter = open_adapter(&BenchConfig::default()).await.unwrap();
    let config = EngineConfig {
        limit: 10,
        stages: stages(&[Stage::Insert]),
        source: RecordSource::File("/nonexistent/records.txt".into()),
        ..EngineConfig::default()
    };
    let result = BenchmarkEngine::new(adapter.as_ref(), config)
        .run(&mut StatsReporter::with_sink(SharedBuffer::new()))
        .await;
    assert!(matches!(result, Err(BenchError::DataUnavailable(_))));
}

/// Sink that refuses the final counts line
struct NoStatsLine;

impl Write for NoStatsLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.starts_with(b"No of structures") {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_stats_print_failure_is_reported() {
    let adapter = open_adapter(&BenchConfig::default()).await.unwrap();
    let config = EngineConfig {
        limit: 4,
        stages: stages(&[Stage::CreateEndpoint, Stage::Insert]),
        endpoints: three_endpoints(),
        ..EngineConfig::default()
    };
    let result = BenchmarkEngine::new(adapter.as_ref(), config)
        .run(&mut StatsReporter::with_sink(NoStatsLine))
        .await;

    assert!(matches!(result, Err(BenchError::Io(_))));
    assert_eq!(adapter.stats().await.unwrap(), GraphStats { structures: 4, predictions: 0, endpoints: 3 });
}
