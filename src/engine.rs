//! Benchmark engine: the stage pipeline
//!
//! Stages run strictly in order:
//! DELETE → CREATE_ENDPOINT → INSERT → GENERATE_PREDICTION → QUERY → FIND,
//! followed by the stats print. A skipped CREATE_ENDPOINT or INSERT stage is
//! replaced by a read-back so the later stages still have ids to work with.
//!
//! Every timed step yields a `StageTiming`; nothing is accumulated in
//! shared state between stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::adapter::GraphAdapter;
use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult};
use crate::model::{generate_prediction_inputs, pair_with_structures, EndpointDescriptor};
use crate::records::{RecordPayload, RecordSource};
use crate::stats::{GraphStats, StatsReporter};

/// One named phase of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Delete,
    CreateEndpoint,
    Insert,
    GeneratePrediction,
    Query,
    Find,
    All,
}

impl Stage {
    /// Pipeline order
    pub const PIPELINE: [Stage; 6] = [
        Stage::Delete,
        Stage::CreateEndpoint,
        Stage::Insert,
        Stage::GeneratePrediction,
        Stage::Query,
        Stage::Find,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Delete => "DELETE",
            Stage::CreateEndpoint => "CREATE_ENDPOINT",
            Stage::Insert => "INSERT",
            Stage::GeneratePrediction => "GENERATE_PREDICTION",
            Stage::Query => "QUERY",
            Stage::Find => "FIND",
            Stage::All => "ALL",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = BenchError;

    /// Accepts `CREATE_ENDPOINT`, `create-endpoint`, `create_endpoint`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Stage::PIPELINE
            .into_iter()
            .chain([Stage::All])
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| BenchError::Config(format!("unknown stage '{}'", s)))
    }
}

/// Stages enabled for a run; `ALL` enables every stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageSet(BTreeSet<Stage>);

impl Default for StageSet {
    fn default() -> Self {
        StageSet::all()
    }
}

impl StageSet {
    pub fn all() -> Self {
        StageSet(BTreeSet::from([Stage::All]))
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.0.contains(&Stage::All) || self.0.contains(&stage)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.0.iter()
    }
}

impl FromIterator<Stage> for StageSet {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        StageSet(iter.into_iter().collect())
    }
}

/// Elapsed time and item count of one timed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub operation: String,
    pub items: u64,
    pub elapsed: Duration,
}

impl StageTiming {
    /// Nanoseconds per item; `None` when there were no items
    pub fn average_ns(&self) -> Option<u128> {
        if self.items == 0 {
            return None;
        }
        Some(self.elapsed.as_nanos() / self.items as u128)
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub adapter: String,
    pub limit: usize,
    pub timings: Vec<StageTiming>,
    pub endpoints: usize,
    pub structures: usize,
    pub predictions: usize,
    pub stats: GraphStats,
}

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of records to insert
    pub limit: usize,
    /// Items per adapter call in INSERT and GENERATE_PREDICTION
    pub batch_size: usize,
    pub stages: StageSet,
    pub endpoints: Vec<String>,
    pub alert_sets: Vec<Vec<String>>,
    pub source: RecordSource,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::from(&BenchConfig::default())
    }
}

impl From<&BenchConfig> for EngineConfig {
    fn from(config: &BenchConfig) -> Self {
        EngineConfig {
            limit: config.limit,
            batch_size: config.batch_size,
            stages: config.stages.clone(),
            endpoints: config.endpoints.clone(),
            alert_sets: config.alerts.clone(),
            source: RecordSource::from_path(config.data_file.as_deref()),
        }
    }
}

/// Await `fut`, measuring how long it took
async fn timed<T, F>(fut: F) -> BenchResult<(T, Duration)>
where
    F: Future<Output = BenchResult<T>>,
{
    let start = Instant::now();
    let value = fut.await?;
    Ok((value, start.elapsed()))
}

/// Runs the pipeline against one adapter
pub struct BenchmarkEngine<'a> {
    adapter: &'a dyn GraphAdapter,
    config: EngineConfig,
}

impl<'a> BenchmarkEngine<'a> {
    pub fn new(adapter: &'a dyn GraphAdapter, config: EngineConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn enabled(&self, stage: Stage) -> bool {
        self.config.stages.contains(stage)
    }

    fn failed(&self, stage: Stage, items: usize) -> impl Fn(BenchError) -> BenchError + '_ {
        self.failed_step(stage.as_str(), items)
    }

    /// Log a failure of a step outside the stage pipeline (header, final counts)
    fn failed_step(&self, step: &'static str, items: usize) -> impl Fn(BenchError) -> BenchError + '_ {
        move |e| {
            error!(adapter = self.adapter.name(), stage = step, items, error = %e, "stage failed");
            e
        }
    }

    fn record(
        &self,
        reporter: &mut StatsReporter,
        timings: &mut Vec<StageTiming>,
        timing: StageTiming,
    ) -> BenchResult<()> {
        info!(
            stage = %timing.stage,
            items = timing.items,
            elapsed_ms = timing.elapsed.as_millis() as u64,
            "{}",
            timing.operation
        );
        reporter
            .print_timing(&timing)
            .map_err(self.failed(timing.stage, timing.items as usize))?;
        timings.push(timing);
        Ok(())
    }

    /// Run every enabled stage, then print the final counts
    pub async fn run(&self, reporter: &mut StatsReporter) -> BenchResult<BenchReport> {
        let adapter = self.adapter;
        let limit = self.config.limit;
        let batch_size = self.config.batch_size.max(1);
        let mut timings = Vec::new();

        reporter
            .line(adapter.name())
            .and_then(|()| reporter.line(&format!("Running performance test for {} structures", limit)))
            .map_err(self.failed_step("START", 0))?;
        info!(adapter = adapter.name(), limit, batch_size, "starting benchmark");

        if self.enabled(Stage::Delete) {
            reporter.line("Deleting all data").map_err(self.failed(Stage::Delete, 0))?;
            let ((), elapsed) = timed(adapter.delete_all())
                .await
                .map_err(self.failed(Stage::Delete, 0))?;
            self.record(reporter, &mut timings, StageTiming {
                stage: Stage::Delete,
                operation: "Delete all data".to_string(),
                items: 0,
                elapsed,
            })?;
        }

        let endpoint_ids: Vec<String> = if self.enabled(Stage::CreateEndpoint) {
            let mut ids = Vec::with_capacity(self.config.endpoints.len());
            let mut elapsed = Duration::ZERO;
            for name in &self.config.endpoints {
                let (id, took) = timed(adapter.create_endpoint(name))
                    .await
                    .map_err(self.failed(Stage::CreateEndpoint, ids.len()))?;
                ids.push(id);
                elapsed += took;
            }
            self.record(reporter, &mut timings, StageTiming {
                stage: Stage::CreateEndpoint,
                operation: "Create endpoints".to_string(),
                items: ids.len() as u64,
                elapsed,
            })?;
            ids
        } else {
            adapter
                .find_all_endpoints()
                .await
                .map_err(self.failed(Stage::CreateEndpoint, 0))?
                .into_iter()
                .map(|e| e.id)
                .collect()
        };
        if endpoint_ids.is_empty() {
            warn!("no endpoints available; no predictions will be generated");
        }

        let assignments = generate_prediction_inputs(limit, &endpoint_ids, &self.config.alert_sets);

        let structure_ids: Vec<String> = if self.enabled(Stage::Insert) {
            let records = self
                .config
                .source
                .produce(limit)
                .and_then(|records| records.collect::<BenchResult<Vec<RecordPayload>>>())
                .map_err(self.failed(Stage::Insert, 0))?;
            if records.len() < limit {
                warn!(requested = limit, available = records.len(), "record source ran short");
            }
            let payloads: Vec<String> = records.iter().map(RecordPayload::encode).collect();

            let mut ids = Vec::with_capacity(payloads.len());
            let mut elapsed = Duration::ZERO;
            for batch in payloads.chunks(batch_size) {
                let (batch_ids, took) = timed(adapter.insert(batch))
                    .await
                    .map_err(self.failed(Stage::Insert, ids.len()))?;
                ids.extend(batch_ids);
                elapsed += took;
            }
            self.record(reporter, &mut timings, StageTiming {
                stage: Stage::Insert,
                operation: "Insert input structures".to_string(),
                items: ids.len() as u64,
                elapsed,
            })?;
            ids
        } else {
            adapter
                .query_all_structures()
                .await
                .map_err(self.failed(Stage::Insert, 0))?
                .into_iter()
                .map(|s| s.id)
                .collect()
        };

        let mut predictions = 0;
        if self.enabled(Stage::GeneratePrediction) {
            let requests = pair_with_structures(assignments, &structure_ids);
            let mut elapsed = Duration::ZERO;
            for batch in requests.chunks(batch_size) {
                let (batch_ids, took) = timed(adapter.predict(batch))
                    .await
                    .map_err(self.failed(Stage::GeneratePrediction, predictions))?;
                predictions += batch_ids.len();
                elapsed += took;
            }
            self.record(reporter, &mut timings, StageTiming {
                stage: Stage::GeneratePrediction,
                operation: "Generate predictions".to_string(),
                items: predictions as u64,
                elapsed,
            })?;
        }

        if self.enabled(Stage::Query) {
            let (structures, elapsed) = timed(adapter.query_all_structures())
                .await
                .map_err(self.failed(Stage::Query, 0))?;
            self.record(reporter, &mut timings, StageTiming {
                stage: Stage::Query,
                operation: "Retrieve all input structures".to_string(),
                items: structures.len() as u64,
                elapsed,
            })?;

            let (linked, elapsed) = timed(adapter.query_all_predictions_with_links())
                .await
                .map_err(self.failed(Stage::Query, 0))?;
            self.record(reporter, &mut timings, StageTiming {
                stage: Stage::Query,
                operation: "Retrieve all prediction structures with related records".to_string(),
                items: linked,
                elapsed,
            })?;
        }

        if self.enabled(Stage::Find) {
            let (endpoints, elapsed) = timed(adapter.find_all_endpoints())
                .await
                .map_err(self.failed(Stage::Find, 0))?;
            self.record(reporter, &mut timings, StageTiming {
                stage: Stage::Find,
                operation: "Search all endpoints".to_string(),
                items: endpoints.len() as u64,
                elapsed,
            })?;

            match endpoints.first() {
                Some(EndpointDescriptor { id, .. }) => {
                    let (found, elapsed) = timed(adapter.find_predictions_by_endpoint(id))
                        .await
                        .map_err(self.failed(Stage::Find, endpoints.len()))?;
                    self.record(reporter, &mut timings, StageTiming {
                        stage: Stage::Find,
                        operation: "Find prediction structures by endpoint id".to_string(),
                        items: found.len() as u64,
                        elapsed,
                    })?;
                }
                None => warn!("no endpoints found; skipping lookup by endpoint id"),
            }
        }

        let stats = adapter
            .print_stats(reporter)
            .await
            .map_err(self.failed_step("STATS", structure_ids.len()))?;
        info!(%stats, "benchmark finished");

        Ok(BenchReport {
            adapter: adapter.name().to_string(),
            limit,
            timings,
            endpoints: endpoint_ids.len(),
            structures: structure_ids.len(),
            predictions,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parse() {
        assert_eq!("create-endpoint".parse::<Stage>().unwrap(), Stage::CreateEndpoint);
        assert_eq!("GENERATE_PREDICTION".parse::<Stage>().unwrap(), Stage::GeneratePrediction);
        assert_eq!("all".parse::<Stage>().unwrap(), Stage::All);
        assert!(matches!("bogus".parse::<Stage>(), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_stage_set_membership() {
        let all = StageSet::default();
        assert!(Stage::PIPELINE.iter().all(|s| all.contains(*s)));

        let some: StageSet = [Stage::CreateEndpoint, Stage::Insert].into_iter().collect();
        assert!(some.contains(Stage::Insert));
        assert!(!some.contains(Stage::Delete));
        assert!(!some.contains(Stage::Find));
    }

    #[test]
    fn test_stage_set_serde() {
        let set: StageSet = serde_json::from_str(r#"["INSERT", "FIND"]"#).unwrap();
        assert!(set.contains(Stage::Find));
        assert!(!set.contains(Stage::Query));
    }

    #[test]
    fn test_average_ns() {
        let timing = StageTiming {
            stage: Stage::Insert,
            operation: "Insert".into(),
            items: 3,
            elapsed: Duration::from_nanos(3_000_900),
        };
        assert_eq!(timing.average_ns(), Some(1_000_300));
        assert_eq!(StageTiming { items: 0, ..timing }.average_ns(), None);
    }
}
