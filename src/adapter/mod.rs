//! Client adapters: the benchmark operations over one database access mode
//!
//! Three interchangeable variants implement `GraphAdapter`:
//! - `EmbeddedAdapter`: direct vertex/edge calls on a `Database` handle
//! - `TraversalAdapter`: step-based traversals (`GraphTraversalSource`)
//! - `RemoteAdapter`: fixed SQL statements through `GraphCommands`
//!
//! Read-only operations run in a transaction scope that is always rolled
//! back; writes commit on success and roll back on failure. Scopes are only
//! opened when transactions are enabled.

pub mod embedded;
pub mod remote;
pub mod traversal;

pub use embedded::EmbeddedAdapter;
pub use remote::RemoteAdapter;
pub use traversal::TraversalAdapter;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::commands::GraphCommands;
use crate::config::{AdapterKind, BenchConfig};
use crate::database::Database;
use crate::error::{BenchError, BenchResult};
use crate::http::HttpDatabase;
use crate::model::{EndpointDescriptor, PredictionLinkRequest, StructureDescriptor};
use crate::stats::{GraphStats, StatsReporter};

/// Vertex type holding endpoints
pub const ENDPOINT: &str = "endpoint";
/// Vertex type holding inserted records
pub const INPUT_STRUCTURE: &str = "inputstructure";
/// Vertex type holding predictions
pub const PREDICTION_STRUCTURE: &str = "predictionstructure";
/// Edge type prediction -> endpoint
pub const E_ENDPOINT: &str = "e_endpoint";
/// Edge type structure -> prediction
pub const E_PREDICTION_STRUCTURE: &str = "e_predictionstructure";

pub const NAME: &str = "name";
pub const JSON: &str = "json";
pub const ALERTS: &str = "alerts";

/// Schema script, safe to run repeatedly
pub const SCHEMA_SCRIPT: &str = "create vertex type inputstructure if not exists; \
create vertex type endpoint if not exists; \
create property endpoint.name if not exists string; \
create index if not exists on endpoint (name) unique; \
create vertex type predictionstructure if not exists; \
create edge type e_endpoint if not exists; \
create edge type e_predictionstructure if not exists;";

/// Deletion order used by `delete_all`
pub const DELETE_ORDER: [&str; 3] = [PREDICTION_STRUCTURE, INPUT_STRUCTURE, ENDPOINT];

/// The benchmark operations, one implementation per access mode
#[async_trait]
pub trait GraphAdapter: Send + Sync {
    /// Label used in reports
    fn name(&self) -> &'static str;

    /// Create types and the unique index on endpoint names
    async fn prepare_schema(&self) -> BenchResult<()>;

    /// Remove predictions, then structures, then endpoints
    async fn delete_all(&self) -> BenchResult<()>;

    /// Create one endpoint and return its id
    async fn create_endpoint(&self, name: &str) -> BenchResult<String>;

    /// Store encoded payloads as structures; ids come back in input order
    async fn insert(&self, payloads: &[String]) -> BenchResult<Vec<String>>;

    /// Create one linked prediction per request; ids come back in input order
    async fn predict(&self, requests: &[PredictionLinkRequest]) -> BenchResult<Vec<String>>;

    /// Read back every structure
    async fn query_all_structures(&self) -> BenchResult<Vec<StructureDescriptor>>;

    /// Predictions + their endpoint edges + their decoded alerts
    async fn query_all_predictions_with_links(&self) -> BenchResult<u64>;

    async fn find_all_endpoints(&self) -> BenchResult<Vec<EndpointDescriptor>>;

    /// Ids of the predictions linked to an endpoint
    async fn find_predictions_by_endpoint(&self, endpoint_id: &str) -> BenchResult<Vec<String>>;

    /// Current vertex counts
    async fn stats(&self) -> BenchResult<GraphStats>;

    /// Query the counts and hand them to the reporter
    async fn print_stats(&self, reporter: &mut StatsReporter) -> BenchResult<GraphStats> {
        let stats = self.stats().await?;
        reporter.print_stats(&stats)?;
        Ok(stats)
    }
}

/// Anything that can open and close a transaction
#[async_trait]
pub trait TxControl: Send + Sync {
    async fn begin(&self) -> BenchResult<()>;
    async fn commit(&self) -> BenchResult<()>;
    async fn rollback(&self) -> BenchResult<()>;
}

#[async_trait]
impl<T: GraphCommands + ?Sized> TxControl for T {
    async fn begin(&self) -> BenchResult<()> {
        GraphCommands::begin(self).await
    }

    async fn commit(&self) -> BenchResult<()> {
        GraphCommands::commit(self).await
    }

    async fn rollback(&self) -> BenchResult<()> {
        GraphCommands::rollback(self).await
    }
}

#[async_trait]
impl<'a> TxControl for crate::traversal::Transaction<'a> {
    async fn begin(&self) -> BenchResult<()> {
        self.open().await
    }

    async fn commit(&self) -> BenchResult<()> {
        crate::traversal::Transaction::commit(self).await
    }

    async fn rollback(&self) -> BenchResult<()> {
        crate::traversal::Transaction::rollback(self).await
    }
}

/// One transaction scope around an adapter operation
///
/// A disabled scope does nothing. When closing fails after the operation
/// itself failed, the operation's error wins.
pub(crate) struct TxScope<'a, C: TxControl + ?Sized> {
    tx: Option<&'a C>,
}

impl<'a, C: TxControl + ?Sized> TxScope<'a, C> {
    pub(crate) async fn open(tx: &'a C, enabled: bool) -> BenchResult<TxScope<'a, C>> {
        if !enabled {
            return Ok(TxScope { tx: None });
        }
        tx.begin().await?;
        Ok(TxScope { tx: Some(tx) })
    }

    /// Commit on success, roll back on failure
    pub(crate) async fn commit<T>(self, result: BenchResult<T>) -> BenchResult<T> {
        let Some(tx) = self.tx else {
            return result;
        };
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(error = %rollback_err, "rollback after failure also failed");
                }
                Err(e)
            }
        }
    }

    /// Always roll back
    pub(crate) async fn rollback<T>(self, result: BenchResult<T>) -> BenchResult<T> {
        let Some(tx) = self.tx else {
            return result;
        };
        let closed = tx.rollback().await;
        let value = result?;
        closed?;
        Ok(value)
    }
}

/// A required text field: missing or blank is `DataCorruption`
pub(crate) fn require_text<'v>(value: Option<&'v str>, field: &str, id: &str) -> BenchResult<&'v str> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(BenchError::DataCorruption(format!("{} not available on {}", field, id))),
    }
}

/// A prediction found through an endpoint must not be the endpoint itself
pub(crate) fn check_not_self(endpoint_id: &str, prediction_id: &str) -> BenchResult<()> {
    if endpoint_id == prediction_id {
        return Err(BenchError::IntegrityViolation(format!(
            "endpoint {} returned itself as a prediction",
            endpoint_id
        )));
    }
    Ok(())
}

/// Build the adapter selected by the configuration and prepare its schema
pub async fn open_adapter(config: &BenchConfig) -> BenchResult<Box<dyn GraphAdapter>> {
    let adapter: Box<dyn GraphAdapter> = match config.adapter {
        AdapterKind::Embedded => Box::new(EmbeddedAdapter::new(
            Database::new().with_unbounded_queries(config.unbounded_queries),
            config.transactions,
        )),
        AdapterKind::Traversal => Box::new(TraversalAdapter::new(
            Database::new().with_unbounded_queries(config.unbounded_queries),
            config.transactions,
            config.unbounded_queries,
        )),
        AdapterKind::Remote => {
            let commands: Arc<dyn GraphCommands> = match &config.remote.url {
                Some(url) => {
                    info!(url = %url, database = %config.remote.database, "connecting to remote server");
                    Arc::new(
                        HttpDatabase::new(url, &config.remote.database, &config.remote.user, &config.remote.password)
                            .with_unbounded_queries(config.unbounded_queries),
                    )
                }
                None => Arc::new(Database::new().with_unbounded_queries(config.unbounded_queries)),
            };
            Box::new(RemoteAdapter::new(commands, config.transactions))
        }
    };
    adapter.prepare_schema().await?;
    debug!(adapter = adapter.name(), "schema ready");
    Ok(adapter)
}
