//! Graphbench
//!
//! A throughput harness for graph databases. The same CRUD and traversal
//! workload runs through three interchangeable client APIs and every stage
//! is timed.
//!
//! # Architecture
//!
//! - `records`: synthetic payload lines (embedded template or data file)
//! - `model`: descriptors, catalogs and round-robin prediction assignment
//! - `adapter`: the benchmark operations per client API
//!   (embedded handle, step-based traversal, remote command statements)
//! - `engine`: the stage pipeline with batching and timing
//! - `stats`: final counts and timing lines
//!
//! The database side is reached only through `GraphCommands` (remote
//! statements), `Database` (embedded handle) or `GraphTraversalSource`.
//! An in-memory property graph (`graph`, `database`, `sql`) stands in for a
//! server; `HttpDatabase` talks to an ArcadeDB-compatible HTTP API.
//!
//! ## Example Usage
//!
//! ```no_run
//! use graphbench::{open_adapter, BenchConfig, BenchmarkEngine, EngineConfig, StatsReporter};
//!
//! # async fn demo() -> graphbench::BenchResult<()> {
//! let config = BenchConfig { limit: 100, ..BenchConfig::default() };
//! let adapter = open_adapter(&config).await?;
//! let engine = BenchmarkEngine::new(adapter.as_ref(), EngineConfig::from(&config));
//! let report = engine.run(&mut StatsReporter::stdout()).await?;
//! assert_eq!(report.stats.structures, 100);
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod commands;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod graph;
pub mod http;
pub mod model;
pub mod records;
pub mod result;
pub mod sql;
pub mod stats;
pub mod traversal;

// Re-export main types for convenience
pub use adapter::{open_adapter, EmbeddedAdapter, GraphAdapter, RemoteAdapter, TraversalAdapter};
pub use commands::{CommandKind, GraphCommands};
pub use config::{AdapterKind, BenchConfig, RemoteConfig};
pub use database::Database;
pub use engine::{BenchReport, BenchmarkEngine, EngineConfig, Stage, StageSet, StageTiming};
pub use error::{BenchError, BenchResult};
pub use http::HttpDatabase;
pub use model::{
    EndpointDescriptor, PredictionAssignment, PredictionLinkRequest, StructureDescriptor,
};
pub use records::{generate_file, RecordPayload, RecordSource};
pub use result::{ResultSet, Row};
pub use stats::{GraphStats, SharedBuffer, StatsReporter};
pub use traversal::GraphTraversalSource;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.3.0");
    }
}
