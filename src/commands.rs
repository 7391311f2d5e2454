//! GraphCommands trait: the narrow collaborator surface
//!
//! Implemented by:
//! - `Database`: the in-process embedded database
//! - `HttpDatabase`: a running server reached over HTTP

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BenchResult;
use crate::result::{ResultSet, Row};

/// How a statement is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    /// A single statement that may mutate the graph
    Command,
    /// A single read-only statement; carries the unbounded evaluation hint
    Query,
    /// Several statements separated by `;`
    Script,
}

impl CommandKind {
    /// Language name sent over the wire
    pub fn language(&self) -> &'static str {
        match self {
            CommandKind::Command | CommandKind::Query => "sql",
            CommandKind::Script => "sqlscript",
        }
    }
}

/// Command/query interface of a graph database.
///
/// Statements use positional `?` parameters. Transactions are flat: `begin`
/// while one is open fails with `TransactionAlreadyOpen`.
#[async_trait]
pub trait GraphCommands: Send + Sync {
    /// Execute a statement and collect its rows
    async fn execute(&self, kind: CommandKind, statement: &str, params: &[Value]) -> BenchResult<ResultSet>;

    /// Open a transaction
    async fn begin(&self) -> BenchResult<()>;

    /// Commit the open transaction
    async fn commit(&self) -> BenchResult<()>;

    /// Roll back the open transaction
    async fn rollback(&self) -> BenchResult<()>;

    /// Fetch one record by its opaque id
    async fn lookup_by_id(&self, id: &str) -> BenchResult<Option<Row>>;

    /// Shorthand for a mutating statement
    async fn command(&self, statement: &str, params: &[Value]) -> BenchResult<ResultSet> {
        self.execute(CommandKind::Command, statement, params).await
    }

    /// Shorthand for a read-only statement
    async fn query(&self, statement: &str, params: &[Value]) -> BenchResult<ResultSet> {
        self.execute(CommandKind::Query, statement, params).await
    }
}
