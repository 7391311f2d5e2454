//! Database: in-process graph database handle
//!
//! Wraps a `GraphStore` with flat transactions and two access paths:
//! - the embedded handle API (`new_vertex`, `new_edge`, `lookup_vertex`, ...)
//! - the `GraphCommands` statement interface used by the remote adapter
//!
//! Writes made outside a transaction apply immediately. Inside a
//! transaction every write records its inverse in an undo log, and
//! rollback replays that log backwards.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::commands::{CommandKind, GraphCommands};
use crate::error::{BenchError, BenchResult};
use crate::graph::{Direction, Edge, GraphStore, PropertyMap, PropertyValue, Rid, TypeKind, Vertex};
use crate::result::{ResultSet, Row};
use crate::sql::{self, Params, Statement};

/// Inverse of one write, applied on rollback
#[derive(Debug)]
enum Undo {
    CreatedVertex(Rid),
    CreatedEdge(Rid),
    DeletedVertex { vertex: Vertex, edges: Vec<Edge> },
    DeletedEdge(Edge),
    SetProperty { rid: Rid, key: String, old: Option<PropertyValue> },
}

#[derive(Debug, Default)]
struct DatabaseState {
    store: GraphStore,
    tx: Option<Vec<Undo>>,
}

impl DatabaseState {
    fn record(&mut self, undo: Undo) {
        if let Some(log) = self.tx.as_mut() {
            log.push(undo);
        }
    }

    fn rid(id: &str) -> BenchResult<Rid> {
        Rid::parse(id).ok_or_else(|| BenchError::ReferenceNotFound(id.to_string()))
    }

    fn new_vertex(&mut self, type_name: &str, properties: PropertyMap) -> BenchResult<Rid> {
        let rid = self.store.create_vertex(type_name, properties)?;
        self.record(Undo::CreatedVertex(rid));
        Ok(rid)
    }

    fn set_property(&mut self, rid: Rid, key: &str, value: PropertyValue) -> BenchResult<()> {
        let old = self.store.set_vertex_property(rid, key, value)?;
        self.record(Undo::SetProperty { rid, key: key.to_string(), old });
        Ok(())
    }

    fn new_edge(&mut self, type_name: &str, out: Rid, target: Rid) -> BenchResult<Rid> {
        let rid = self.store.create_edge(type_name, out, target)?;
        self.record(Undo::CreatedEdge(rid));
        Ok(rid)
    }

    fn delete_vertex(&mut self, rid: Rid) -> BenchResult<()> {
        let (vertex, edges) = self.store.delete_vertex(rid)?;
        self.record(Undo::DeletedVertex { vertex, edges });
        Ok(())
    }

    fn delete_edge(&mut self, rid: Rid) -> BenchResult<()> {
        let edge = self.store.delete_edge(rid)?;
        self.record(Undo::DeletedEdge(edge));
        Ok(())
    }

    fn undo(&mut self, log: Vec<Undo>) -> BenchResult<()> {
        for entry in log.into_iter().rev() {
            match entry {
                Undo::CreatedVertex(rid) => {
                    self.store.delete_vertex(rid)?;
                }
                Undo::CreatedEdge(rid) => {
                    self.store.delete_edge(rid)?;
                }
                Undo::DeletedVertex { vertex, edges } => {
                    self.store.restore_vertex(vertex)?;
                    for edge in edges {
                        self.store.restore_edge(edge)?;
                    }
                }
                Undo::DeletedEdge(edge) => self.store.restore_edge(edge)?,
                Undo::SetProperty { rid, key, old } => match old {
                    Some(value) => {
                        self.store.set_vertex_property(rid, &key, value)?;
                    }
                    None => {
                        self.store.remove_vertex_property(rid, &key)?;
                    }
                },
            }
        }
        Ok(())
    }

    fn record_row(&self, rid: Rid) -> Option<Row> {
        if let Some(vertex) = self.store.get_vertex(rid) {
            return Some(Row::new(vertex.to_json()));
        }
        self.store.get_edge(rid).map(|edge| Row::new(edge.to_json()))
    }

    fn scan_rows(&self, target: &str) -> BenchResult<Vec<Row>> {
        if let Some(rid) = Rid::parse(target) {
            return Ok(self.record_row(rid).into_iter().collect());
        }
        let def = self
            .store
            .get_type(target)
            .ok_or_else(|| BenchError::InvalidStatement(format!("type {} does not exist", target)))?;
        Ok(match def.kind {
            TypeKind::Vertex => self
                .store
                .vertices_of_type(target)
                .into_iter()
                .map(|v| Row::new(v.to_json()))
                .collect(),
            TypeKind::Edge => self
                .store
                .edges_of_type(target)
                .into_iter()
                .map(|e| Row::new(e.to_json()))
                .collect(),
        })
    }

    fn run(&mut self, statement: &Statement, params: &mut Params<'_>) -> BenchResult<ResultSet> {
        let rows = match statement {
            Statement::Select { target } => self.scan_rows(&params.bind_text(target)?)?,
            Statement::Count { target } => {
                let type_name = params.bind_text(target)?;
                vec![count_row(self.store.count_of_type(&type_name))]
            }
            Statement::Expand { direction, edges, edge_type, target } => {
                let rid = Self::rid(&params.bind_text(target)?)?;
                if !self.store.has_vertex(rid) {
                    return Err(BenchError::ReferenceNotFound(rid.to_string()));
                }
                let found = self.store.edges_of(rid, *direction, Some(edge_type.as_str()));
                if *edges {
                    found.into_iter().map(|e| Row::new(e.to_json())).collect()
                } else {
                    found
                        .into_iter()
                        .filter_map(|e| self.store.get_vertex(e.other_end(rid)))
                        .map(|v| Row::new(v.to_json()))
                        .collect()
                }
            }
            Statement::Insert { type_name, fields } => {
                let mut properties = PropertyMap::new();
                for (key, operand) in fields {
                    properties.insert(key.clone(), PropertyValue::from_json(&params.bind(operand)?));
                }
                let rid = self.new_vertex(type_name, properties)?;
                self.record_row(rid).into_iter().collect()
            }
            Statement::CreateEdge { type_name, from, to } => {
                let out = Self::rid(&params.bind_text(from)?)?;
                let target = Self::rid(&params.bind_text(to)?)?;
                let rid = self.new_edge(type_name, out, target)?;
                self.record_row(rid).into_iter().collect()
            }
            Statement::DeleteVertex { target } => {
                let rid = Self::rid(&params.bind_text(target)?)?;
                self.delete_vertex(rid)?;
                vec![count_row(1)]
            }
            Statement::CreateType { kind, name } => {
                self.store.define_type(name, *kind)?;
                Vec::new()
            }
            Statement::CreateProperty { type_name, property } => {
                self.store.declare_property(type_name, property)?;
                Vec::new()
            }
            Statement::CreateUniqueIndex { type_name, property } => {
                self.store.create_unique_index(type_name, property)?;
                Vec::new()
            }
        };
        Ok(ResultSet::new(rows))
    }
}

fn count_row(count: usize) -> Row {
    let mut fields = Map::new();
    fields.insert("count".to_string(), json!(count));
    Row::new(fields)
}

/// In-process database handle. Clones share the same graph.
#[derive(Debug, Clone, Default)]
pub struct Database {
    state: Arc<RwLock<DatabaseState>>,
    unbounded_queries: bool,
}

impl Database {
    /// Create a new database with an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark read-only queries as exempt from evaluation timeouts
    pub fn with_unbounded_queries(mut self, unbounded: bool) -> Self {
        self.unbounded_queries = unbounded;
        self
    }

    /// Open a transaction
    pub async fn begin(&self) -> BenchResult<()> {
        let mut state = self.state.write().await;
        if state.tx.is_some() {
            return Err(BenchError::TransactionAlreadyOpen);
        }
        state.tx = Some(Vec::new());
        Ok(())
    }

    /// Make the open transaction's writes permanent
    pub async fn commit(&self) -> BenchResult<()> {
        let mut state = self.state.write().await;
        let log = state.tx.take().ok_or(BenchError::NoTransaction)?;
        trace!(writes = log.len(), "commit");
        Ok(())
    }

    /// Undo the open transaction's writes
    pub async fn rollback(&self) -> BenchResult<()> {
        let mut state = self.state.write().await;
        let log = state.tx.take().ok_or(BenchError::NoTransaction)?;
        trace!(writes = log.len(), "rollback");
        state.undo(log)
    }

    pub async fn is_transaction_active(&self) -> bool {
        self.state.read().await.tx.is_some()
    }

    /// Define a vertex type if it does not exist yet
    pub async fn define_vertex_type(&self, name: &str) -> BenchResult<bool> {
        Ok(self.state.write().await.store.define_type(name, TypeKind::Vertex)?)
    }

    /// Define an edge type if it does not exist yet
    pub async fn define_edge_type(&self, name: &str) -> BenchResult<bool> {
        Ok(self.state.write().await.store.define_type(name, TypeKind::Edge)?)
    }

    /// Declare a property and put a unique index on it
    pub async fn create_unique_index(&self, type_name: &str, property: &str) -> BenchResult<bool> {
        let mut state = self.state.write().await;
        state.store.declare_property(type_name, property)?;
        Ok(state.store.create_unique_index(type_name, property)?)
    }

    /// Create a vertex with properties
    pub async fn new_vertex(&self, type_name: &str, properties: PropertyMap) -> BenchResult<Vertex> {
        let mut state = self.state.write().await;
        let rid = state.new_vertex(type_name, properties)?;
        state
            .store
            .get_vertex(rid)
            .cloned()
            .ok_or_else(|| BenchError::ReferenceNotFound(rid.to_string()))
    }

    /// Set one property on a vertex
    pub async fn set_property(&self, id: &str, key: &str, value: impl Into<PropertyValue>) -> BenchResult<()> {
        let mut state = self.state.write().await;
        let rid = DatabaseState::rid(id)?;
        state.set_property(rid, key, value.into())
    }

    /// Create an edge from `out` to `target`
    pub async fn new_edge(&self, type_name: &str, out: &str, target: &str) -> BenchResult<Edge> {
        let mut state = self.state.write().await;
        let out = DatabaseState::rid(out)?;
        let target = DatabaseState::rid(target)?;
        let rid = state.new_edge(type_name, out, target)?;
        state
            .store
            .get_edge(rid)
            .cloned()
            .ok_or_else(|| BenchError::ReferenceNotFound(rid.to_string()))
    }

    /// Delete a vertex together with its edges
    pub async fn delete_vertex(&self, id: &str) -> BenchResult<()> {
        let mut state = self.state.write().await;
        let rid = DatabaseState::rid(id)?;
        state.delete_vertex(rid)
    }

    /// Delete a single edge
    pub async fn delete_edge(&self, id: &str) -> BenchResult<()> {
        let mut state = self.state.write().await;
        let rid = DatabaseState::rid(id)?;
        state.delete_edge(rid)
    }

    /// Look up an edge by id
    pub async fn lookup_edge(&self, id: &str) -> Option<Edge> {
        let rid = Rid::parse(id)?;
        self.state.read().await.store.get_edge(rid).cloned()
    }

    /// Look up a vertex by id; unknown or malformed ids give `None`
    pub async fn lookup_vertex(&self, id: &str) -> Option<Vertex> {
        let rid = Rid::parse(id)?;
        self.state.read().await.store.get_vertex(rid).cloned()
    }

    /// All vertices of a type, in insertion order
    pub async fn vertices(&self, type_name: &str) -> Vec<Vertex> {
        self.state
            .read()
            .await
            .store
            .vertices_of_type(type_name)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Ids of every vertex in the graph
    pub async fn vertex_ids(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .store
            .vertex_ids()
            .into_iter()
            .map(|rid| rid.to_string())
            .collect()
    }

    /// Edges of a vertex in one direction, optionally restricted to a type
    pub async fn edges(&self, id: &str, direction: Direction, type_name: Option<&str>) -> BenchResult<Vec<Edge>> {
        let state = self.state.read().await;
        let rid = DatabaseState::rid(id)?;
        if !state.store.has_vertex(rid) {
            return Err(BenchError::ReferenceNotFound(id.to_string()));
        }
        Ok(state
            .store
            .edges_of(rid, direction, type_name)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Number of vertices or edges of a type
    pub async fn count(&self, type_name: &str) -> u64 {
        self.state.read().await.store.count_of_type(type_name) as u64
    }

    /// Total vertices and edges
    pub async fn size(&self) -> (usize, usize) {
        let state = self.state.read().await;
        (state.store.vertex_count(), state.store.edge_count())
    }
}

#[async_trait]
impl GraphCommands for Database {
    async fn execute(&self, kind: CommandKind, statement: &str, params: &[Value]) -> BenchResult<ResultSet> {
        let statements = match kind {
            CommandKind::Script => sql::parse_script(statement)?,
            CommandKind::Command | CommandKind::Query => vec![sql::parse_statement(statement)?],
        };
        if kind == CommandKind::Query {
            if statements.iter().any(Statement::is_mutation) {
                return Err(BenchError::InvalidStatement(format!("query cannot modify the graph: {}", statement)));
            }
            if self.unbounded_queries {
                trace!("unbounded evaluation requested; embedded queries have no timeout");
            }
        }

        debug!(?kind, statement, params = params.len(), "execute");
        let mut state = self.state.write().await;
        let mut bound = Params::new(params);
        let mut last = ResultSet::default();
        for stmt in &statements {
            last = state.run(stmt, &mut bound)?;
        }
        Ok(last)
    }

    async fn begin(&self) -> BenchResult<()> {
        Database::begin(self).await
    }

    async fn commit(&self) -> BenchResult<()> {
        Database::commit(self).await
    }

    async fn rollback(&self) -> BenchResult<()> {
        Database::rollback(self).await
    }

    async fn lookup_by_id(&self, id: &str) -> BenchResult<Option<Row>> {
        let state = self.state.read().await;
        Ok(Rid::parse(id).and_then(|rid| state.record_row(rid)))
    }
}
