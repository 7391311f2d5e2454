//! Step-based graph traversal over the embedded database
//!
//! A small Gremlin-flavoured API: a traversal is a list of steps built
//! fluently from a `GraphTraversalSource` and evaluated when a terminal
//! step (`to_list`, `next`, `iterate`) is awaited.
//!
//! ```no_run
//! # use graphbench::{Database, traversal::GraphTraversalSource};
//! # async fn demo() -> graphbench::BenchResult<()> {
//! let g = GraphTraversalSource::new(Database::new());
//! let id = g.add_v("endpoint").property("name", "Mutagenicity").id().next().await?;
//! let names = g.v().has_label("endpoint").values("name").to_list().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use tracing::trace;

use crate::database::Database;
use crate::error::{BenchError, BenchResult};
use crate::graph::{Direction, Edge, PropertyMap, PropertyValue, Vertex};

/// Anything a traverser can sit on
#[derive(Debug, Clone)]
pub enum Element {
    Vertex(Vertex),
    Edge(Edge),
    Value(PropertyValue),
}

impl Element {
    /// Record id of a vertex or edge
    pub fn id(&self) -> Option<String> {
        match self {
            Element::Vertex(v) => Some(v.identity()),
            Element::Edge(e) => Some(e.identity()),
            Element::Value(_) => None,
        }
    }

    /// Type name of a vertex or edge
    pub fn label(&self) -> Option<&str> {
        match self {
            Element::Vertex(v) => Some(&v.type_name),
            Element::Edge(e) => Some(&e.type_name),
            Element::Value(_) => None,
        }
    }

    /// Property of a vertex or edge
    pub fn value(&self, key: &str) -> Option<&PropertyValue> {
        match self {
            Element::Vertex(v) => v.get_property(key),
            Element::Edge(e) => e.get_property(key),
            Element::Value(_) => None,
        }
    }

    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Element::Vertex(v) => Some(v),
            _ => None,
        }
    }

    /// The scalar value produced by `id()`, `values()` or `count()`
    pub fn as_value(&self) -> Option<&PropertyValue> {
        match self {
            Element::Value(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Step {
    V(Option<Vec<String>>),
    HasLabel(String),
    AddV(String, PropertyMap),
    Property(String, PropertyValue),
    As(String),
    AddE { label: String, from: Option<String>, to: Option<String> },
    From(String),
    To(String),
    Edges(Direction, String),
    OutV,
    InV,
    Values(String),
    Id,
    Count,
    Drop,
}

#[derive(Debug, Clone, Default)]
struct Traverser {
    current: Option<Element>,
    labels: HashMap<String, Element>,
}

impl Traverser {
    fn with(&self, element: Element) -> Self {
        Traverser { current: Some(element), labels: self.labels.clone() }
    }

    fn current_id(&self) -> Option<String> {
        self.current.as_ref().and_then(Element::id)
    }
}

/// Entry point for traversals over one database
#[derive(Debug, Clone)]
pub struct GraphTraversalSource {
    db: Database,
    unbounded: bool,
}

impl GraphTraversalSource {
    pub fn new(db: Database) -> Self {
        Self { db, unbounded: false }
    }

    /// Traversals spawned from the returned source run without an evaluation timeout
    pub fn with_unbounded_evaluation(&self) -> Self {
        Self { db: self.db.clone(), unbounded: true }
    }

    /// Transaction control for this source
    pub fn tx(&self) -> Transaction<'_> {
        Transaction { db: &self.db }
    }

    fn start(&self, step: Step) -> GraphTraversal {
        GraphTraversal { db: self.db.clone(), unbounded: self.unbounded, steps: vec![step] }
    }

    /// Start from every vertex
    pub fn v(&self) -> GraphTraversal {
        self.start(Step::V(None))
    }

    /// Start from the vertices with the given ids
    pub fn v_ids<I, S>(&self, ids: I) -> GraphTraversal
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.start(Step::V(Some(ids.into_iter().map(Into::into).collect())))
    }

    /// Start by creating a vertex
    pub fn add_v(&self, label: &str) -> GraphTraversal {
        self.start(Step::AddV(label.to_string(), PropertyMap::new()))
    }
}

/// Gremlin-style transaction handle
pub struct Transaction<'a> {
    db: &'a Database,
}

impl Transaction<'_> {
    pub async fn open(&self) -> BenchResult<()> {
        self.db.begin().await
    }

    pub async fn commit(&self) -> BenchResult<()> {
        self.db.commit().await
    }

    pub async fn rollback(&self) -> BenchResult<()> {
        self.db.rollback().await
    }
}

/// A traversal under construction
#[derive(Debug, Clone)]
#[must_use = "traversals do nothing until a terminal step is awaited"]
pub struct GraphTraversal {
    db: Database,
    unbounded: bool,
    steps: Vec<Step>,
}

impl GraphTraversal {
    fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Jump to every vertex, keeping step labels
    pub fn v(self) -> Self {
        self.then(Step::V(None))
    }

    /// Jump to the vertices with the given ids, keeping step labels
    pub fn v_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect();
        self.then(Step::V(Some(ids)))
    }

    pub fn has_label(self, label: &str) -> Self {
        self.then(Step::HasLabel(label.to_string()))
    }

    pub fn add_v(self, label: &str) -> Self {
        self.then(Step::AddV(label.to_string(), PropertyMap::new()))
    }

    /// Set a property on the current vertex
    pub fn property(self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.then(Step::Property(key.to_string(), value.into()))
    }

    /// Label the current element for later `from`/`to` references
    pub fn as_(self, name: &str) -> Self {
        self.then(Step::As(name.to_string()))
    }

    /// Create an edge; endpoints default to the current vertex
    pub fn add_e(self, label: &str) -> Self {
        self.then(Step::AddE { label: label.to_string(), from: None, to: None })
    }

    /// Source of the preceding `add_e`, by step label
    pub fn from(self, name: &str) -> Self {
        self.then(Step::From(name.to_string()))
    }

    /// Target of the preceding `add_e`, by step label
    pub fn to(self, name: &str) -> Self {
        self.then(Step::To(name.to_string()))
    }

    pub fn out_e(self, label: &str) -> Self {
        self.then(Step::Edges(Direction::Out, label.to_string()))
    }

    pub fn in_e(self, label: &str) -> Self {
        self.then(Step::Edges(Direction::In, label.to_string()))
    }

    /// Source vertex of the current edge
    pub fn out_v(self) -> Self {
        self.then(Step::OutV)
    }

    /// Target vertex of the current edge
    pub fn in_v(self) -> Self {
        self.then(Step::InV)
    }

    pub fn values(self, key: &str) -> Self {
        self.then(Step::Values(key.to_string()))
    }

    pub fn id(self) -> Self {
        self.then(Step::Id)
    }

    pub fn count(self) -> Self {
        self.then(Step::Count)
    }

    /// Remove the current elements from the graph
    pub fn drop(self) -> Self {
        self.then(Step::Drop)
    }

    /// Evaluate and collect every result
    pub async fn to_list(self) -> BenchResult<Vec<Element>> {
        let traversers = self.evaluate().await?;
        Ok(traversers.into_iter().filter_map(|t| t.current).collect())
    }

    /// Evaluate and return the first result
    pub async fn next(self) -> BenchResult<Option<Element>> {
        Ok(self.to_list().await?.into_iter().next())
    }

    /// Evaluate for side effects only
    pub async fn iterate(self) -> BenchResult<()> {
        self.evaluate().await.map(|_| ())
    }

    /// Fold `add_e` modulators into their edge step, and the properties
    /// that directly follow `add_v` (step labels aside) into the vertex
    /// creation, so unique indexes are checked before anything is stored
    fn compile(steps: Vec<Step>) -> BenchResult<Vec<Step>> {
        let mut compiled: Vec<Step> = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                Step::From(name) | Step::To(name) if !matches!(compiled.last(), Some(Step::AddE { .. })) => {
                    return Err(BenchError::InvalidStatement(format!(
                        "from/to('{}') must follow addE",
                        name
                    )));
                }
                Step::From(name) => {
                    if let Some(Step::AddE { from, .. }) = compiled.last_mut() {
                        *from = Some(name);
                    }
                }
                Step::To(name) => {
                    if let Some(Step::AddE { to, .. }) = compiled.last_mut() {
                        *to = Some(name);
                    }
                }
                Step::Property(key, value) => {
                    let pending = compiled.iter_mut().rev().find(|s| !matches!(s, Step::As(_)));
                    match pending {
                        Some(Step::AddV(_, properties)) => {
                            properties.insert(key, value);
                        }
                        _ => compiled.push(Step::Property(key, value)),
                    }
                }
                other => compiled.push(other),
            }
        }
        Ok(compiled)
    }

    async fn evaluate(self) -> BenchResult<Vec<Traverser>> {
        let steps = Self::compile(self.steps)?;
        if self.unbounded {
            trace!(steps = steps.len(), "unbounded traversal");
        }
        let db = self.db;
        let mut traversers = vec![Traverser::default()];

        for step in steps {
            let mut next = Vec::with_capacity(traversers.len());
            let to_out_vertex = matches!(step, Step::OutV);
            match step {
                Step::V(ids) => {
                    let ids = match ids {
                        Some(ids) => ids,
                        None => db.vertex_ids().await,
                    };
                    for t in &traversers {
                        for id in &ids {
                            if let Some(v) = db.lookup_vertex(id).await {
                                next.push(t.with(Element::Vertex(v)));
                            }
                        }
                    }
                }
                Step::HasLabel(label) => {
                    next = traversers
                        .into_iter()
                        .filter(|t| t.current.as_ref().and_then(Element::label) == Some(label.as_str()))
                        .collect();
                }
                Step::AddV(label, properties) => {
                    for t in &traversers {
                        let v = db.new_vertex(&label, properties.clone()).await?;
                        next.push(t.with(Element::Vertex(v)));
                    }
                }
                Step::Property(key, value) => {
                    for mut t in traversers {
                        if let Some(Element::Vertex(v)) = t.current.as_mut() {
                            db.set_property(&v.identity(), &key, value.clone()).await?;
                            v.set_property(key.clone(), value.clone());
                        } else {
                            return Err(BenchError::InvalidStatement(format!(
                                "property('{}') needs a vertex",
                                key
                            )));
                        }
                        next.push(t);
                    }
                }
                Step::As(name) => {
                    for mut t in traversers {
                        if let Some(current) = t.current.clone() {
                            t.labels.insert(name.clone(), current);
                        }
                        next.push(t);
                    }
                }
                Step::AddE { label, from, to } => {
                    for t in &traversers {
                        let resolve = |name: &Option<String>| -> BenchResult<String> {
                            let element = match name {
                                Some(name) => t.labels.get(name).ok_or_else(|| {
                                    BenchError::InvalidStatement(format!("no step labelled '{}'", name))
                                })?,
                                None => t.current.as_ref().ok_or_else(|| {
                                    BenchError::InvalidStatement("addE needs a current vertex".to_string())
                                })?,
                            };
                            element
                                .as_vertex()
                                .map(Vertex::identity)
                                .ok_or_else(|| BenchError::InvalidStatement("addE endpoints must be vertices".to_string()))
                        };
                        let out = resolve(&from)?;
                        let target = resolve(&to)?;
                        let edge = db.new_edge(&label, &out, &target).await?;
                        next.push(t.with(Element::Edge(edge)));
                    }
                }
                Step::From(_) | Step::To(_) => {}
                Step::Edges(direction, label) => {
                    for t in &traversers {
                        if let Some(Element::Vertex(v)) = &t.current {
                            for edge in db.edges(&v.identity(), direction, Some(label.as_str())).await? {
                                next.push(t.with(Element::Edge(edge)));
                            }
                        }
                    }
                }
                Step::OutV | Step::InV => {
                    for t in &traversers {
                        if let Some(Element::Edge(e)) = &t.current {
                            let end = if to_out_vertex { e.out } else { e.target };
                            let v = db
                                .lookup_vertex(&end.to_string())
                                .await
                                .ok_or_else(|| BenchError::ReferenceNotFound(end.to_string()))?;
                            next.push(t.with(Element::Vertex(v)));
                        }
                    }
                }
                Step::Values(key) => {
                    for t in &traversers {
                        if let Some(value) = t.current.as_ref().and_then(|c| c.value(&key)) {
                            next.push(t.with(Element::Value(value.clone())));
                        }
                    }
                }
                Step::Id => {
                    for t in &traversers {
                        if let Some(id) = t.current_id() {
                            next.push(t.with(Element::Value(PropertyValue::String(id))));
                        }
                    }
                }
                Step::Count => {
                    let n = traversers.iter().filter(|t| t.current.is_some()).count();
                    next.push(Traverser::default().with(Element::Value(PropertyValue::Integer(n as i64))));
                }
                Step::Drop => {
                    for t in &traversers {
                        match &t.current {
                            Some(Element::Vertex(v)) => {
                                // an earlier drop in this step may already have removed it
                                if db.lookup_vertex(&v.identity()).await.is_some() {
                                    db.delete_vertex(&v.identity()).await?;
                                }
                            }
                            Some(Element::Edge(e)) => {
                                if db.lookup_edge(&e.identity()).await.is_some() {
                                    db.delete_edge(&e.identity()).await?;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            traversers = next;
        }

        Ok(traversers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn id_of(t: GraphTraversal) -> String {
        t.id()
            .next()
            .await
            .unwrap()
            .and_then(|e| e.as_value().and_then(|v| v.as_string().map(str::to_string)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_and_scan() {
        let g = GraphTraversalSource::new(Database::new());
        g.add_v("endpoint").property("name", "Hepatoxicity").iterate().await.unwrap();
        g.add_v("endpoint").property("name", "Mutagenicity").iterate().await.unwrap();
        g.add_v("inputstructure").property("json", "e30=").iterate().await.unwrap();

        let names: Vec<String> = g
            .v()
            .has_label("endpoint")
            .values("name")
            .to_list()
            .await
            .unwrap()
            .iter()
            .filter_map(|e| e.as_value().and_then(|v| v.as_string()).map(str::to_string))
            .collect();
        assert_eq!(names, vec!["Hepatoxicity", "Mutagenicity"]);

        let count = g.v().has_label("endpoint").count().next().await.unwrap().unwrap();
        assert_eq!(count.as_value().and_then(PropertyValue::as_integer), Some(2));
    }

    #[tokio::test]
    async fn test_labelled_edge_creation() {
        let g = GraphTraversalSource::new(Database::new());
        let endpoint = id_of(g.add_v("endpoint").property("name", "Teratogenicity")).await;
        let structure = id_of(g.add_v("inputstructure").property("json", "e30=")).await;

        let prediction = id_of(
            g.add_v("predictionstructure")
                .as_("psv")
                .property("json", "e30=")
                .property("alerts", "Alert 1")
                .v_ids([endpoint.clone()])
                .as_("ev")
                .v_ids([structure.clone()])
                .as_("isv")
                .add_e("e_endpoint")
                .from("psv")
                .to("ev")
                .out_v()
                .add_e("e_predictionstructure")
                .from("isv")
                .to("psv")
                .in_v(),
        )
        .await;

        let linked = g.v_ids([endpoint.clone()]).in_e("e_endpoint").out_v().to_list().await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id(), Some(prediction.clone()));
        assert_eq!(linked[0].value("alerts").and_then(|v| v.as_string()), Some("Alert 1"));

        let from_structure = g.v_ids([structure]).out_e("e_predictionstructure").in_v().id().to_list().await.unwrap();
        assert_eq!(from_structure.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_id_yields_nothing() {
        let g = GraphTraversalSource::new(Database::new());
        assert!(g.v_ids(["#7:7"]).to_list().await.unwrap().is_empty());
        assert!(g.v_ids(["junk"]).next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drop_by_label() {
        let db = Database::new();
        let g = GraphTraversalSource::new(db.clone());
        let a = id_of(g.add_v("inputstructure")).await;
        let b = id_of(g.add_v("predictionstructure")).await;
        g.v_ids([a]).add_e("e_predictionstructure").to("x").iterate().await.unwrap_err();
        g.v().has_label("predictionstructure").drop().iterate().await.unwrap();

        assert!(db.lookup_vertex(&b).await.is_none());
        assert_eq!(db.count("inputstructure").await, 1);
    }

    #[tokio::test]
    async fn test_tx_rollback() {
        let db = Database::new();
        let g = GraphTraversalSource::new(db.clone());
        g.tx().open().await.unwrap();
        assert!(db.is_transaction_active().await);
        g.add_v("endpoint").property("name", "A").iterate().await.unwrap();
        g.tx().rollback().await.unwrap();
        assert_eq!(db.count("endpoint").await, 0);
    }

    #[tokio::test]
    async fn test_add_v_checks_unique_index_before_storing() {
        let db = Database::new();
        db.define_vertex_type("endpoint").await.unwrap();
        db.create_unique_index("endpoint", "name").await.unwrap();
        let g = GraphTraversalSource::new(db.clone());

        g.add_v("endpoint").as_("e").property("name", "Mutagenicity").iterate().await.unwrap();
        let result = g.add_v("endpoint").as_("e").property("name", "Mutagenicity").iterate().await;

        assert!(matches!(result, Err(BenchError::DuplicateKey { .. })));
        assert_eq!(db.count("endpoint").await, 1);
    }

    #[test]
    fn test_compile_folds_vertex_properties() {
        let steps = GraphTraversalSource::new(Database::new())
            .add_v("predictionstructure")
            .as_("psv")
            .property("json", "e30=")
            .v_ids(["#1:0"])
            .property("alerts", "Alert 1")
            .steps;
        let compiled = GraphTraversal::compile(steps).unwrap();

        assert_eq!(compiled.len(), 4);
        assert!(matches!(&compiled[0], Step::AddV(_, props) if props.len() == 1 && props.contains_key("json")));
        assert!(matches!(&compiled[3], Step::Property(key, _) if key == "alerts"));
    }

    #[tokio::test]
    async fn test_modulator_without_add_e() {
        let g = GraphTraversalSource::new(Database::new());
        let result = g.v().from("a").iterate().await;
        assert!(matches!(result, Err(BenchError::InvalidStatement(_))));
    }
}
