//! In-memory graph storage implementation
//!
//! Every vertex and edge type owns a bucket; record ids are allocated
//! sequentially inside that bucket and never reused, so a rolled back
//! deletion can put a record back under its original id.

use super::edge::Edge;
use super::property::{PropertyMap, PropertyValue};
use super::types::{Direction, Rid, TypeKind};
use super::vertex::Vertex;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Vertex {0} not found")]
    VertexNotFound(Rid),

    #[error("Edge {0} not found")]
    EdgeNotFound(Rid),

    #[error("Invalid edge: source vertex {0} does not exist")]
    InvalidEdgeSource(Rid),

    #[error("Invalid edge: target vertex {0} does not exist")]
    InvalidEdgeTarget(Rid),

    #[error("Type {name} is not a {expected:?} type")]
    TypeMismatch { name: String, expected: TypeKind },

    #[error("Type {0} does not exist")]
    UnknownType(String),

    #[error("Duplicate key {value:?} on index {index}")]
    DuplicateKey { index: String, value: String },
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Schema entry for one vertex or edge type
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    pub bucket: u32,
    /// Declared property names (informational, values are not type checked)
    pub properties: BTreeSet<String>,
    /// Properties carrying a unique index
    pub unique: Vec<String>,
    next_position: u64,
}

/// Unique index: (type, property) -> value key -> owning vertex
type UniqueIndex = HashMap<(String, String), HashMap<String, Rid>>;

/// In-memory graph storage
///
/// Uses hash maps for O(1) lookup performance:
/// - vertices / edges: Rid -> record
/// - outgoing / incoming: Rid -> Vec<Rid> (adjacency lists)
/// - type_index: type -> ordered set of Rids (scans come back in insertion order)
#[derive(Debug, Default)]
pub struct GraphStore {
    types: IndexMap<String, TypeDef>,
    vertices: HashMap<Rid, Vertex>,
    edges: HashMap<Rid, Edge>,
    outgoing: HashMap<Rid, Vec<Rid>>,
    incoming: HashMap<Rid, Vec<Rid>>,
    type_index: HashMap<String, BTreeSet<Rid>>,
    unique_index: UniqueIndex,
}

impl GraphStore {
    /// Create a new empty graph store
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a type; returns `false` when it already exists with the same kind
    pub fn define_type(&mut self, name: &str, kind: TypeKind) -> GraphResult<bool> {
        if let Some(def) = self.types.get(name) {
            if def.kind != kind {
                return Err(GraphError::TypeMismatch { name: name.to_string(), expected: kind });
            }
            return Ok(false);
        }
        let bucket = self.types.len() as u32 + 1;
        self.types.insert(
            name.to_string(),
            TypeDef {
                name: name.to_string(),
                kind,
                bucket,
                properties: BTreeSet::new(),
                unique: Vec::new(),
                next_position: 0,
            },
        );
        Ok(true)
    }

    /// Get a type definition
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Declare a property on an existing type
    pub fn declare_property(&mut self, type_name: &str, property: &str) -> GraphResult<bool> {
        let def = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| GraphError::UnknownType(type_name.to_string()))?;
        Ok(def.properties.insert(property.to_string()))
    }

    /// Create a unique index, indexing the vertices already present
    pub fn create_unique_index(&mut self, type_name: &str, property: &str) -> GraphResult<bool> {
        let def = self
            .types
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownType(type_name.to_string()))?;
        if def.kind != TypeKind::Vertex {
            return Err(GraphError::TypeMismatch { name: type_name.to_string(), expected: TypeKind::Vertex });
        }
        if def.unique.iter().any(|p| p == property) {
            return Ok(false);
        }

        let index_name = format!("{}[{}]", type_name, property);
        let mut entries = HashMap::new();
        for vertex in self.vertices_of_type(type_name) {
            if let Some(key) = vertex.get_property(property).and_then(PropertyValue::index_key) {
                if entries.insert(key.clone(), vertex.rid).is_some() {
                    return Err(GraphError::DuplicateKey { index: index_name, value: key });
                }
            }
        }

        self.unique_index
            .insert((type_name.to_string(), property.to_string()), entries);
        if let Some(def) = self.types.get_mut(type_name) {
            def.unique.push(property.to_string());
        }
        Ok(true)
    }

    fn ensure_type(&mut self, name: &str, kind: TypeKind) -> GraphResult<()> {
        self.define_type(name, kind).map(|_| ())
    }

    fn allocate(&mut self, type_name: &str) -> GraphResult<Rid> {
        let def = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| GraphError::UnknownType(type_name.to_string()))?;
        let rid = Rid::new(def.bucket, def.next_position);
        def.next_position += 1;
        Ok(rid)
    }

    fn check_unique(&self, type_name: &str, rid: Rid, key: &str, value: &PropertyValue) -> GraphResult<()> {
        let Some(entries) = self.unique_index.get(&(type_name.to_string(), key.to_string())) else {
            return Ok(());
        };
        if let Some(index_key) = value.index_key() {
            if let Some(owner) = entries.get(&index_key) {
                if *owner != rid {
                    return Err(GraphError::DuplicateKey {
                        index: format!("{}[{}]", type_name, key),
                        value: index_key,
                    });
                }
            }
        }
        Ok(())
    }

    fn index_property(&mut self, type_name: &str, rid: Rid, key: &str, value: &PropertyValue) {
        if let Some(entries) = self.unique_index.get_mut(&(type_name.to_string(), key.to_string())) {
            if let Some(index_key) = value.index_key() {
                entries.insert(index_key, rid);
            }
        }
    }

    fn unindex_property(&mut self, type_name: &str, key: &str, value: &PropertyValue) {
        if let Some(entries) = self.unique_index.get_mut(&(type_name.to_string(), key.to_string())) {
            if let Some(index_key) = value.index_key() {
                entries.remove(&index_key);
            }
        }
    }

    /// Create a vertex, creating its type on first use
    pub fn create_vertex(&mut self, type_name: &str, properties: PropertyMap) -> GraphResult<Rid> {
        self.ensure_type(type_name, TypeKind::Vertex)?;
        let rid = self.allocate(type_name)?;
        for (key, value) in &properties {
            self.check_unique(type_name, rid, key, value)?;
        }
        self.insert_vertex(Vertex::new_with_properties(rid, type_name, properties));
        Ok(rid)
    }

    /// Put back a vertex removed earlier, under its original id
    pub fn restore_vertex(&mut self, vertex: Vertex) -> GraphResult<()> {
        self.ensure_type(&vertex.type_name, TypeKind::Vertex)?;
        for (key, value) in &vertex.properties {
            self.check_unique(&vertex.type_name, vertex.rid, key, value)?;
        }
        self.insert_vertex(vertex);
        Ok(())
    }

    fn insert_vertex(&mut self, vertex: Vertex) {
        let rid = vertex.rid;
        let properties: Vec<(String, PropertyValue)> =
            vertex.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (key, value) in &properties {
            self.index_property(&vertex.type_name, rid, key, value);
        }
        self.type_index
            .entry(vertex.type_name.clone())
            .or_default()
            .insert(rid);
        self.outgoing.entry(rid).or_default();
        self.incoming.entry(rid).or_default();
        self.vertices.insert(rid, vertex);
    }

    /// Get a vertex by id
    pub fn get_vertex(&self, rid: Rid) -> Option<&Vertex> {
        self.vertices.get(&rid)
    }

    /// Check if a vertex exists
    pub fn has_vertex(&self, rid: Rid) -> bool {
        self.vertices.contains_key(&rid)
    }

    /// Set a vertex property, returning the previous value
    pub fn set_vertex_property(
        &mut self,
        rid: Rid,
        key: &str,
        value: PropertyValue,
    ) -> GraphResult<Option<PropertyValue>> {
        let type_name = self
            .vertices
            .get(&rid)
            .map(|v| v.type_name.clone())
            .ok_or(GraphError::VertexNotFound(rid))?;
        self.check_unique(&type_name, rid, key, &value)?;

        self.index_property(&type_name, rid, key, &value);
        let old = self
            .vertices
            .get_mut(&rid)
            .and_then(|v| v.set_property(key, value));
        if let Some(old_value) = &old {
            self.unindex_property(&type_name, key, old_value);
            // the new value may share the old value's key
            if let Some(current) = self.vertices.get(&rid).and_then(|v| v.get_property(key)).cloned() {
                self.index_property(&type_name, rid, key, &current);
            }
        }
        Ok(old)
    }

    /// Remove a vertex property, returning the removed value
    pub fn remove_vertex_property(&mut self, rid: Rid, key: &str) -> GraphResult<Option<PropertyValue>> {
        let vertex = self.vertices.get_mut(&rid).ok_or(GraphError::VertexNotFound(rid))?;
        let type_name = vertex.type_name.clone();
        let old = vertex.remove_property(key);
        if let Some(old_value) = &old {
            self.unindex_property(&type_name, key, old_value);
        }
        Ok(old)
    }

    /// Delete a vertex and all its connected edges
    ///
    /// Returns the vertex and the edges removed with it.
    pub fn delete_vertex(&mut self, rid: Rid) -> GraphResult<(Vertex, Vec<Edge>)> {
        if !self.vertices.contains_key(&rid) {
            return Err(GraphError::VertexNotFound(rid));
        }

        let mut edge_ids: Vec<Rid> = self.outgoing.get(&rid).cloned().unwrap_or_default();
        for id in self.incoming.get(&rid).cloned().unwrap_or_default() {
            if !edge_ids.contains(&id) {
                edge_ids.push(id);
            }
        }
        let mut removed_edges = Vec::with_capacity(edge_ids.len());
        for edge_id in edge_ids {
            removed_edges.push(self.delete_edge(edge_id)?);
        }

        let vertex = self.vertices.remove(&rid).ok_or(GraphError::VertexNotFound(rid))?;
        for (key, value) in &vertex.properties {
            self.unindex_property(&vertex.type_name, key, value);
        }
        if let Some(ids) = self.type_index.get_mut(&vertex.type_name) {
            ids.remove(&rid);
        }
        self.outgoing.remove(&rid);
        self.incoming.remove(&rid);

        Ok((vertex, removed_edges))
    }

    /// Create an edge between two vertices, creating its type on first use
    pub fn create_edge(&mut self, type_name: &str, out: Rid, target: Rid) -> GraphResult<Rid> {
        if !self.has_vertex(out) {
            return Err(GraphError::InvalidEdgeSource(out));
        }
        if !self.has_vertex(target) {
            return Err(GraphError::InvalidEdgeTarget(target));
        }
        self.ensure_type(type_name, TypeKind::Edge)?;
        let rid = self.allocate(type_name)?;
        self.insert_edge(Edge::new(rid, type_name, out, target));
        Ok(rid)
    }

    /// Put back an edge removed earlier, under its original id
    pub fn restore_edge(&mut self, edge: Edge) -> GraphResult<()> {
        if !self.has_vertex(edge.out) {
            return Err(GraphError::InvalidEdgeSource(edge.out));
        }
        if !self.has_vertex(edge.target) {
            return Err(GraphError::InvalidEdgeTarget(edge.target));
        }
        self.ensure_type(&edge.type_name, TypeKind::Edge)?;
        self.insert_edge(edge);
        Ok(())
    }

    fn insert_edge(&mut self, edge: Edge) {
        let rid = edge.rid;
        self.outgoing.entry(edge.out).or_default().push(rid);
        self.incoming.entry(edge.target).or_default().push(rid);
        self.type_index
            .entry(edge.type_name.clone())
            .or_default()
            .insert(rid);
        self.edges.insert(rid, edge);
    }

    /// Get an edge by id
    pub fn get_edge(&self, rid: Rid) -> Option<&Edge> {
        self.edges.get(&rid)
    }

    /// Delete an edge
    pub fn delete_edge(&mut self, rid: Rid) -> GraphResult<Edge> {
        let edge = self.edges.remove(&rid).ok_or(GraphError::EdgeNotFound(rid))?;

        if let Some(ids) = self.type_index.get_mut(&edge.type_name) {
            ids.remove(&rid);
        }
        if let Some(adj) = self.outgoing.get_mut(&edge.out) {
            adj.retain(|&id| id != rid);
        }
        if let Some(adj) = self.incoming.get_mut(&edge.target) {
            adj.retain(|&id| id != rid);
        }

        Ok(edge)
    }

    /// Edges of a vertex in one direction, optionally restricted to a type
    pub fn edges_of(&self, rid: Rid, direction: Direction, type_name: Option<&str>) -> Vec<&Edge> {
        let adjacency = match direction {
            Direction::Out => &self.outgoing,
            Direction::In => &self.incoming,
        };
        adjacency
            .get(&rid)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.edges.get(id))
                    .filter(|e| type_name.map_or(true, |t| e.type_name == t))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All vertices of a type, in insertion order
    pub fn vertices_of_type(&self, type_name: &str) -> Vec<&Vertex> {
        self.type_index
            .get(type_name)
            .map(|ids| ids.iter().filter_map(|id| self.vertices.get(id)).collect())
            .unwrap_or_default()
    }

    /// All edges of a type, in insertion order
    pub fn edges_of_type(&self, type_name: &str) -> Vec<&Edge> {
        self.type_index
            .get(type_name)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    /// Number of records of a type
    pub fn count_of_type(&self, type_name: &str) -> usize {
        self.type_index.get(type_name).map_or(0, BTreeSet::len)
    }

    /// All vertex ids, ordered
    pub fn vertex_ids(&self) -> Vec<Rid> {
        let mut ids: Vec<Rid> = self.vertices.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Get total number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get total number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
