//! Vertex implementation for the property graph

use super::property::{PropertyMap, PropertyValue};
use super::types::{Rid, TypeKind};
use crate::result::{CATEGORY, RID, TYPE};
use serde::{Deserialize, Serialize};

/// A vertex in the property graph
///
/// Vertices have:
/// - A record id assigned by the store
/// - Exactly one vertex type
/// - Properties (key-value pairs)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    /// Record id of this vertex
    pub rid: Rid,

    /// Vertex type name (e.g. "endpoint")
    pub type_name: String,

    /// Properties associated with this vertex
    pub properties: PropertyMap,
}

impl Vertex {
    /// Create a new vertex without properties
    pub fn new(rid: Rid, type_name: impl Into<String>) -> Self {
        Vertex {
            rid,
            type_name: type_name.into(),
            properties: PropertyMap::new(),
        }
    }

    /// Create a new vertex with properties
    pub fn new_with_properties(rid: Rid, type_name: impl Into<String>, properties: PropertyMap) -> Self {
        Vertex {
            rid,
            type_name: type_name.into(),
            properties,
        }
    }

    /// Opaque identity string handed to clients
    pub fn identity(&self) -> String {
        self.rid.to_string()
    }

    /// Set a property value, returning the previous one
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        self.properties.insert(key.into(), value.into())
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Get a string property
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_string)
    }

    /// Remove a property
    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    /// Render as a result row (`@rid`, `@type`, `@cat` plus properties)
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut row = serde_json::Map::new();
        row.insert(RID.to_string(), self.identity().into());
        row.insert(TYPE.to_string(), self.type_name.clone().into());
        row.insert(CATEGORY.to_string(), TypeKind::Vertex.category().into());
        for (k, v) in &self.properties {
            row.insert(k.clone(), v.to_json());
        }
        row
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.rid == other.rid
    }
}

impl Eq for Vertex {}
