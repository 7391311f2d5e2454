//! Edge implementation for the property graph

use super::property::{PropertyMap, PropertyValue};
use super::types::{Rid, TypeKind};
use crate::result::{CATEGORY, IN, OUT, RID, TYPE};
use serde::{Deserialize, Serialize};

/// A directed edge in the property graph
///
/// Edges go from the `out` vertex to the `in` vertex; several edges may
/// connect the same pair of vertices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Record id of this edge
    pub rid: Rid,

    /// Edge type name (e.g. "e_endpoint")
    pub type_name: String,

    /// Source vertex (edge goes FROM this vertex)
    pub out: Rid,

    /// Target vertex (edge goes TO this vertex)
    pub target: Rid,

    /// Properties associated with this edge
    pub properties: PropertyMap,
}

impl Edge {
    /// Create a new directed edge
    pub fn new(rid: Rid, type_name: impl Into<String>, out: Rid, target: Rid) -> Self {
        Edge {
            rid,
            type_name: type_name.into(),
            out,
            target,
            properties: PropertyMap::new(),
        }
    }

    /// Opaque identity string handed to clients
    pub fn identity(&self) -> String {
        self.rid.to_string()
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// The vertex at the other end, seen from `vertex`
    pub fn other_end(&self, vertex: Rid) -> Rid {
        if self.out == vertex {
            self.target
        } else {
            self.out
        }
    }

    /// Render as a result row (`@rid`, `@type`, `@cat`, `@out`, `@in` plus properties)
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut row = serde_json::Map::new();
        row.insert(RID.to_string(), self.identity().into());
        row.insert(TYPE.to_string(), self.type_name.clone().into());
        row.insert(CATEGORY.to_string(), TypeKind::Edge.category().into());
        row.insert(OUT.to_string(), self.out.to_string().into());
        row.insert(IN.to_string(), self.target.to_string().into());
        for (k, v) in &self.properties {
            row.insert(k.clone(), v.to_json());
        }
        row
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.rid == other.rid
    }
}

impl Eq for Edge {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_ends() {
        let edge = Edge::new(Rid::new(5, 0), "e_endpoint", Rid::new(3, 1), Rid::new(1, 0));
        assert_eq!(edge.other_end(Rid::new(3, 1)), Rid::new(1, 0));
        assert_eq!(edge.other_end(Rid::new(1, 0)), Rid::new(3, 1));
    }

    #[test]
    fn test_edge_to_json() {
        let edge = Edge::new(Rid::new(5, 2), "e_endpoint", Rid::new(3, 1), Rid::new(1, 0));
        let row = edge.to_json();
        assert_eq!(row["@rid"], "#5:2");
        assert_eq!(row["@cat"], "e");
        assert_eq!(row["@out"], "#3:1");
        assert_eq!(row["@in"], "#1:0");
    }
}
