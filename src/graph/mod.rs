//! Embedded property graph
//!
//! This module implements the storage side of the in-process database:
//! - Vertices and directed edges, each belonging to one named type
//! - Record ids allocated per type bucket (`#bucket:position`)
//! - Type index for label scans, adjacency lists for edge walks
//! - Unique property indexes

pub mod edge;
pub mod property;
pub mod store;
pub mod types;
pub mod vertex;

// Re-export main types
pub use edge::Edge;
pub use property::{PropertyMap, PropertyValue};
pub use store::{GraphError, GraphResult, GraphStore, TypeDef};
pub use types::{Direction, Rid, TypeKind};
pub use vertex::Vertex;
