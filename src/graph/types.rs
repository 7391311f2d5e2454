//! Core type definitions for the embedded graph database

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record identifier: the bucket owned by a type plus a position inside it.
///
/// Rendered as `#bucket:position`. Only the database parses this form;
/// clients receive it as an opaque string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Rid {
    bucket: u32,
    position: u64,
}

impl Rid {
    pub fn new(bucket: u32, position: u64) -> Self {
        Rid { bucket, position }
    }

    pub fn bucket(&self) -> u32 {
        self.bucket
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Parse `#bucket:position`, returning `None` for anything else
    pub fn parse(text: &str) -> Option<Rid> {
        text.parse().ok()
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.bucket, self.position)
    }
}

/// Error returned when a string is not a record identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRidError(pub String);

impl fmt::Display for ParseRidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a record id: {}", self.0)
    }
}

impl std::error::Error for ParseRidError {}

impl FromStr for Rid {
    type Err = ParseRidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRidError(s.to_string());
        let body = s.trim().strip_prefix('#').ok_or_else(err)?;
        let (bucket, position) = body.split_once(':').ok_or_else(err)?;
        Ok(Rid {
            bucket: bucket.parse().map_err(|_| err())?,
            position: position.parse().map_err(|_| err())?,
        })
    }
}

/// Whether a type holds vertices or edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Vertex,
    Edge,
}

impl TypeKind {
    /// Category marker used in result rows (`v` / `e`)
    pub fn category(&self) -> &'static str {
        match self {
            TypeKind::Vertex => "v",
            TypeKind::Edge => "e",
        }
    }
}

/// Direction of an edge relative to a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Edges leaving the vertex
    Out,
    /// Edges arriving at the vertex
    In,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rid_display_and_parse() {
        let rid = Rid::new(3, 42);
        assert_eq!(rid.to_string(), "#3:42");
        assert_eq!(Rid::parse("#3:42"), Some(rid));
        assert_eq!(rid.bucket(), 3);
        assert_eq!(rid.position(), 42);
    }

    #[test]
    fn test_rid_rejects_garbage() {
        assert_eq!(Rid::parse("3:42"), None);
        assert_eq!(Rid::parse("#3"), None);
        assert_eq!(Rid::parse("#a:1"), None);
        assert_eq!(Rid::parse("endpoint"), None);
    }

    #[test]
    fn test_rid_ordering() {
        assert!(Rid::new(1, 9) < Rid::new(2, 0));
        assert!(Rid::new(2, 0) < Rid::new(2, 1));
    }

    #[test]
    fn test_type_kind_category() {
        assert_eq!(TypeKind::Vertex.category(), "v");
        assert_eq!(TypeKind::Edge.category(), "e");
    }
}
