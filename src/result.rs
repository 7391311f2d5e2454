//! Result rows returned by the collaborator command interface
//!
//! Local and remote databases both answer with JSON objects, so a row is a
//! thin typed view over a `serde_json` map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Row metadata keys
pub const RID: &str = "@rid";
pub const TYPE: &str = "@type";
pub const CATEGORY: &str = "@cat";
pub const OUT: &str = "@out";
pub const IN: &str = "@in";

/// A single result row (a vertex, an edge or a projection)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new(fields: Map<String, Value>) -> Self {
        Row(fields)
    }

    /// Opaque record id, if the row is a record
    pub fn identity(&self) -> Option<&str> {
        self.get_string(RID)
    }

    /// Type name, if the row is a record
    pub fn type_name(&self) -> Option<&str> {
        self.get_string(TYPE)
    }

    pub fn is_vertex(&self) -> bool {
        self.get_string(CATEGORY) == Some("v")
    }

    /// Source vertex id of an edge row
    pub fn out_vertex(&self) -> Option<&str> {
        self.get_string(OUT)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }
}

impl From<Map<String, Value>> for Row {
    fn from(fields: Map<String, Value>) -> Self {
        Row(fields)
    }
}

/// Rows produced by one statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub result: Vec<Row>,
}

impl ResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        ResultSet { result: rows }
    }

    pub fn len(&self) -> usize {
        self.result.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.result.iter()
    }

    pub fn first(&self) -> Option<&Row> {
        self.result.first()
    }

    /// Value of the `count` column of the first row
    pub fn count(&self) -> Option<i64> {
        self.first().and_then(|r| r.get_int("count"))
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.result.into_iter()
    }
}
