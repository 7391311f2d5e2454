//! Statement shapes understood by the embedded database
//!
//! This is not a SQL engine: it recognises the fixed statement shapes the
//! remote adapter sends and the schema script, and nothing else.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::{BenchError, BenchResult};
use crate::graph::{Direction, TypeKind};

static SELECT_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^select\s+count\s*\(\s*\*\s*\)(?:\s+as\s+count)?\s+from\s+(\S+)$").unwrap()
});
static SELECT_EXPAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^select\s+expand\s*\(\s*(oute|ine|out|in)\s*\(\s*'([^']+)'\s*\)\s*\)\s+from\s+(\S+)$").unwrap()
});
static SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^select\s+from\s+(\S+)$").unwrap());
static INSERT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^insert\s+into\s+(\w+)\s+set\s+(.+)$").unwrap());
static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\w+)\s*=\s*(\?|'[^']*')\s*$").unwrap());
static CREATE_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^create\s+(vertex|edge)\s+type\s+(\w+)(?:\s+if\s+not\s+exists)?$").unwrap()
});
static CREATE_EDGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^create\s+edge\s+(\w+)\s+from\s+(\S+)\s+to\s+(\S+)$").unwrap()
});
static DELETE_VERTEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^delete\s+vertex\s+(\S+)$").unwrap());
static CREATE_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^create\s+property\s+(\w+)\.(\w+)(?:\s+if\s+not\s+exists)?(?:\s+\w+)?$").unwrap()
});
static CREATE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^create\s+index\s+(?:if\s+not\s+exists\s+)?on\s+(\w+)\s*\(\s*(\w+)\s*\)\s+unique$").unwrap()
});

/// A literal or a positional parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(String),
    Param,
}

impl Operand {
    fn parse(token: &str) -> Self {
        let token = token.trim();
        if token == "?" {
            Operand::Param
        } else if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
            Operand::Literal(token[1..token.len() - 1].to_string())
        } else {
            Operand::Literal(token.to_string())
        }
    }
}

/// One parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `SELECT FROM <type|id>`
    Select { target: Operand },
    /// `SELECT count(*) AS count FROM <type>`
    Count { target: Operand },
    /// `SELECT expand(out|in|outE|inE('<type>')) FROM <id>`
    Expand {
        direction: Direction,
        edges: bool,
        edge_type: String,
        target: Operand,
    },
    /// `INSERT INTO <type> SET k = ?, ...`
    Insert {
        type_name: String,
        fields: Vec<(String, Operand)>,
    },
    /// `CREATE EDGE <type> FROM <id> TO <id>`
    CreateEdge {
        type_name: String,
        from: Operand,
        to: Operand,
    },
    /// `DELETE VERTEX <id>`
    DeleteVertex { target: Operand },
    /// `CREATE VERTEX|EDGE TYPE <name> [IF NOT EXISTS]`
    CreateType { kind: TypeKind, name: String },
    /// `CREATE PROPERTY <type>.<name> [IF NOT EXISTS] [<type>]`
    CreateProperty { type_name: String, property: String },
    /// `CREATE INDEX [IF NOT EXISTS] ON <type> (<property>) UNIQUE`
    CreateUniqueIndex { type_name: String, property: String },
}

impl Statement {
    /// Whether executing this statement can change the graph
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Statement::Select { .. } | Statement::Count { .. } | Statement::Expand { .. }
        )
    }
}

/// Parse a single statement
pub fn parse_statement(text: &str) -> BenchResult<Statement> {
    let text = text.trim().trim_end_matches(';').trim();

    if let Some(c) = SELECT_COUNT.captures(text) {
        return Ok(Statement::Count { target: Operand::parse(&c[1]) });
    }
    if let Some(c) = SELECT_EXPAND.captures(text) {
        let step = c[1].to_ascii_lowercase();
        let direction = if step.starts_with("out") { Direction::Out } else { Direction::In };
        return Ok(Statement::Expand {
            direction,
            edges: step.ends_with('e'),
            edge_type: c[2].to_string(),
            target: Operand::parse(&c[3]),
        });
    }
    if let Some(c) = SELECT.captures(text) {
        return Ok(Statement::Select { target: Operand::parse(&c[1]) });
    }
    if let Some(c) = INSERT.captures(text) {
        let mut fields = Vec::new();
        for assignment in c[2].split(',') {
            let a = ASSIGNMENT
                .captures(assignment)
                .ok_or_else(|| BenchError::InvalidStatement(text.to_string()))?;
            fields.push((a[1].to_string(), Operand::parse(&a[2])));
        }
        return Ok(Statement::Insert { type_name: c[1].to_string(), fields });
    }
    if let Some(c) = CREATE_TYPE.captures(text) {
        let kind = if c[1].eq_ignore_ascii_case("vertex") { TypeKind::Vertex } else { TypeKind::Edge };
        return Ok(Statement::CreateType { kind, name: c[2].to_string() });
    }
    if let Some(c) = CREATE_EDGE.captures(text) {
        return Ok(Statement::CreateEdge {
            type_name: c[1].to_string(),
            from: Operand::parse(&c[2]),
            to: Operand::parse(&c[3]),
        });
    }
    if let Some(c) = DELETE_VERTEX.captures(text) {
        return Ok(Statement::DeleteVertex { target: Operand::parse(&c[1]) });
    }
    if let Some(c) = CREATE_PROPERTY.captures(text) {
        return Ok(Statement::CreateProperty { type_name: c[1].to_string(), property: c[2].to_string() });
    }
    if let Some(c) = CREATE_INDEX.captures(text) {
        return Ok(Statement::CreateUniqueIndex { type_name: c[1].to_string(), property: c[2].to_string() });
    }

    Err(BenchError::InvalidStatement(text.to_string()))
}

/// Parse a `;` separated script, skipping empty statements
pub fn parse_script(text: &str) -> BenchResult<Vec<Statement>> {
    text.split(';')
        .filter(|s| !s.trim().is_empty())
        .map(parse_statement)
        .collect()
}

/// Hands out positional parameters in the order the `?` markers appear
pub struct Params<'a> {
    values: &'a [Value],
    next: usize,
}

impl<'a> Params<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Params { values, next: 0 }
    }

    /// Resolve an operand to a JSON value
    pub fn bind(&mut self, operand: &Operand) -> BenchResult<Value> {
        match operand {
            Operand::Literal(s) => Ok(Value::String(s.clone())),
            Operand::Param => {
                let value = self.values.get(self.next).cloned().ok_or_else(|| {
                    BenchError::InvalidStatement(format!("missing parameter #{}", self.next))
                })?;
                self.next += 1;
                Ok(value)
            }
        }
    }

    /// Resolve an operand that must be text (a type name or a record id)
    pub fn bind_text(&mut self, operand: &Operand) -> BenchResult<String> {
        match self.bind(operand)? {
            Value::String(s) => Ok(s),
            other => Err(BenchError::InvalidStatement(format!("expected text parameter, got {}", other))),
        }
    }
}
