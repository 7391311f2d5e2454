//! HttpDatabase: client for a running graph server
//!
//! Speaks the ArcadeDB HTTP API:
//! - `POST /api/v1/command/{db}` for statements and scripts
//! - `POST /api/v1/query/{db}` for read-only statements
//! - `POST /api/v1/begin|commit|rollback/{db}` for transactions
//!
//! A transaction is bound to the session id returned by `begin`; every
//! request sends it back until commit or rollback.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::commands::{CommandKind, GraphCommands};
use crate::error::{BenchError, BenchResult};
use crate::graph::Rid;
use crate::result::{ResultSet, Row};

/// Session header used by the server to bind requests to a transaction
pub const SESSION_HEADER: &str = "arcadedb-session-id";

/// Exception class the server reports for unique index violations
const DUPLICATE_KEY_EXCEPTION: &str = "DuplicatedKeyException";
const RECORD_NOT_FOUND_EXCEPTION: &str = "RecordNotFoundException";

/// Client for one database on a remote server
pub struct HttpDatabase {
    base_url: String,
    database: String,
    user: String,
    password: String,
    client: Client,
    session: Mutex<Option<String>>,
    unbounded_queries: bool,
}

impl HttpDatabase {
    /// Create a client for `database` on the server at `base_url`
    ///
    /// # Example
    /// ```no_run
    /// # use graphbench::HttpDatabase;
    /// let db = HttpDatabase::new("http://localhost:2480", "benchmark", "root", "playwithdata");
    /// ```
    pub fn new(base_url: &str, database: &str, user: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            database: database.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            client: Client::new(),
            session: Mutex::new(None),
            unbounded_queries: false,
        }
    }

    /// Send `timeout: 0` with read-only queries
    pub fn with_unbounded_queries(mut self, unbounded: bool) -> Self {
        self.unbounded_queries = unbounded;
        self
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/api/v1/{}/{}", self.base_url, action, self.database)
    }

    async fn post(&self, action: &str, body: Option<&Value>) -> BenchResult<Response> {
        let url = self.endpoint(action);
        let mut request = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password));
        if let Some(session) = self.session.lock().await.as_deref() {
            request = request.header(SESSION_HEADER, session);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        trace!(url = %url, "POST");
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body: Value = response
                .json()
                .await
                .unwrap_or_else(|_| json!({"error": "Unknown error"}));
            Err(error_from_body(status, &body))
        }
    }
}

/// Request body for a statement
pub fn request_body(kind: CommandKind, statement: &str, params: &[Value], unbounded: bool) -> Value {
    let mut body = Map::new();
    body.insert("language".to_string(), json!(kind.language()));
    body.insert("command".to_string(), json!(statement));
    if !params.is_empty() {
        let positional: Map<String, Value> = params
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect();
        body.insert("params".to_string(), Value::Object(positional));
    }
    if unbounded && kind == CommandKind::Query {
        body.insert("timeout".to_string(), json!(0));
    }
    Value::Object(body)
}

/// Map a server error body to a `BenchError`
pub fn error_from_body(status: u16, body: &Value) -> BenchError {
    fn field<'a>(body: &'a Value, key: &str) -> &'a str {
        body.get(key).and_then(Value::as_str).unwrap_or_default()
    }
    let text = |key: &str| field(body, key);
    let message = match (text("error"), text("detail")) {
        ("", "") => "Unknown error".to_string(),
        (error, "") => error.to_string(),
        ("", detail) => detail.to_string(),
        (error, detail) => format!("{}: {}", error, detail),
    };
    if text("exception").ends_with(DUPLICATE_KEY_EXCEPTION) {
        return BenchError::DuplicateKey { index: text("exception").to_string(), value: message };
    }
    if text("exception").ends_with(RECORD_NOT_FOUND_EXCEPTION) {
        return BenchError::ReferenceNotFound(message);
    }
    BenchError::Remote { status, message }
}

/// Whether a failed lookup means the record does not exist
fn is_missing_record(err: &BenchError) -> bool {
    matches!(err, BenchError::ReferenceNotFound(_) | BenchError::Remote { status: 404, .. })
}

#[async_trait]
impl GraphCommands for HttpDatabase {
    async fn execute(&self, kind: CommandKind, statement: &str, params: &[Value]) -> BenchResult<ResultSet> {
        let action = match kind {
            CommandKind::Query => "query",
            CommandKind::Command | CommandKind::Script => "command",
        };
        let body = request_body(kind, statement, params, self.unbounded_queries);
        debug!(?kind, statement, params = params.len(), "remote execute");
        let response = self.post(action, Some(&body)).await?;
        Ok(response.json().await?)
    }

    async fn begin(&self) -> BenchResult<()> {
        if self.session.lock().await.is_some() {
            return Err(BenchError::TransactionAlreadyOpen);
        }
        let response = self.post("begin", None).await?;
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| BenchError::Remote {
                status: response.status().as_u16(),
                message: format!("begin returned no {} header", SESSION_HEADER),
            })?
            .to_string();
        debug!(session = %session, "transaction opened");
        *self.session.lock().await = Some(session);
        Ok(())
    }

    async fn commit(&self) -> BenchResult<()> {
        if self.session.lock().await.is_none() {
            return Err(BenchError::NoTransaction);
        }
        let result = self.post("commit", None).await;
        *self.session.lock().await = None;
        result.map(|_| ())
    }

    async fn rollback(&self) -> BenchResult<()> {
        if self.session.lock().await.is_none() {
            return Err(BenchError::NoTransaction);
        }
        let result = self.post("rollback", None).await;
        *self.session.lock().await = None;
        result.map(|_| ())
    }

    async fn lookup_by_id(&self, id: &str) -> BenchResult<Option<Row>> {
        let Some(rid) = Rid::parse(id) else {
            return Ok(None);
        };
        match self.query(&format!("SELECT FROM {}", rid), &[]).await {
            Ok(rows) => Ok(rows.into_iter().next()),
            Err(e) if is_missing_record(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let db = HttpDatabase::new("http://localhost:2480/", "bench", "root", "pw");
        assert_eq!(db.endpoint("command"), "http://localhost:2480/api/v1/command/bench");
        assert_eq!(db.endpoint("begin"), "http://localhost:2480/api/v1/begin/bench");
    }

    #[test]
    fn test_request_body_params() {
        let body = request_body(
            CommandKind::Command,
            "INSERT INTO endpoint SET name = ?",
            &[json!("Mutagenicity")],
            true,
        );
        assert_eq!(body["language"], "sql");
        assert_eq!(body["params"]["0"], "Mutagenicity");
        assert!(body.get("timeout").is_none());
    }

    #[test]
    fn test_request_body_unbounded_query() {
        let body = request_body(CommandKind::Query, "SELECT FROM endpoint", &[], true);
        assert_eq!(body["timeout"], 0);
        assert!(body.get("params").is_none());

        let bounded = request_body(CommandKind::Query, "SELECT FROM endpoint", &[], false);
        assert!(bounded.get("timeout").is_none());
    }

    #[test]
    fn test_script_language() {
        let body = request_body(CommandKind::Script, "create vertex type a; create vertex type b;", &[], false);
        assert_eq!(body["language"], "sqlscript");
    }

    #[test]
    fn test_error_mapping() {
        let err = error_from_body(500, &json!({"error": "Cannot execute command", "detail": "bad syntax"}));
        match err {
            BenchError::Remote { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Cannot execute command: bad syntax");
            }
            other => panic!("unexpected {:?}", other),
        }

        let dup = error_from_body(
            503,
            &json!({"error": "Duplicated key", "exception": "com.arcadedb.exception.DuplicatedKeyException"}),
        );
        assert!(matches!(dup, BenchError::DuplicateKey { .. }));

        let empty = error_from_body(400, &json!({}));
        assert!(matches!(empty, BenchError::Remote { message, .. } if message == "Unknown error"));
    }

    #[test]
    fn test_missing_record_from_exception_class() {
        let missing = error_from_body(
            500,
            &json!({"error": "Record #3:9 not found", "exception": "com.arcadedb.exception.RecordNotFoundException"}),
        );
        assert!(matches!(missing, BenchError::ReferenceNotFound(_)));
        assert!(is_missing_record(&missing));
        assert!(is_missing_record(&BenchError::Remote { status: 404, message: String::new() }));

        // the wording alone is not enough
        let worded = error_from_body(500, &json!({"error": "Index not found"}));
        assert!(!is_missing_record(&worded));
    }

    #[tokio::test]
    async fn test_commit_without_begin() {
        let db = HttpDatabase::new("http://localhost:1", "bench", "root", "pw");
        assert!(matches!(db.commit().await, Err(BenchError::NoTransaction)));
        assert!(matches!(db.rollback().await, Err(BenchError::NoTransaction)));
    }

    #[tokio::test]
    async fn test_lookup_malformed_id_skips_request() {
        let db = HttpDatabase::new("http://localhost:1", "bench", "root", "pw");
        assert!(db.lookup_by_id("not-an-id").await.unwrap().is_none());
    }
}
