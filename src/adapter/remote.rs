//! RemoteAdapter: fixed SQL statements through the command interface
//!
//! Works against any `GraphCommands`: the in-process `Database` or an
//! `HttpDatabase` talking to a server. Record ids travel as positional
//! parameters; type names are part of the statement text.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    check_not_self, require_text, GraphAdapter, TxScope, ALERTS, DELETE_ORDER, ENDPOINT, E_ENDPOINT,
    E_PREDICTION_STRUCTURE, INPUT_STRUCTURE, JSON, NAME, PREDICTION_STRUCTURE, SCHEMA_SCRIPT,
};
use crate::commands::{CommandKind, GraphCommands};
use crate::error::{BenchError, BenchResult};
use crate::model::{decode_alerts, encode_alerts, EndpointDescriptor, PredictionLinkRequest, StructureDescriptor};
use crate::result::Row;
use crate::stats::GraphStats;

pub struct RemoteAdapter {
    commands: Arc<dyn GraphCommands>,
    transactions: bool,
}

fn row_id(row: &Row) -> BenchResult<String> {
    row.identity()
        .map(str::to_string)
        .ok_or_else(|| BenchError::DataCorruption("result row without @rid".to_string()))
}

impl RemoteAdapter {
    pub fn new(commands: Arc<dyn GraphCommands>, transactions: bool) -> Self {
        Self { commands, transactions }
    }

    async fn scope(&self) -> BenchResult<TxScope<'_, dyn GraphCommands>> {
        TxScope::open(self.commands.as_ref(), self.transactions).await
    }

    async fn select_all(&self, type_name: &str) -> BenchResult<Vec<Row>> {
        let rows = self.commands.query(&format!("SELECT FROM {}", type_name), &[]).await?;
        Ok(rows.into_iter().filter(Row::is_vertex).collect())
    }

    async fn count(&self, type_name: &str) -> BenchResult<u64> {
        let rows = self
            .commands
            .query(&format!("SELECT count(*) AS count FROM {}", type_name), &[])
            .await?;
        let count = rows
            .count()
            .ok_or_else(|| BenchError::DataCorruption(format!("no count returned for {}", type_name)))?;
        Ok(count.max(0) as u64)
    }

    async fn insert_vertex(&self, statement: &str, params: &[Value]) -> BenchResult<String> {
        let rows = self.commands.command(statement, params).await?;
        let row = rows
            .first()
            .ok_or_else(|| BenchError::DataCorruption(format!("no record returned by {}", statement)))?;
        row_id(row)
    }

    async fn predict_one(&self, request: &PredictionLinkRequest) -> BenchResult<String> {
        let structure = self
            .commands
            .lookup_by_id(&request.input_structure_id)
            .await?
            .ok_or_else(|| BenchError::ReferenceNotFound(request.input_structure_id.clone()))?;
        if self.commands.lookup_by_id(&request.endpoint_id).await?.is_none() {
            return Err(BenchError::ReferenceNotFound(request.endpoint_id.clone()));
        }
        let json = structure.get(JSON).cloned().unwrap_or(Value::Null);

        let prediction_id = self
            .insert_vertex(
                &format!("INSERT INTO {} SET {} = ?, {} = ?", PREDICTION_STRUCTURE, JSON, ALERTS),
                &[json, json!(encode_alerts(&request.alerts))],
            )
            .await?;
        self.commands
            .command(
                &format!("CREATE EDGE {} FROM ? TO ?", E_ENDPOINT),
                &[json!(prediction_id), json!(request.endpoint_id)],
            )
            .await?;
        self.commands
            .command(
                &format!("CREATE EDGE {} FROM ? TO ?", E_PREDICTION_STRUCTURE),
                &[json!(request.input_structure_id), json!(prediction_id)],
            )
            .await?;
        Ok(prediction_id)
    }

    async fn count_prediction_links(&self) -> BenchResult<u64> {
        let predictions = self.select_all(PREDICTION_STRUCTURE).await?;
        let mut total = 0u64;
        for prediction in &predictions {
            let id = row_id(prediction)?;
            require_text(prediction.get_string(JSON), JSON, &id)?;

            let endpoints = self
                .commands
                .query(&format!("SELECT expand(out('{}')) FROM ?", E_ENDPOINT), &[json!(id)])
                .await?;
            for endpoint in endpoints.iter() {
                let endpoint_id = row_id(endpoint)?;
                require_text(endpoint.get_string(NAME), NAME, &endpoint_id)?;
                total += 1;
            }

            let alerts = require_text(prediction.get_string(ALERTS), ALERTS, &id)?;
            total += 1 + decode_alerts(alerts).len() as u64;
        }
        Ok(total)
    }

    async fn predictions_of(&self, endpoint_id: &str) -> BenchResult<Vec<String>> {
        if self.commands.lookup_by_id(endpoint_id).await?.is_none() {
            return Err(BenchError::ReferenceNotFound(endpoint_id.to_string()));
        }
        let edges = self
            .commands
            .query(&format!("SELECT expand(inE('{}')) FROM ?", E_ENDPOINT), &[json!(endpoint_id)])
            .await?;
        let mut ids = Vec::with_capacity(edges.len());
        for edge in edges.iter() {
            let id = edge
                .out_vertex()
                .ok_or_else(|| BenchError::DataCorruption("edge row without @out".to_string()))?
                .to_string();
            check_not_self(endpoint_id, &id)?;
            ids.push(id);
        }
        Ok(ids)
    }
}

#[async_trait]
impl GraphAdapter for RemoteAdapter {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn prepare_schema(&self) -> BenchResult<()> {
        self.commands.execute(CommandKind::Script, SCHEMA_SCRIPT, &[]).await?;
        Ok(())
    }

    async fn delete_all(&self) -> BenchResult<()> {
        for type_name in DELETE_ORDER {
            let scope = self.scope().await?;
            let result = async {
                let vertices = self.select_all(type_name).await?;
                for vertex in &vertices {
                    self.commands.command("DELETE VERTEX ?", &[json!(row_id(vertex)?)]).await?;
                }
                Ok::<_, BenchError>(vertices.len())
            }
            .await;
            let deleted = scope.commit(result).await?;
            debug!(type_name, deleted, "deleted");
        }
        Ok(())
    }

    async fn create_endpoint(&self, name: &str) -> BenchResult<String> {
        let scope = self.scope().await?;
        let result = self
            .insert_vertex(&format!("INSERT INTO {} SET {} = ?", ENDPOINT, NAME), &[json!(name)])
            .await;
        scope.commit(result).await
    }

    async fn insert(&self, payloads: &[String]) -> BenchResult<Vec<String>> {
        let scope = self.scope().await?;
        let statement = format!("INSERT INTO {} SET {} = ?", INPUT_STRUCTURE, JSON);
        let result = async {
            let mut ids = Vec::with_capacity(payloads.len());
            for payload in payloads {
                ids.push(self.insert_vertex(&statement, &[json!(payload)]).await?);
            }
            Ok::<_, BenchError>(ids)
        }
        .await;
        scope.commit(result).await
    }

    async fn predict(&self, requests: &[PredictionLinkRequest]) -> BenchResult<Vec<String>> {
        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            let scope = self.scope().await?;
            let result = self.predict_one(request).await;
            ids.push(scope.commit(result).await?);
        }
        Ok(ids)
    }

    async fn query_all_structures(&self) -> BenchResult<Vec<StructureDescriptor>> {
        let scope = self.scope().await?;
        let result = async {
            let rows = self.select_all(INPUT_STRUCTURE).await?;
            info!(count = rows.len(), "queried input structures");
            let mut structures = Vec::with_capacity(rows.len());
            for row in &rows {
                let id = row_id(row)?;
                let payload = require_text(row.get_string(JSON), JSON, &id)?.to_string();
                structures.push(StructureDescriptor { id, payload });
            }
            Ok::<_, BenchError>(structures)
        }
        .await;
        scope.rollback(result).await
    }

    async fn query_all_predictions_with_links(&self) -> BenchResult<u64> {
        let scope = self.scope().await?;
        let result = self.count_prediction_links().await;
        scope.rollback(result).await
    }

    async fn find_all_endpoints(&self) -> BenchResult<Vec<EndpointDescriptor>> {
        let scope = self.scope().await?;
        let result = async {
            let rows = self.select_all(ENDPOINT).await?;
            let mut endpoints = Vec::with_capacity(rows.len());
            for row in &rows {
                endpoints.push(EndpointDescriptor {
                    id: row_id(row)?,
                    name: row.get_string(NAME).unwrap_or_default().to_string(),
                });
            }
            Ok::<_, BenchError>(endpoints)
        }
        .await;
        scope.rollback(result).await
    }

    async fn find_predictions_by_endpoint(&self, endpoint_id: &str) -> BenchResult<Vec<String>> {
        let scope = self.scope().await?;
        let result = self.predictions_of(endpoint_id).await;
        scope.rollback(result).await
    }

    async fn stats(&self) -> BenchResult<GraphStats> {
        let scope = self.scope().await?;
        let result = async {
            Ok::<_, BenchError>(GraphStats {
                structures: self.count(INPUT_STRUCTURE).await?,
                predictions: self.count(PREDICTION_STRUCTURE).await?,
                endpoints: self.count(ENDPOINT).await?,
            })
        }
        .await;
        scope.rollback(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[tokio::test]
    async fn test_statements_round_trip_through_database() {
        let adapter = RemoteAdapter::new(Arc::new(Database::new()), true);
        adapter.prepare_schema().await.unwrap();
        adapter.prepare_schema().await.unwrap();

        let endpoint = adapter.create_endpoint("Hepatoxicity").await.unwrap();
        let structures = adapter.insert(&["e30=".to_string()]).await.unwrap();
        let request = PredictionLinkRequest {
            input_structure_id: structures[0].clone(),
            endpoint_id: endpoint.clone(),
            alerts: vec!["Alert 2".into(), "Alert 3".into()],
        };
        let predictions = adapter.predict(&[request]).await.unwrap();

        assert_eq!(adapter.find_predictions_by_endpoint(&endpoint).await.unwrap(), predictions);
        assert_eq!(adapter.query_all_predictions_with_links().await.unwrap(), 1 + 1 + 2);
        let stats = adapter.stats().await.unwrap();
        assert_eq!((stats.structures, stats.predictions, stats.endpoints), (1, 1, 1));
    }

    #[test]
    fn test_row_id_requires_rid() {
        assert!(matches!(row_id(&Row::default()), Err(BenchError::DataCorruption(_))));
    }
}
