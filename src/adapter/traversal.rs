//! TraversalAdapter: benchmark operations as step-based traversals

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    check_not_self, require_text, GraphAdapter, TxScope, ALERTS, DELETE_ORDER, ENDPOINT, E_ENDPOINT,
    E_PREDICTION_STRUCTURE, INPUT_STRUCTURE, JSON, NAME, PREDICTION_STRUCTURE,
};
use crate::database::Database;
use crate::error::{BenchError, BenchResult};
use crate::graph::PropertyValue;
use crate::model::{decode_alerts, encode_alerts, EndpointDescriptor, PredictionLinkRequest, StructureDescriptor};
use crate::stats::GraphStats;
use crate::traversal::{Element, GraphTraversal, GraphTraversalSource, Transaction};

pub struct TraversalAdapter {
    g: GraphTraversalSource,
    db: Database,
    transactions: bool,
    unbounded_queries: bool,
}

fn text(element: &Element, key: &str) -> Option<String> {
    element.value(key).and_then(PropertyValue::as_string).map(str::to_string)
}

/// Id produced by a traversal ending in `id()`
async fn next_id(traversal: GraphTraversal) -> BenchResult<String> {
    traversal
        .id()
        .next()
        .await?
        .and_then(|e| e.as_value().and_then(PropertyValue::as_string).map(str::to_string))
        .ok_or_else(|| BenchError::DataCorruption("traversal produced no id".to_string()))
}

impl TraversalAdapter {
    pub fn new(db: Database, transactions: bool, unbounded_queries: bool) -> Self {
        Self { g: GraphTraversalSource::new(db.clone()), db, transactions, unbounded_queries }
    }

    /// Source for read-only traversals
    fn reader(&self) -> GraphTraversalSource {
        if self.unbounded_queries {
            self.g.with_unbounded_evaluation()
        } else {
            self.g.clone()
        }
    }

    async fn scope<'a>(&self, tx: &'a Transaction<'a>) -> BenchResult<TxScope<'a, Transaction<'a>>> {
        TxScope::open(tx, self.transactions).await
    }

    async fn predict_one(&self, request: &PredictionLinkRequest) -> BenchResult<String> {
        let structure = self
            .g
            .v_ids([request.input_structure_id.as_str()])
            .next()
            .await?
            .ok_or_else(|| BenchError::ReferenceNotFound(request.input_structure_id.clone()))?;
        if self.g.v_ids([request.endpoint_id.as_str()]).next().await?.is_none() {
            return Err(BenchError::ReferenceNotFound(request.endpoint_id.clone()));
        }
        let json = structure.value(JSON).cloned().unwrap_or(PropertyValue::Null);

        next_id(
            self.g
                .add_v(PREDICTION_STRUCTURE)
                .as_("psv")
                .property(JSON, json)
                .property(ALERTS, encode_alerts(&request.alerts))
                .v_ids([request.endpoint_id.as_str()])
                .as_("ev")
                .v_ids([request.input_structure_id.as_str()])
                .as_("isv")
                .add_e(E_ENDPOINT)
                .from("psv")
                .to("ev")
                .out_v()
                .add_e(E_PREDICTION_STRUCTURE)
                .from("isv")
                .to("psv")
                .in_v(),
        )
        .await
    }

    async fn count_prediction_links(&self) -> BenchResult<u64> {
        let g = self.reader();
        let predictions = g.v().has_label(PREDICTION_STRUCTURE).to_list().await?;
        let mut total = 0u64;
        for prediction in &predictions {
            let id = prediction.id().unwrap_or_default();
            require_text(text(prediction, JSON).as_deref(), JSON, &id)?;

            let endpoints = g.v_ids([id.as_str()]).out_e(E_ENDPOINT).in_v().to_list().await?;
            for endpoint in &endpoints {
                let endpoint_id = endpoint.id().unwrap_or_default();
                require_text(text(endpoint, NAME).as_deref(), NAME, &endpoint_id)?;
                total += 1;
            }

            let alerts = text(prediction, ALERTS);
            let alerts = require_text(alerts.as_deref(), ALERTS, &id)?;
            total += 1 + decode_alerts(alerts).len() as u64;
        }
        Ok(total)
    }

    async fn count_label(&self, label: &str) -> BenchResult<u64> {
        let count = self.g.v().has_label(label).count().next().await?;
        Ok(count
            .and_then(|e| e.as_value().and_then(PropertyValue::as_integer))
            .unwrap_or(0)
            .max(0) as u64)
    }
}

#[async_trait]
impl GraphAdapter for TraversalAdapter {
    fn name(&self) -> &'static str {
        "traversal"
    }

    async fn prepare_schema(&self) -> BenchResult<()> {
        for vertex_type in [INPUT_STRUCTURE, ENDPOINT, PREDICTION_STRUCTURE] {
            self.db.define_vertex_type(vertex_type).await?;
        }
        for edge_type in [E_ENDPOINT, E_PREDICTION_STRUCTURE] {
            self.db.define_edge_type(edge_type).await?;
        }
        self.db.create_unique_index(ENDPOINT, NAME).await?;
        Ok(())
    }

    async fn delete_all(&self) -> BenchResult<()> {
        let tx = self.g.tx();
        for label in DELETE_ORDER {
            let scope = self.scope(&tx).await?;
            let result = self.g.v().has_label(label).drop().iterate().await;
            scope.commit(result).await?;
            debug!(label, "dropped");
        }
        Ok(())
    }

    async fn create_endpoint(&self, name: &str) -> BenchResult<String> {
        let tx = self.g.tx();
        let scope = self.scope(&tx).await?;
        let result = next_id(self.g.add_v(ENDPOINT).property(NAME, name)).await;
        scope.commit(result).await
    }

    async fn insert(&self, payloads: &[String]) -> BenchResult<Vec<String>> {
        let tx = self.g.tx();
        let scope = self.scope(&tx).await?;
        let result = async {
            let mut ids = Vec::with_capacity(payloads.len());
            for payload in payloads {
                ids.push(next_id(self.g.add_v(INPUT_STRUCTURE).property(JSON, payload.as_str())).await?);
            }
            Ok::<_, BenchError>(ids)
        }
        .await;
        scope.commit(result).await
    }

    async fn predict(&self, requests: &[PredictionLinkRequest]) -> BenchResult<Vec<String>> {
        let tx = self.g.tx();
        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            let scope = self.scope(&tx).await?;
            let result = self.predict_one(request).await;
            ids.push(scope.commit(result).await?);
        }
        Ok(ids)
    }

    async fn query_all_structures(&self) -> BenchResult<Vec<StructureDescriptor>> {
        let tx = self.g.tx();
        let scope = self.scope(&tx).await?;
        let result = async {
            let vertices = self.reader().v().has_label(INPUT_STRUCTURE).to_list().await?;
            info!(count = vertices.len(), "queried input structures");
            let mut structures = Vec::with_capacity(vertices.len());
            for v in &vertices {
                let id = v.id().unwrap_or_default();
                let payload = text(v, JSON);
                let payload = require_text(payload.as_deref(), JSON, &id)?.to_string();
                structures.push(StructureDescriptor { id, payload });
            }
            Ok::<_, BenchError>(structures)
        }
        .await;
        scope.rollback(result).await
    }

    async fn query_all_predictions_with_links(&self) -> BenchResult<u64> {
        let tx = self.g.tx();
        let scope = self.scope(&tx).await?;
        let result = self.count_prediction_links().await;
        scope.rollback(result).await
    }

    async fn find_all_endpoints(&self) -> BenchResult<Vec<EndpointDescriptor>> {
        let tx = self.g.tx();
        let scope = self.scope(&tx).await?;
        let result = self.reader().v().has_label(ENDPOINT).to_list().await.map(|vertices| {
            vertices
                .iter()
                .map(|v| EndpointDescriptor {
                    id: v.id().unwrap_or_default(),
                    name: text(v, NAME).unwrap_or_default(),
                })
                .collect::<Vec<_>>()
        });
        scope.rollback(result).await
    }

    async fn find_predictions_by_endpoint(&self, endpoint_id: &str) -> BenchResult<Vec<String>> {
        let tx = self.g.tx();
        let scope = self.scope(&tx).await?;
        let result = async {
            let g = self.reader();
            if g.v_ids([endpoint_id]).next().await?.is_none() {
                return Err(BenchError::ReferenceNotFound(endpoint_id.to_string()));
            }
            let predictions = g.v_ids([endpoint_id]).in_e(E_ENDPOINT).out_v().id().to_list().await?;
            let mut ids = Vec::with_capacity(predictions.len());
            for element in &predictions {
                let id = element
                    .as_value()
                    .and_then(PropertyValue::as_string)
                    .unwrap_or_default()
                    .to_string();
                check_not_self(endpoint_id, &id)?;
                ids.push(id);
            }
            Ok::<_, BenchError>(ids)
        }
        .await;
        scope.rollback(result).await
    }

    async fn stats(&self) -> BenchResult<GraphStats> {
        let tx = self.g.tx();
        let scope = self.scope(&tx).await?;
        let result = async {
            Ok::<_, BenchError>(GraphStats {
                structures: self.count_label(INPUT_STRUCTURE).await?,
                predictions: self.count_label(PREDICTION_STRUCTURE).await?,
                endpoints: self.count_label(ENDPOINT).await?,
            })
        }
        .await;
        scope.rollback(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_predict_links_both_edges() {
        let db = Database::new();
        let adapter = TraversalAdapter::new(db.clone(), true, true);
        adapter.prepare_schema().await.unwrap();

        let endpoint = adapter.create_endpoint("Skin Iritation").await.unwrap();
        let structures = adapter.insert(&["e30=".to_string(), "e30=".to_string()]).await.unwrap();
        let requests: Vec<_> = structures
            .iter()
            .map(|id| PredictionLinkRequest {
                input_structure_id: id.clone(),
                endpoint_id: endpoint.clone(),
                alerts: vec!["Alert 4".into()],
            })
            .collect();
        let predictions = adapter.predict(&requests).await.unwrap();

        assert_eq!(adapter.find_predictions_by_endpoint(&endpoint).await.unwrap(), predictions);
        assert_eq!(db.edges(&structures[1], crate::graph::Direction::Out, Some(E_PREDICTION_STRUCTURE)).await.unwrap().len(), 1);
        assert_eq!(adapter.query_all_predictions_with_links().await.unwrap(), 2 * (1 + 1 + 1));
        assert!(!db.is_transaction_active().await);
    }

    #[tokio::test]
    async fn test_failed_predict_rolls_back() {
        let db = Database::new();
        let adapter = TraversalAdapter::new(db.clone(), true, false);
        adapter.prepare_schema().await.unwrap();
        let structures = adapter.insert(&["e30=".to_string()]).await.unwrap();

        let request = PredictionLinkRequest {
            input_structure_id: structures[0].clone(),
            endpoint_id: "#99:0".to_string(),
            alerts: vec![],
        };
        assert!(matches!(adapter.predict(&[request]).await, Err(BenchError::ReferenceNotFound(_))));
        assert_eq!(db.count(PREDICTION_STRUCTURE).await, 0);
        assert!(!db.is_transaction_active().await);
    }
}
