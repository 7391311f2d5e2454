//! EmbeddedAdapter: direct vertex and edge calls on a `Database` handle

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    check_not_self, require_text, GraphAdapter, TxScope, ALERTS, DELETE_ORDER, ENDPOINT, E_ENDPOINT,
    E_PREDICTION_STRUCTURE, INPUT_STRUCTURE, JSON, NAME, PREDICTION_STRUCTURE,
};
use crate::database::Database;
use crate::error::{BenchError, BenchResult};
use crate::graph::{Direction, PropertyMap, PropertyValue};
use crate::model::{decode_alerts, encode_alerts, EndpointDescriptor, PredictionLinkRequest, StructureDescriptor};
use crate::stats::GraphStats;

pub struct EmbeddedAdapter {
    db: Database,
    transactions: bool,
}

impl EmbeddedAdapter {
    pub fn new(db: Database, transactions: bool) -> Self {
        Self { db, transactions }
    }

    /// The underlying database handle
    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn scope(&self) -> BenchResult<TxScope<'_, Database>> {
        TxScope::open(&self.db, self.transactions).await
    }

    async fn predict_one(&self, request: &PredictionLinkRequest) -> BenchResult<String> {
        let structure = self
            .db
            .lookup_vertex(&request.input_structure_id)
            .await
            .ok_or_else(|| BenchError::ReferenceNotFound(request.input_structure_id.clone()))?;
        if self.db.lookup_vertex(&request.endpoint_id).await.is_none() {
            return Err(BenchError::ReferenceNotFound(request.endpoint_id.clone()));
        }
        let json = structure.get_property(JSON).cloned().unwrap_or(PropertyValue::Null);

        let mut properties = PropertyMap::new();
        properties.insert(JSON.to_string(), json);
        properties.insert(ALERTS.to_string(), PropertyValue::from(encode_alerts(&request.alerts)));
        let prediction = self.db.new_vertex(PREDICTION_STRUCTURE, properties).await?;
        let prediction_id = prediction.identity();

        self.db.new_edge(E_ENDPOINT, &prediction_id, &request.endpoint_id).await?;
        self.db
            .new_edge(E_PREDICTION_STRUCTURE, &request.input_structure_id, &prediction_id)
            .await?;
        Ok(prediction_id)
    }

    async fn count_prediction_links(&self) -> BenchResult<u64> {
        let mut total = 0u64;
        for prediction in self.db.vertices(PREDICTION_STRUCTURE).await {
            let id = prediction.identity();
            require_text(prediction.get_string(JSON), JSON, &id)?;

            for edge in self.db.edges(&id, Direction::Out, Some(E_ENDPOINT)).await? {
                let target = edge.target.to_string();
                let endpoint = self
                    .db
                    .lookup_vertex(&target)
                    .await
                    .ok_or_else(|| BenchError::ReferenceNotFound(target.clone()))?;
                require_text(endpoint.get_string(NAME), NAME, &target)?;
                total += 1;
            }

            let alerts = require_text(prediction.get_string(ALERTS), ALERTS, &id)?;
            total += 1 + decode_alerts(alerts).len() as u64;
        }
        Ok(total)
    }
}

#[async_trait]
impl GraphAdapter for EmbeddedAdapter {
    fn name(&self) -> &'static str {
        "embedded"
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
        for type_name in DELETE_ORDER {
            let scope = self.scope().await?;
            let result = async {
                let vertices = self.db.vertices(type_name).await;
                for vertex in &vertices {
                    self.db.delete_vertex(&vertex.identity()).await?;
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
        let mut properties = PropertyMap::new();
        properties.insert(NAME.to_string(), PropertyValue::from(name));
        let result = self.db.new_vertex(ENDPOINT, properties).await.map(|v| v.identity());
        scope.commit(result).await
    }

    async fn insert(&self, payloads: &[String]) -> BenchResult<Vec<String>> {
        let scope = self.scope().await?;
        let result = async {
            let mut ids = Vec::with_capacity(payloads.len());
            for payload in payloads {
                let mut properties = PropertyMap::new();
                properties.insert(JSON.to_string(), PropertyValue::from(payload.as_str()));
                ids.push(self.db.new_vertex(INPUT_STRUCTURE, properties).await?.identity());
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
            let vertices = self.db.vertices(INPUT_STRUCTURE).await;
            info!(count = vertices.len(), "queried input structures");
            let mut structures = Vec::with_capacity(vertices.len());
            for v in &vertices {
                let id = v.identity();
                let payload = require_text(v.get_string(JSON), JSON, &id)?.to_string();
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
        let endpoints: Vec<EndpointDescriptor> = self
            .db
            .vertices(ENDPOINT)
            .await
            .into_iter()
            .map(|v| EndpointDescriptor {
                id: v.identity(),
                name: v.get_string(NAME).unwrap_or_default().to_string(),
            })
            .collect();
        scope.rollback(Ok(endpoints)).await
    }

    async fn find_predictions_by_endpoint(&self, endpoint_id: &str) -> BenchResult<Vec<String>> {
        let scope = self.scope().await?;
        let result = async {
            let mut ids = Vec::new();
            for edge in self.db.edges(endpoint_id, Direction::In, Some(E_ENDPOINT)).await? {
                let id = edge.out.to_string();
                check_not_self(endpoint_id, &id)?;
                ids.push(id);
            }
            Ok::<_, BenchError>(ids)
        }
        .await;
        scope.rollback(result).await
    }

    async fn stats(&self) -> BenchResult<GraphStats> {
        let scope = self.scope().await?;
        let stats = GraphStats {
            structures: self.db.count(INPUT_STRUCTURE).await,
            predictions: self.db.count(PREDICTION_STRUCTURE).await,
            endpoints: self.db.count(ENDPOINT).await,
        };
        scope.rollback(Ok(stats)).await
    }
}
