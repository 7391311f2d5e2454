//! Shared helpers for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use graphbench::adapter::{EmbeddedAdapter, GraphAdapter, RemoteAdapter, TraversalAdapter};
use graphbench::{
    BenchResult, Database, EndpointDescriptor, GraphStats, PredictionLinkRequest, StructureDescriptor,
};

/// Every adapter variant over `db`, schema prepared
pub async fn adapters_over(db: &Database) -> Vec<Box<dyn GraphAdapter>> {
    adapters_with(db, true).await
}

pub async fn adapters_with(db: &Database, transactions: bool) -> Vec<Box<dyn GraphAdapter>> {
    let adapters: Vec<Box<dyn GraphAdapter>> = vec![
        Box::new(EmbeddedAdapter::new(db.clone(), transactions)),
        Box::new(TraversalAdapter::new(db.clone(), transactions, true)),
        Box::new(RemoteAdapter::new(Arc::new(db.clone()), transactions)),
    ];
    for adapter in &adapters {
        adapter.prepare_schema().await.unwrap();
    }
    adapters
}

/// One adapter of each kind, each with its own database
pub async fn each_adapter() -> Vec<(Database, Box<dyn GraphAdapter>)> {
    each_adapter_with(true).await
}

pub async fn each_adapter_with(transactions: bool) -> Vec<(Database, Box<dyn GraphAdapter>)> {
    let mut all = Vec::new();
    for index in 0..3 {
        let db = Database::new();
        let adapter = adapters_with(&db, transactions).await.swap_remove(index);
        all.push((db, adapter));
    }
    all
}

pub fn payloads(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("cGF5bG9hZC17fQ=={}", i)).collect()
}

/// Counts the batch calls going through an adapter
pub struct CountingAdapter {
    inner: Box<dyn GraphAdapter>,
    pub insert_calls: AtomicUsize,
    pub predict_calls: AtomicUsize,
}

impl CountingAdapter {
    pub fn new(inner: Box<dyn GraphAdapter>) -> Self {
        Self { inner, insert_calls: AtomicUsize::new(0), predict_calls: AtomicUsize::new(0) }
    }

    pub fn inserts(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn predicts(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphAdapter for CountingAdapter {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn prepare_schema(&self) -> BenchResult<()> {
        self.inner.prepare_schema().await
    }

    async fn delete_all(&self) -> BenchResult<()> {
        self.inner.delete_all().await
    }

    async fn create_endpoint(&self, name: &str) -> BenchResult<String> {
        self.inner.create_endpoint(name).await
    }

    async fn insert(&self, payloads: &[String]) -> BenchResult<Vec<String>> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(payloads).await
    }

    async fn predict(&self, requests: &[PredictionLinkRequest]) -> BenchResult<Vec<String>> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.predict(requests).await
    }

    async fn query_all_structures(&self) -> BenchResult<Vec<StructureDescriptor>> {
        self.inner.query_all_structures().await
    }

    async fn query_all_predictions_with_links(&self) -> BenchResult<u64> {
        self.inner.query_all_predictions_with_links().await
    }

    async fn find_all_endpoints(&self) -> BenchResult<Vec<EndpointDescriptor>> {
        self.inner.find_all_endpoints().await
    }

    async fn find_predictions_by_endpoint(&self, endpoint_id: &str) -> BenchResult<Vec<String>> {
        self.inner.find_predictions_by_endpoint(endpoint_id).await
    }

    async fn stats(&self) -> BenchResult<GraphStats> {
        self.inner.stats().await
    }
}
