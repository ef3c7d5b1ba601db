//! WRITE and READ workloads against the document store

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::bench::{ThroughputBenchmark, WorkloadFactory};
use crate::models::BenchmarkType;
use crate::store::document::{Document, DocumentCollection, DocumentStore};
use crate::{DocBenchError, Result};

fn not_set_up() -> DocBenchError {
    DocBenchError::StoreError("workload used before set_up".to_string())
}

/// Inserts a fixed-size document per iteration into a freshly dropped collection
pub struct StoreWriteBenchmark {
    store_path: PathBuf,
    collection_name: String,
    document_size: usize,
    collection: Option<DocumentCollection>,
    document: Option<Document>,
}

impl StoreWriteBenchmark {
    pub fn new(store_path: impl Into<PathBuf>, collection_name: impl Into<String>, document_size: usize) -> Self {
        Self {
            store_path: store_path.into(),
            collection_name: collection_name.into(),
            document_size,
            collection: None,
            document: None,
        }
    }
}

#[async_trait]
impl ThroughputBenchmark for StoreWriteBenchmark {
    async fn set_up(&mut self) -> Result<()> {
        let store = DocumentStore::connect(&self.store_path).await?;
        store.drop_collection(&self.collection_name).await?;

        self.collection = Some(store.collection(&self.collection_name).await?);
        self.document = Some(Document::with_payload(self.document_size));
        debug!(collection = %self.collection_name, "Write workload ready");
        Ok(())
    }

    async fn iteration(&self) -> Result<()> {
        let (Some(collection), Some(document)) = (&self.collection, &self.document) else {
            return Err(not_set_up());
        };
        collection.insert(document).await
    }

    async fn tear_down(&mut self) -> Result<()> {
        self.document = None;
        match self.collection.take() {
            Some(collection) => collection.close().await,
            None => Ok(()),
        }
    }
}

/// Reads one document per iteration
pub struct StoreReadBenchmark {
    store_path: PathBuf,
    collection_name: String,
    document_size: usize,
    collection: Option<DocumentCollection>,
}

impl StoreReadBenchmark {
    pub fn new(store_path: impl Into<PathBuf>, collection_name: impl Into<String>, document_size: usize) -> Self {
        Self {
            store_path: store_path.into(),
            collection_name: collection_name.into(),
            document_size,
            collection: None,
        }
    }
}

#[async_trait]
impl ThroughputBenchmark for StoreReadBenchmark {
    async fn set_up(&mut self) -> Result<()> {
        let store = DocumentStore::connect(&self.store_path).await?;
        let collection = store.collection(&self.collection_name).await?;

        if collection.find_one().await?.is_none() {
            collection.insert(&Document::with_payload(self.document_size)).await?;
            debug!(collection = %self.collection_name, "Seeded empty collection");
        }

        self.collection = Some(collection);
        Ok(())
    }

    async fn iteration(&self) -> Result<()> {
        let collection = self.collection.as_ref().ok_or_else(not_set_up)?;
        match collection.find_one().await? {
            Some(_) => Ok(()),
            None => Err(DocBenchError::StoreError(format!(
                "Collection {} is empty",
                collection.name()
            ))),
        }
    }

    async fn tear_down(&mut self) -> Result<()> {
        match self.collection.take() {
            Some(collection) => collection.close().await,
            None => Ok(()),
        }
    }
}

/// Builds store workloads; worker `i` uses collection `<collection>-<i>`
#[derive(Debug, Clone)]
pub struct StoreWorkloads {
    pub store_path: PathBuf,
    pub collection: String,
    pub document_size: usize,
}

impl StoreWorkloads {
    pub fn new(store_path: impl Into<PathBuf>, collection: impl Into<String>, document_size: usize) -> Self {
        Self {
            store_path: store_path.into(),
            collection: collection.into(),
            document_size,
        }
    }

    pub fn collection_for(&self, worker_index: usize) -> String {
        format!("{}-{}", self.collection, worker_index)
    }
}

impl WorkloadFactory for StoreWorkloads {
    fn create(&self, benchmark_type: BenchmarkType, worker_index: usize) -> Box<dyn ThroughputBenchmark> {
        let collection = self.collection_for(worker_index);
        match benchmark_type {
            BenchmarkType::Write => Box::new(StoreWriteBenchmark::new(
                self.store_path.clone(),
                collection,
                self.document_size,
            )),
            BenchmarkType::Read => Box::new(StoreReadBenchmark::new(
                self.store_path.clone(),
                collection,
                self.document_size,
            )),
        }
    }
}
