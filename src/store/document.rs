//! Directory-backed document store
//!
//! A store is a directory; every collection is a `<name>.jsonl` file holding
//! one JSON document per line. Inserts on one collection handle are
//! serialized through an async mutex around the append handle.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{DocBenchError, Result};

const COLLECTION_EXTENSION: &str = "jsonl";

/// A stored document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub data: String,
}

impl Document {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// Document whose payload is `size` bytes of `'A'`
    pub fn with_payload(size: usize) -> Self {
        Self::new("A".repeat(size))
    }
}

/// Handle to a store directory
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open the store at `path`, creating the directory if needed
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            DocBenchError::StoreError(format!("Cannot open store {}: {}", root.display(), e))
        })?;

        debug!(path = %root.display(), "Connected to document store");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !name.starts_with('.');
        if !valid {
            return Err(DocBenchError::StoreError(format!("Invalid collection name '{}'", name)));
        }

        Ok(self.root.join(format!("{}.{}", name, COLLECTION_EXTENSION)))
    }

    /// Open (or create) the collection `name`
    pub async fn collection(&self, name: &str) -> Result<DocumentCollection> {
        let path = self.collection_path(name)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DocBenchError::StoreError(format!("Cannot open collection {}: {}", name, e)))?;

        Ok(DocumentCollection {
            name: name.to_string(),
            path,
            writer: Mutex::new(Some(file)),
        })
    }

    /// Delete the collection `name` and all of its documents
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        let path = self.collection_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DocBenchError::StoreError(format!(
                "Cannot drop collection {}: {}",
                name, e
            ))),
        }
    }
}

/// Open collection
#[derive(Debug)]
pub struct DocumentCollection {
    name: String,
    path: PathBuf,
    writer: Mutex<Option<File>>,
}

impl DocumentCollection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append one document
    pub async fn insert(&self, document: &Document) -> Result<()> {
        let mut line = serde_json::to_vec(document)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        let file = writer
            .as_mut()
            .ok_or_else(|| DocBenchError::StoreError(format!("Collection {} is closed", self.name)))?;

        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// First document of the collection, if any
    pub async fn find_one(&self) -> Result<Option<Document>> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let document = serde_json::from_str(&line).map_err(|e| {
                DocBenchError::StoreError(format!("Corrupt document in {}: {}", self.name, e))
            })?;
            return Ok(Some(document));
        }

        Ok(None)
    }

    /// Number of stored documents
    pub async fn count(&self) -> Result<usize> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();

        let mut count = 0;
        while let Some(line) = lines.next_line().await? {
            if !line.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Flush pending writes and release the append handle
    pub async fn close(&self) -> Result<()> {
        if let Some(mut file) = self.writer.lock().await.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}
