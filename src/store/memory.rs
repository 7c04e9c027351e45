//! In-Memory Store
//!
//! DashMap-backed store used by tests and by `--ephemeral` runs.

use crate::error::{Error, Result};
use crate::resource::ResourcePath;
use crate::store::ResourceStore;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::path::PathBuf;

/// Resource store keeping every document in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: DashMap<ResourcePath, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn missing(path: &ResourcePath) -> Error {
        Error::not_found(PathBuf::from(path.to_string()))
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, path: &ResourcePath) -> Result<Value> {
        self.documents
            .get(path)
            .map(|doc| doc.value().clone())
            .ok_or_else(|| Self::missing(path))
    }

    async fn write(&self, path: &ResourcePath, document: &Value) -> Result<()> {
        self.documents.insert(path.clone(), document.clone());
        Ok(())
    }

    async fn exists(&self, path: &ResourcePath) -> bool {
        self.documents.contains_key(path)
    }

    async fn delete(&self, path: &ResourcePath) -> Result<()> {
        if self.documents.remove(path).is_none() {
            return Err(Self::missing(path));
        }
        self.documents.retain(|key, _| !key.starts_with(path));
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
