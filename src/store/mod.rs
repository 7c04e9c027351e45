//! Resource Store
//!
//! Persistence for resource documents. One JSON document per resource
//! (instances and collection indexes alike), addressed by [`ResourcePath`].

mod file;
mod memory;

pub use file::{FileStore, FileStoreConfig};
pub use memory::MemoryStore;

use crate::error::Result;
use crate::resource::ResourcePath;
use async_trait::async_trait;
use serde_json::Value;

// =============================================================================
// ResourceStore Trait
// =============================================================================

/// Trait for document persistence backends
///
/// Implementations must keep `write` atomic per document: a reader sees
/// either the old or the new document, never a torn one.
#[async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Read the document at `path`
    ///
    /// Fails with `NotFound` when absent and `Decode` when the stored bytes
    /// are not valid JSON.
    async fn read(&self, path: &ResourcePath) -> Result<Value>;

    /// Create or replace the document at `path`
    async fn write(&self, path: &ResourcePath, document: &Value) -> Result<()>;

    /// Check if a document exists at `path`
    async fn exists(&self, path: &ResourcePath) -> bool;

    /// Delete the document at `path` together with everything nested below it
    ///
    /// Fails with `NotFound` when no document exists at `path`.
    async fn delete(&self, path: &ResourcePath) -> Result<()>;

    /// Check if the backend is available
    async fn health_check(&self) -> Result<bool>;
}
