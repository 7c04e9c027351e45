//! Filesystem Store
//!
//! Mirrors the URL hierarchy onto a directory tree: the document for
//! `Storage/S1/Volumes/V1` lives at `{root}/Storage/S1/Volumes/V1/index.json`.

use crate::error::{Error, Result};
use crate::resource::ResourcePath;
use crate::store::ResourceStore;
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

// =============================================================================
// File Store Configuration
// =============================================================================

/// Configuration for the filesystem store
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Root directory of the resource tree
    pub root_path: PathBuf,
    /// Whether to fsync documents before renaming them into place
    pub sync_writes: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("Resources"),
            sync_writes: false,
        }
    }
}

// =============================================================================
// File Store
// =============================================================================

/// Resource store backed by plain JSON files
#[derive(Debug)]
pub struct FileStore {
    root_path: PathBuf,
    sync_writes: bool,
}

impl FileStore {
    /// Open a store rooted at `root_path`
    pub async fn with_path(root_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(FileStoreConfig {
            root_path: root_path.into(),
            ..Default::default()
        })
        .await
    }

    /// Open a store with full config, creating the root directory if needed
    pub async fn with_config(config: FileStoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.root_path).await?;

        Ok(Self {
            root_path: config.root_path,
            sync_writes: config.sync_writes,
        })
    }

    /// Root directory of the resource tree
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn staging_path(target: &Path) -> PathBuf {
        let suffix: u32 = rand::thread_rng().gen();
        target.with_extension(format!("json.tmp-{suffix:08x}"))
    }
}

#[async_trait]
impl ResourceStore for FileStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn read(&self, path: &ResourcePath) -> Result<Value> {
        let file = path.index_file(&self.root_path);
        let bytes = match fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::not_found(file)),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|source| Error::Decode { path: file, source })
    }

    async fn write(&self, path: &ResourcePath, document: &Value) -> Result<()> {
        let dir = path.dir(&self.root_path);
        let target = path.index_file(&self.root_path);
        fs::create_dir_all(&dir).await?;

        // Stage next to the target so the rename stays on one filesystem
        let staging = Self::staging_path(&target);
        let bytes = serde_json::to_vec_pretty(document)?;

        let staged = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(&bytes).await?;
            if self.sync_writes {
                file.sync_all().await?;
            }
            drop(file);
            fs::rename(&staging, &target).await
        }
        .await;

        if let Err(e) = staged {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!(path = %target.display(), bytes = bytes.len(), "wrote document");
        Ok(())
    }

    async fn exists(&self, path: &ResourcePath) -> bool {
        fs::try_exists(path.index_file(&self.root_path))
            .await
            .unwrap_or(false)
    }

    async fn delete(&self, path: &ResourcePath) -> Result<()> {
        let file = path.index_file(&self.root_path);
        if !fs::try_exists(&file).await? {
            return Err(Error::not_found(file));
        }

        if path.is_root() {
            fs::remove_file(&file).await?;
        } else {
            fs::remove_dir_all(path.dir(&self.root_path)).await?;
        }

        debug!(path = %file.display(), "deleted document tree");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        // Check that the root directory exists and is writable
        let test_path = self.root_path.join(".health_check");
        match fs::write(&test_path, b"ok").await {
            Ok(_) => {
                let _ = fs::remove_file(&test_path).await;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}
