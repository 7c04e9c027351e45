//! Per-path mutual exclusion
//!
//! Every collection and instance path gets its own async mutex. Holders
//! always lock a collection before any instance below it.

use crate::resource::ResourcePath;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Table of async mutexes keyed by resource path
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: DashMap<ResourcePath, Arc<Mutex<()>>>,
}

/// Held lock on one resource path, released on drop
#[derive(Debug)]
pub struct PathGuard {
    path: ResourcePath,
    _guard: OwnedMutexGuard<()>,
}

impl PathGuard {
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }
}

impl PathLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait for exclusive access to `path`
    pub async fn lock(&self, path: &ResourcePath) -> PathGuard {
        // Clone the mutex out so no map shard stays locked across the await
        let mutex = self.locks.entry(path.clone()).or_default().clone();
        PathGuard {
            path: path.clone(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Drop table entries nobody holds or waits on
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before - self.locks.len()
    }

    /// Number of tracked paths
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
