//! Lifecycle Engine Module
//!
//! The resource lifecycle shared by every resource type: collection
//! bootstrapping, member bookkeeping, templated creation, replace/merge
//! updates and deletion.

pub mod collection;
pub mod events;
pub mod lifecycle;
pub mod locks;
pub mod members;

pub use collection::*;
pub use events::*;
pub use lifecycle::*;
pub use locks::*;
pub use members::*;

use crate::store::ResourceStore;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Process-wide state shared by every engine
pub struct EngineContext<S> {
    /// Document persistence
    pub store: Arc<S>,
    /// Per-path locks
    pub locks: Arc<PathLocks>,
    /// Known members of every type
    pub members: Arc<MemberRegistry>,
    /// Lifecycle event channel
    pub events: broadcast::Sender<ResourceEvent>,
    /// REST base URL (`/redfish/v1/`)
    pub rest_base: String,
}

impl<S: ResourceStore> EngineContext<S> {
    pub fn new(store: Arc<S>, rest_base: impl Into<String>) -> Self {
        Self {
            store,
            locks: PathLocks::new(),
            members: MemberRegistry::new(),
            events: event_channel(),
            rest_base: normalize_rest_base(&rest_base.into()),
        }
    }

    /// Get an event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }
}

impl<S> Clone for EngineContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
            members: self.members.clone(),
            events: self.events.clone(),
            rest_base: self.rest_base.clone(),
        }
    }
}

/// Force a leading and a trailing slash: `redfish/v1` becomes `/redfish/v1/`
pub fn normalize_rest_base(rest_base: &str) -> String {
    let trimmed = rest_base.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}
