//! Lifecycle Events
//!
//! Events emitted by the lifecycle engines for external consumers to react
//! to resource changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers lag rather than block
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// What happened to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceEventKind {
    /// A collection index was created on first use
    CollectionCreated,
    /// A member was created from its template
    Created,
    /// A member document was replaced wholesale (PUT)
    Replaced,
    /// A member document was merged (PATCH)
    Patched,
    /// A member was deleted
    Deleted,
}

impl std::fmt::Display for ResourceEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceEventKind::CollectionCreated => write!(f, "collection_created"),
            ResourceEventKind::Created => write!(f, "created"),
            ResourceEventKind::Replaced => write!(f, "replaced"),
            ResourceEventKind::Patched => write!(f, "patched"),
            ResourceEventKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// A single resource change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub kind: ResourceEventKind,
    /// Resource type name, e.g. `Volume`
    pub resource_type: String,
    /// `@odata.id` of the affected resource or collection
    pub odata_id: String,
    pub at: DateTime<Utc>,
}

impl ResourceEvent {
    pub fn new(
        kind: ResourceEventKind,
        resource_type: impl Into<String>,
        odata_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            resource_type: resource_type.into(),
            odata_id: odata_id.into(),
            at: Utc::now(),
        }
    }
}

/// Create the process-wide event channel
pub fn event_channel() -> broadcast::Sender<ResourceEvent> {
    let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    sender
}
