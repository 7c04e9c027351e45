//! Member Registry
//!
//! In-process record of which member identifiers exist, partitioned by
//! resource type. Constructed once at startup and shared by every engine.
//! Not persisted: after a restart the engines also consult the store before
//! accepting an identifier.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// =============================================================================
// Statistics
// =============================================================================

/// Registry counters
#[derive(Debug, Default)]
pub struct MemberStats {
    pub registrations: AtomicU64,
    pub deregistrations: AtomicU64,
    pub conflicts: AtomicU64,
}

/// Snapshot of registry counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberStatsSnapshot {
    pub members: u64,
    pub registrations: u64,
    pub deregistrations: u64,
    pub conflicts: u64,
}

// =============================================================================
// Member Registry
// =============================================================================

/// Known member `@odata.id`s per resource type
#[derive(Debug, Default)]
pub struct MemberRegistry {
    kinds: RwLock<HashMap<String, BTreeSet<String>>>,
    stats: MemberStats,
}

impl MemberRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a new member, rejecting identifiers already present
    pub fn register(&self, resource_type: &str, member_id: impl Into<String>) -> Result<()> {
        let member_id = member_id.into();
        let mut kinds = self.kinds.write();
        let members = kinds.entry(resource_type.to_string()).or_default();

        if members.contains(&member_id) {
            self.stats.conflicts.fetch_add(1, Ordering::Relaxed);
            return Err(Error::Conflict {
                resource: resource_type.to_string(),
                id: member_id,
            });
        }

        members.insert(member_id);
        self.stats.registrations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Forget a member; returns whether it was known
    pub fn deregister(&self, resource_type: &str, member_id: &str) -> bool {
        let mut kinds = self.kinds.write();
        let removed = kinds
            .get_mut(resource_type)
            .map(|members| members.remove(member_id))
            .unwrap_or(false);

        if removed {
            self.stats.deregistrations.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Forget every member, of any type, nested below `odata_id`
    ///
    /// Used when a delete takes a whole subtree with it.
    pub fn deregister_below(&self, odata_id: &str) -> usize {
        let prefix = format!("{}/", odata_id.trim_end_matches('/'));
        let mut kinds = self.kinds.write();
        let mut removed = 0;

        for members in kinds.values_mut() {
            let before = members.len();
            members.retain(|id| !id.starts_with(&prefix));
            removed += before - members.len();
        }

        self.stats
            .deregistrations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Check if a member is known
    pub fn contains(&self, resource_type: &str, member_id: &str) -> bool {
        self.kinds
            .read()
            .get(resource_type)
            .is_some_and(|members| members.contains(member_id))
    }

    /// Known members of one type, sorted
    pub fn members(&self, resource_type: &str) -> Vec<String> {
        self.kinds
            .read()
            .get(resource_type)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of known members of one type
    pub fn count(&self, resource_type: &str) -> usize {
        self.kinds.read().get(resource_type).map_or(0, BTreeSet::len)
    }

    /// Get counters
    pub fn stats(&self) -> MemberStatsSnapshot {
        let members = self.kinds.read().values().map(BTreeSet::len).sum::<usize>() as u64;
        MemberStatsSnapshot {
            members,
            registrations: self.stats.registrations.load(Ordering::Relaxed),
            deregistrations: self.stats.deregistrations.load(Ordering::Relaxed),
            conflicts: self.stats.conflicts.load(Ordering::Relaxed),
        }
    }
}
