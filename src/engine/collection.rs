//! Collection Manager
//!
//! Owns collection index documents: creates them on first use, keeps their
//! `Members` list and `Members@odata.count` in step with the instances on
//! disk, and fronts the member registry for one resource type.

use crate::engine::locks::PathLocks;
use crate::engine::members::MemberRegistry;
use crate::error::{Error, Result};
use crate::resource::ResourcePath;
use crate::store::ResourceStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub const MEMBERS: &str = "Members";
pub const MEMBERS_COUNT: &str = "Members@odata.count";
pub const ODATA_ID: &str = "@odata.id";
pub const ODATA_TYPE: &str = "@odata.type";

/// Initial index document for a collection of `resource_type`
pub fn collection_document(resource_type: &str, odata_id: &str) -> Value {
    let collection_type = format!("{resource_type}Collection");
    json!({
        ODATA_ID: odata_id,
        ODATA_TYPE: format!("#{collection_type}.{collection_type}"),
        "Name": format!("{resource_type} Collection"),
        MEMBERS: [],
        MEMBERS_COUNT: 0,
    })
}

/// Collection bookkeeping for one resource type
pub struct CollectionManager<S> {
    resource_type: String,
    store: Arc<S>,
    locks: Arc<PathLocks>,
    members: Arc<MemberRegistry>,
    rest_base: String,
}

impl<S: ResourceStore> CollectionManager<S> {
    pub fn new(
        resource_type: impl Into<String>,
        store: Arc<S>,
        locks: Arc<PathLocks>,
        members: Arc<MemberRegistry>,
        rest_base: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            store,
            locks,
            members,
            rest_base: rest_base.into(),
        }
    }

    /// Create the collection index if it does not exist yet.
    ///
    /// Returns whether it was created. The caller must hold the collection
    /// lock. When the parent resource has a document, a navigation link to
    /// the new collection is added to it.
    pub async fn ensure_collection(&self, collection: &ResourcePath) -> Result<bool> {
        if self.store.exists(collection).await {
            return Ok(false);
        }

        let odata_id = collection.odata_id(&self.rest_base);
        self.store
            .write(collection, &collection_document(&self.resource_type, &odata_id))
            .await?;
        info!(collection = %odata_id, resource_type = %self.resource_type, "created collection");

        if let Some(parent) = collection.parent() {
            self.link_into_parent(&parent, collection, &odata_id).await?;
        }

        Ok(true)
    }

    async fn link_into_parent(
        &self,
        parent: &ResourcePath,
        collection: &ResourcePath,
        odata_id: &str,
    ) -> Result<()> {
        let Some(name) = collection.name() else {
            return Ok(());
        };

        let _guard = self.locks.lock(parent).await;
        let mut document = match self.store.read(parent).await {
            Ok(document) => document,
            Err(Error::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };

        let Some(fields) = document.as_object_mut() else {
            return Ok(());
        };
        if fields.contains_key(name) {
            return Ok(());
        }

        fields.insert(name.to_string(), json!({ ODATA_ID: odata_id }));
        self.store.write(parent, &document).await?;
        debug!(parent = %parent, link = name, "linked collection into parent");
        Ok(())
    }

    /// Append `member_id` to the collection index; no-op if already listed
    pub async fn add_member(&self, collection: &ResourcePath, member_id: &str) -> Result<()> {
        self.update_members(collection, |members| {
            if members.iter().any(|m| member_ref(m) == Some(member_id)) {
                return false;
            }
            members.push(json!({ ODATA_ID: member_id }));
            true
        })
        .await
        .map(|_| ())
    }

    /// Drop `member_id` from the collection index; returns whether it was listed
    pub async fn remove_member(&self, collection: &ResourcePath, member_id: &str) -> Result<bool> {
        self.update_members(collection, |members| {
            let before = members.len();
            members.retain(|m| member_ref(m) != Some(member_id));
            members.len() != before
        })
        .await
    }

    /// Member references listed in the collection index, in insertion order
    pub async fn members(&self, collection: &ResourcePath) -> Result<Vec<String>> {
        let document = self.store.read(collection).await?;
        Ok(document
            .get(MEMBERS)
            .and_then(Value::as_array)
            .map(|members| {
                members
                    .iter()
                    .filter_map(member_ref)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_members<F>(&self, collection: &ResourcePath, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Vec<Value>) -> bool,
    {
        let mut document = self.store.read(collection).await?;
        let fields = document.as_object_mut().ok_or_else(|| {
            Error::Internal(format!("collection index {collection} is not a JSON object"))
        })?;

        let mut members = match fields.remove(MEMBERS) {
            Some(Value::Array(members)) => members,
            _ => Vec::new(),
        };
        let changed = mutate(&mut members);
        let count = members.len();
        fields.insert(MEMBERS.to_string(), Value::Array(members));

        if changed {
            fields.insert(MEMBERS_COUNT.to_string(), json!(count));
            self.store.write(collection, &document).await?;
        }
        Ok(changed)
    }

    /// Record a member in the registry
    pub fn register_member(&self, member_id: &str) -> Result<()> {
        self.members.register(&self.resource_type, member_id)
    }

    /// Remove a member from the registry; no-op if absent
    pub fn deregister_member(&self, member_id: &str) -> bool {
        self.members.deregister(&self.resource_type, member_id)
    }

    /// Whether the registry knows `member_id`
    pub fn is_registered(&self, member_id: &str) -> bool {
        self.members.contains(&self.resource_type, member_id)
    }

    /// The shared member registry
    pub fn registry(&self) -> &Arc<MemberRegistry> {
        &self.members
    }
}

fn member_ref(member: &Value) -> Option<&str> {
    member.get(ODATA_ID).and_then(Value::as_str)
}
