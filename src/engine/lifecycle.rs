//! Instance Lifecycle Engine
//!
//! One engine per registered resource type. Each instance identifier moves
//! through `Absent -> Present -> (Updating <-> Present) -> Deleted`, and a
//! deleted identifier may be created again.
//!
//! Creation runs under the collection lock from the existence check to the
//! registry update, so concurrent POSTs cannot both claim one identifier or
//! lose an index update. PUT and PATCH hold the instance lock across their
//! read-modify-write.

use crate::engine::collection::{CollectionManager, ODATA_ID, ODATA_TYPE};
use crate::engine::events::{ResourceEvent, ResourceEventKind};
use crate::engine::EngineContext;
use crate::error::{Error, Result};
use crate::registry::ResourceKind;
use crate::resource::{deep_merge, shallow_merge, ResourcePath, Wildcards, REST_BASE_TOKEN};
use crate::store::ResourceStore;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Length of server-minted identifiers
pub const GENERATED_ID_LEN: usize = 5;

/// Attempts at minting an unused identifier before giving up
pub const MINT_ATTEMPTS: usize = 16;

const ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random uppercase-alphanumeric identifier
pub fn generate_identifier() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_ID_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

/// Identifier a POST body asks for: the last segment of its `@odata.id`
pub fn requested_identifier(body: &Value) -> Option<&str> {
    body.get(ODATA_ID)?
        .as_str()?
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}

/// Reject bodies that describe a collection or are not JSON objects
pub fn validate_member_body(body: &Value) -> Result<()> {
    if !body.is_object() {
        return Err(Error::InvalidInput("body must be a JSON object".into()));
    }
    let collection_typed = body
        .get(ODATA_TYPE)
        .and_then(Value::as_str)
        .is_some_and(|odata_type| odata_type.contains("Collection"));
    if collection_typed {
        return Err(Error::InvalidInput(
            "a collection representation cannot create a member".into(),
        ));
    }
    Ok(())
}

// =============================================================================
// Lifecycle Engine
// =============================================================================

/// Generic create/read/update/delete protocol for one resource type
pub struct LifecycleEngine<S> {
    kind: Arc<ResourceKind>,
    ctx: EngineContext<S>,
    collections: CollectionManager<S>,
}

impl<S: ResourceStore> LifecycleEngine<S> {
    pub fn new(kind: Arc<ResourceKind>, ctx: EngineContext<S>) -> Self {
        let collections = CollectionManager::new(
            kind.name(),
            ctx.store.clone(),
            ctx.locks.clone(),
            ctx.members.clone(),
            ctx.rest_base.clone(),
        );
        Self {
            kind,
            ctx,
            collections,
        }
    }

    /// The resource type this engine serves
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn collections(&self) -> &CollectionManager<S> {
        &self.collections
    }

    pub fn rest_base(&self) -> &str {
        &self.ctx.rest_base
    }

    /// Path of the collection owned by the ancestors `parent_ids`
    pub fn collection_path(&self, parent_ids: &[String]) -> Result<ResourcePath> {
        self.kind.collection_template().resolve(parent_ids)
    }

    /// Path of instance `id` below the ancestors `parent_ids`
    pub fn instance_path(&self, parent_ids: &[String], id: &str) -> Result<ResourcePath> {
        self.collection_path(parent_ids)?.child(id)
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// GET on the collection
    pub async fn read_collection(&self, parent_ids: &[String]) -> Result<Value> {
        let collection = self.collection_path(parent_ids)?;
        debug!(resource_type = %self.kind.name(), collection = %collection, "read collection");
        self.ctx.store.read(&collection).await
    }

    /// GET on an instance
    pub async fn read(&self, parent_ids: &[String], id: &str) -> Result<Value> {
        let path = self.instance_path(parent_ids, id)?;
        debug!(resource_type = %self.kind.name(), path = %path, "read instance");
        self.ctx.store.read(&path).await
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// POST on the collection: create it if needed, then create one member.
    ///
    /// The member identifier is the last segment of the body's `@odata.id`
    /// when present, otherwise a freshly minted random one.
    pub async fn create_in_collection(
        &self,
        parent_ids: &[String],
        body: Option<&Value>,
    ) -> Result<Value> {
        if let Some(body) = body {
            validate_member_body(body)?;
        }
        let collection = self.collection_path(parent_ids)?;

        let _guard = self.ctx.locks.lock(&collection).await;
        self.ensure_collection(&collection).await?;

        let id = match body.and_then(requested_identifier) {
            Some(id) => id.to_string(),
            None => self.mint_identifier(&collection).await?,
        };
        self.create_locked(&collection, parent_ids, &id, body).await
    }

    /// POST on an instance path: create member `id` explicitly
    pub async fn create(
        &self,
        parent_ids: &[String],
        id: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        if let Some(body) = body {
            validate_member_body(body)?;
        }
        let collection = self.collection_path(parent_ids)?;

        let _guard = self.ctx.locks.lock(&collection).await;
        self.ensure_collection(&collection).await?;
        self.create_locked(&collection, parent_ids, id, body).await
    }

    async fn ensure_collection(&self, collection: &ResourcePath) -> Result<()> {
        if self.collections.ensure_collection(collection).await? {
            self.emit(
                ResourceEventKind::CollectionCreated,
                collection.odata_id(&self.ctx.rest_base),
            );
        }
        Ok(())
    }

    /// Whether `path` is already taken, in the registry or on disk
    async fn is_taken(&self, path: &ResourcePath, member_id: &str) -> bool {
        self.collections.is_registered(member_id) || self.ctx.store.exists(path).await
    }

    async fn mint_identifier(&self, collection: &ResourcePath) -> Result<String> {
        for _ in 0..MINT_ATTEMPTS {
            let id = generate_identifier();
            let path = collection.child(&id)?;
            if !self.is_taken(&path, &path.odata_id(&self.ctx.rest_base)).await {
                return Ok(id);
            }
            debug!(collection = %collection, id = %id, "minted identifier already taken, retrying");
        }
        Err(Error::Internal(format!(
            "no free identifier in {collection} after {MINT_ATTEMPTS} attempts"
        )))
    }

    /// Create one member; the caller holds the collection lock and the
    /// collection index exists.
    async fn create_locked(
        &self,
        collection: &ResourcePath,
        parent_ids: &[String],
        id: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let path = collection.child(id)?;
        let member_id = path.odata_id(&self.ctx.rest_base);

        if self.is_taken(&path, &member_id).await {
            warn!(resource_type = %self.kind.name(), member = %member_id, "duplicate member rejected");
            return Err(Error::Conflict {
                resource: self.kind.name().to_string(),
                id: id.to_string(),
            });
        }

        let _guard = self.ctx.locks.lock(&path).await;

        let mut document = self.kind.generator().instance(&self.wildcards(parent_ids, id))?;
        if let Some(body) = body {
            shallow_merge(&mut document, body);
        }
        if let Some(fields) = document.as_object_mut() {
            fields.insert(ODATA_ID.to_string(), Value::String(member_id.clone()));
        }

        self.ctx.store.write(&path, &document).await?;

        if let Err(e) = self.collections.add_member(collection, &member_id).await {
            error!(member = %member_id, error = %e, "collection index update failed, rolling back");
            if let Err(cleanup) = self.ctx.store.delete(&path).await {
                error!(member = %member_id, error = %cleanup, "rollback of member document failed");
            }
            return Err(e);
        }

        if let Err(e) = self.collections.register_member(&member_id) {
            error!(member = %member_id, error = %e, "member registration failed, rolling back");
            if let Err(cleanup) = self.collections.remove_member(collection, &member_id).await {
                error!(member = %member_id, error = %cleanup, "rollback of collection index failed");
            }
            if let Err(cleanup) = self.ctx.store.delete(&path).await {
                error!(member = %member_id, error = %cleanup, "rollback of member document failed");
            }
            return Err(e);
        }

        info!(resource_type = %self.kind.name(), member = %member_id, "created member");
        self.emit(ResourceEventKind::Created, member_id);
        Ok(document)
    }

    fn wildcards(&self, parent_ids: &[String], id: &str) -> Wildcards {
        let mut wildcards = Wildcards::new().with(REST_BASE_TOKEN, self.ctx.rest_base.as_str());
        let values = parent_ids.iter().map(String::as_str).chain(std::iter::once(id));
        for (name, value) in self.kind.instance_template().placeholders().zip(values) {
            wildcards.insert(name, value);
        }
        wildcards
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// PUT: replace the whole document with `body`, then read it back
    pub async fn replace(&self, parent_ids: &[String], id: &str, body: &Value) -> Result<Value> {
        if !body.is_object() {
            return Err(Error::InvalidInput("body must be a JSON object".into()));
        }
        let path = self.instance_path(parent_ids, id)?;

        {
            let _guard = self.ctx.locks.lock(&path).await;
            if !self.ctx.store.exists(&path).await {
                return Err(Error::not_found(path.to_string()));
            }
            self.ctx.store.write(&path, body).await?;
        }

        info!(resource_type = %self.kind.name(), path = %path, "replaced member");
        self.emit(ResourceEventKind::Replaced, path.odata_id(&self.ctx.rest_base));
        self.read(parent_ids, id).await
    }

    /// PATCH: deep-merge `body` into the stored document, then read it back
    pub async fn patch(&self, parent_ids: &[String], id: &str, body: &Value) -> Result<Value> {
        if !body.is_object() {
            return Err(Error::InvalidInput("body must be a JSON object".into()));
        }
        let path = self.instance_path(parent_ids, id)?;

        {
            let _guard = self.ctx.locks.lock(&path).await;
            let mut document = self.ctx.store.read(&path).await?;
            deep_merge(&mut document, body);
            self.ctx.store.write(&path, &document).await?;
        }

        info!(resource_type = %self.kind.name(), path = %path, "patched member");
        self.emit(ResourceEventKind::Patched, path.odata_id(&self.ctx.rest_base));
        self.read(parent_ids, id).await
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// DELETE: remove the instance (and anything nested below it) and its
    /// collection index entry
    pub async fn delete(&self, parent_ids: &[String], id: &str) -> Result<()> {
        let collection = self.collection_path(parent_ids)?;
        let path = collection.child(id)?;
        let member_id = path.odata_id(&self.ctx.rest_base);

        {
            let _collection_guard = self.ctx.locks.lock(&collection).await;
            let _guard = self.ctx.locks.lock(&path).await;

            if !self.ctx.store.exists(&path).await {
                return Err(Error::not_found(path.to_string()));
            }

            let listed = if self.ctx.store.exists(&collection).await {
                self.collections.remove_member(&collection, &member_id).await?
            } else {
                false
            };

            if let Err(e) = self.ctx.store.delete(&path).await {
                if listed {
                    if let Err(restore) = self.collections.add_member(&collection, &member_id).await {
                        error!(member = %member_id, error = %restore, "could not restore index entry");
                    }
                }
                return Err(e);
            }

            self.collections.deregister_member(&member_id);
            let nested = self.collections.registry().deregister_below(&member_id);
            if nested > 0 {
                debug!(member = %member_id, nested, "forgot nested members");
            }
        }
        self.ctx.locks.prune();

        info!(resource_type = %self.kind.name(), member = %member_id, "deleted member");
        self.emit(ResourceEventKind::Deleted, member_id);
        Ok(())
    }

    fn emit(&self, kind: ResourceEventKind, odata_id: String) {
        // No subscribers is fine
        let _ = self
            .ctx
            .events
            .send(ResourceEvent::new(kind, self.kind.name(), odata_id));
    }
}
