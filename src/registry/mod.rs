//! Resource Type Registry
//!
//! Maps each resource type name to its path template and template
//! generator. Built once at startup (built-in types plus an optional YAML
//! file) and used to instantiate one lifecycle engine per type.

pub mod builtin;

use crate::engine::{EngineContext, LifecycleEngine};
use crate::error::{Error, Result};
use crate::resource::{JsonTemplate, PathTemplate, ResourcePath, TemplateGenerator};
use crate::store::ResourceStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

// =============================================================================
// Resource Kind
// =============================================================================

/// One registered resource type
pub struct ResourceKind {
    name: String,
    instance_template: PathTemplate,
    collection_template: PathTemplate,
    generator: Arc<dyn TemplateGenerator>,
}

impl ResourceKind {
    /// Register `name` at instance path `path` (`Storage/{StorageId}/Volumes/{VolumeId}`)
    pub fn new(
        name: impl Into<String>,
        path: &str,
        generator: Arc<dyn TemplateGenerator>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::Configuration(format!(
                "resource type name {name:?} must be non-empty and alphanumeric"
            )));
        }

        let instance_template = PathTemplate::parse(path)?;
        let collection_template = instance_template.collection()?;

        Ok(Self {
            name,
            instance_template,
            collection_template,
            generator,
        })
    }

    /// Register `name` with a minimal generated template
    pub fn with_default_template(name: impl Into<String>, path: &str) -> Result<Self> {
        let name = name.into();
        let instance_template = PathTemplate::parse(path)?;
        let skeleton = default_skeleton(&name, &instance_template);
        Self::new(name, path, Arc::new(JsonTemplate::new(skeleton)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_template(&self) -> &PathTemplate {
        &self.instance_template
    }

    pub fn collection_template(&self) -> &PathTemplate {
        &self.collection_template
    }

    pub fn generator(&self) -> &dyn TemplateGenerator {
        self.generator.as_ref()
    }
}

impl fmt::Debug for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceKind")
            .field("name", &self.name)
            .field("path", &self.instance_template.as_str())
            .finish()
    }
}

/// Skeleton with just the identity properties every Redfish resource carries
fn default_skeleton(name: &str, template: &PathTemplate) -> Value {
    let id = template
        .placeholders()
        .last()
        .map(|p| format!("{{{p}}}"))
        .unwrap_or_default();

    json!({
        "@odata.id": format!("{{rb}}{}", template.as_str()),
        "@odata.type": format!("#{name}.v1_0_0.{name}"),
        "Id": id,
        "Name": format!("{name} {id}"),
    })
}

// =============================================================================
// Registry File
// =============================================================================

/// One entry of the registry file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeEntry {
    /// Type name (`Volume`)
    pub name: String,
    /// Instance path template relative to the REST base
    pub path: String,
    /// Instance skeleton; a minimal one is generated when absent
    #[serde(default)]
    pub template: Option<Value>,
}

impl ResourceTypeEntry {
    fn into_kind(self) -> Result<ResourceKind> {
        match self.template {
            Some(template) => {
                ResourceKind::new(self.name, &self.path, Arc::new(JsonTemplate::new(template)?))
            }
            None => ResourceKind::with_default_template(self.name, &self.path),
        }
    }
}

/// Top-level registry file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryFile {
    #[serde(default)]
    pub resource_types: Vec<ResourceTypeEntry>,
}

// =============================================================================
// Resource Type Registry
// =============================================================================

/// Registered resource types in registration order
#[derive(Debug, Default)]
pub struct ResourceTypeRegistry {
    kinds: Vec<Arc<ResourceKind>>,
}

impl ResourceTypeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in types
    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::new();
        for kind in builtin::all()? {
            registry.register(kind)?;
        }
        Ok(registry)
    }

    /// Add a type, rejecting duplicate names and paths already served by
    /// another type
    pub fn register(&mut self, kind: ResourceKind) -> Result<()> {
        let shape = kind.instance_template().shape();
        for existing in &self.kinds {
            if existing.name() == kind.name() {
                return Err(Error::Configuration(format!(
                    "resource type {} registered twice",
                    kind.name()
                )));
            }
            if existing.instance_template().shape() == shape {
                return Err(Error::Configuration(format!(
                    "resource types {} and {} share the path {}",
                    existing.name(),
                    kind.name(),
                    shape
                )));
            }
        }

        info!(resource_type = %kind.name(), path = %kind.instance_template(), "registered resource type");
        self.kinds.push(Arc::new(kind));
        Ok(())
    }

    /// Register every type described by a YAML document
    pub fn load_str(&mut self, yaml: &str) -> Result<usize> {
        let file: RegistryFile = serde_yaml::from_str(yaml)?;
        let count = file.resource_types.len();
        for entry in file.resource_types {
            self.register(entry.into_kind()?)?;
        }
        Ok(count)
    }

    /// Register every type described by the YAML file at `path`
    pub async fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let yaml = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Configuration(format!("cannot read registry file {}: {e}", path.display()))
        })?;
        let count = self.load_str(&yaml)?;
        info!(file = %path.display(), count, "loaded resource types");
        Ok(count)
    }

    /// Look a type up by name
    pub fn get(&self, name: &str) -> Option<&Arc<ResourceKind>> {
        self.kinds.iter().find(|k| k.name() == name)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &Arc<ResourceKind>> {
        self.kinds.iter()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// One lifecycle engine per registered type, all sharing `ctx`
    pub fn engines<S: ResourceStore>(&self, ctx: &EngineContext<S>) -> Vec<Arc<LifecycleEngine<S>>> {
        self.kinds
            .iter()
            .map(|kind| Arc::new(LifecycleEngine::new(kind.clone(), ctx.clone())))
            .collect()
    }
}

// =============================================================================
// Route Matching
// =============================================================================

/// What a request path addresses within one resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The collection, with its ancestor identifiers
    Collection { parent_ids: Vec<String> },
    /// One instance, with its ancestor identifiers and own identifier
    Instance { parent_ids: Vec<String>, id: String },
}

/// Classify `path` against `kind`'s templates
pub fn match_target(kind: &ResourceKind, path: &ResourcePath) -> Option<Target> {
    if let Some(mut ids) = kind.instance_template().captures(path) {
        let id = ids.pop()?;
        return Some(Target::Instance { parent_ids: ids, id });
    }
    kind.collection_template()
        .captures(path)
        .map(|parent_ids| Target::Collection { parent_ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Wildcards;
    use assert_matches::assert_matches;

    #[test]
    fn test_builtin_registry() {
        let registry = ResourceTypeRegistry::with_builtin().unwrap();
        assert_eq!(registry.len(), 2);

        let volume = registry.get("Volume").unwrap();
        assert_eq!(volume.collection_template().as_str(), "Storage/{StorageId}/Volumes");
        assert!(registry.get("NetworkInterface").is_some());
        assert!(registry.get("Drive").is_none());
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut registry = ResourceTypeRegistry::with_builtin().unwrap();

        assert_matches!(
            registry.register(ResourceKind::with_default_template("Volume", "Other/{Id}").unwrap()),
            Err(Error::Configuration(_))
        );
        assert_matches!(
            registry.register(
                ResourceKind::with_default_template("Vol2", "Storage/{Id}/Volumes/{V}").unwrap()
            ),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn test_kind_requires_collection_shape() {
        assert!(ResourceKind::with_default_template("Storage", "Storage/{StorageId}").is_ok());
        assert!(ResourceKind::with_default_template("Bad", "Storage/{StorageId}/Volumes").is_err());
        assert!(ResourceKind::with_default_template("Bad Name", "A/{Id}").is_err());
    }

    #[test]
    fn test_default_skeleton() {
        let kind = ResourceKind::with_default_template("Drive", "Chassis/{ChassisId}/Drives/{DriveId}")
            .unwrap();
        let doc = kind
            .generator()
            .instance(
                &Wildcards::new()
                    .with("rb", "/redfish/v1/")
                    .with("ChassisId", "C1")
                    .with("DriveId", "D1"),
            )
            .unwrap();

        assert_eq!(doc["@odata.id"], "/redfish/v1/Chassis/C1/Drives/D1");
        assert_eq!(doc["@odata.type"], "#Drive.v1_0_0.Drive");
        assert_eq!(doc["Id"], "D1");
        assert_eq!(doc["Name"], "Drive D1");
    }

    #[test]
    fn test_load_str() {
        let yaml = r##"
resourceTypes:
  - name: Drive
    path: Chassis/{ChassisId}/Drives/{DriveId}
  - name: Endpoint
    path: Fabrics/{FabricId}/Endpoints/{EndpointId}
    template:
      "@odata.type": "#Endpoint.v1_5_0.Endpoint"
      Id: "{EndpointId}"
      EndpointProtocol: NVMeOverFabrics
"##;
        let mut registry = ResourceTypeRegistry::with_builtin().unwrap();
        assert_eq!(registry.load_str(yaml).unwrap(), 2);
        assert_eq!(registry.len(), 4);

        let endpoint = registry.get("Endpoint").unwrap();
        let doc = endpoint
            .generator()
            .instance(&Wildcards::new().with("EndpointId", "E1"))
            .unwrap();
        assert_eq!(doc["Id"], "E1");
        assert_eq!(doc["EndpointProtocol"], "NVMeOverFabrics");
    }

    #[test]
    fn test_load_str_rejects_bad_input() {
        let mut registry = ResourceTypeRegistry::new();
        assert_matches!(registry.load_str("resourceTypes: 5"), Err(Error::RegistryFile(_)));
        assert_matches!(
            registry.load_str("resourceTypes:\n  - name: X\n    path: X/{Id}\n    template: [1]\n"),
            Err(Error::Configuration(_))
        );
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("types.yaml");
        tokio::fs::write(&file, "resourceTypes:\n  - name: Drive\n    path: Chassis/{C}/Drives/{D}\n")
            .await
            .unwrap();

        let mut registry = ResourceTypeRegistry::new();
        assert_eq!(registry.load_file(&file).await.unwrap(), 1);
        assert_matches!(
            registry.load_file(dir.path().join("missing.yaml")).await,
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn test_match_target() {
        let kind = builtin::volume().unwrap();

        let path = ResourcePath::parse("Storage/S1/Volumes").unwrap();
        assert_eq!(
            match_target(&kind, &path),
            Some(Target::Collection { parent_ids: vec!["S1".into()] })
        );

        let path = ResourcePath::parse("Storage/S1/Volumes/V1").unwrap();
        assert_eq!(
            match_target(&kind, &path),
            Some(Target::Instance {
                parent_ids: vec!["S1".into()],
                id: "V1".into()
            })
        );

        let path = ResourcePath::parse("Storage/S1").unwrap();
        assert_eq!(match_target(&kind, &path), None);
    }
}
