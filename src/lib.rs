//! Redfish Emulator
//!
//! Serves a hierarchical Redfish resource tree over HTTP, backed by plain
//! JSON documents on disk instead of real hardware. Every resource type
//! (volumes, network interfaces, ...) shares one generic lifecycle engine:
//! collections are created on first POST, member lists are kept in step
//! with the instances, and PUT/PATCH/DELETE follow a single protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          REST API (axum)                             │
//! │        auth ─► dispatch by path template ─► static fallback          │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                     Resource Type Registry                           │
//! │    Volume   NetworkInterface   ...types from the registry file       │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                  Lifecycle Engine (one per type)                     │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐  │
//! │  │  Collection    │  │    Member      │  │     Path Locks         │  │
//! │  │  Manager       │  │    Registry    │  │  (collection ► member) │  │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘  │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                         Resource Store                               │
//! │     FileStore ({root}/.../index.json)        MemoryStore             │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: HTTP surface, authentication, metrics and server bootstrap
//! - [`engine`]: Resource lifecycle engine and its bookkeeping
//! - [`registry`]: Resource type registry and built-in types
//! - [`resource`]: Path templates, instance templates and merging
//! - [`store`]: Document persistence
//! - [`error`]: Error types and handling

pub mod api;
pub mod engine;
pub mod error;
pub mod registry;
pub mod resource;
pub mod store;

// Re-export commonly used types
pub use api::{ApiMetrics, ApiServer, ApiServerConfig, Authenticator, RestRouter};

pub use engine::{
    EngineContext, LifecycleEngine, MemberRegistry, PathLocks, ResourceEvent, ResourceEventKind,
};

pub use error::{Error, Result};

pub use registry::{ResourceKind, ResourceTypeRegistry};

pub use resource::{JsonTemplate, PathTemplate, ResourcePath, TemplateGenerator, Wildcards};

pub use store::{FileStore, FileStoreConfig, MemoryStore, ResourceStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
