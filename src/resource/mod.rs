//! Resource Module
//!
//! Type-independent building blocks shared by every resource type: path
//! resolution, instance templates and document merging.

pub mod merge;
pub mod path;
pub mod template;

pub use merge::*;
pub use path::*;
pub use template::*;
