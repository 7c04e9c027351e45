//! Resource Path Resolver
//!
//! Turns a URL path template such as `Storage/{StorageId}/Volumes/{VolumeId}`
//! plus an ordered list of identifiers into a [`ResourcePath`], which in turn
//! maps onto the filesystem (`{root}/Storage/S1/Volumes/V1/index.json`) and
//! onto the canonical `@odata.id` (`/redfish/v1/Storage/S1/Volumes/V1`).

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the document stored in every resource directory
pub const INDEX_FILE: &str = "index.json";

// =============================================================================
// Identifier Validation
// =============================================================================

/// Check that `value` can be used as a single path segment.
///
/// Identifiers come straight from URLs and request bodies, so anything that
/// could climb out of the resource root, or collide with a stored document,
/// is rejected.
pub fn validate_identifier(value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        Some("identifier is empty")
    } else if value == "." || value == ".." {
        Some("relative path components are not allowed")
    } else if value.contains(['/', '\\']) {
        Some("path separators are not allowed")
    } else if value.contains('\0') {
        Some("NUL bytes are not allowed")
    } else if value == INDEX_FILE {
        Some("reserved document file name")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidIdentifier {
            value: value.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Path Template
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed URL path template with ordered `{Name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template like `Storage/{StorageId}/Volumes/{VolumeId}`
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::Configuration(format!("empty path template: {raw:?}")));
        }

        let mut segments = Vec::new();
        for part in trimmed.split('/') {
            if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(Error::Configuration(format!(
                        "invalid placeholder {part:?} in template {raw:?}"
                    )));
                }
                if segments
                    .iter()
                    .any(|s| matches!(s, Segment::Placeholder(n) if n == name))
                {
                    return Err(Error::Configuration(format!(
                        "duplicate placeholder {part:?} in template {raw:?}"
                    )));
                }
                segments.push(Segment::Placeholder(name.to_string()));
            } else {
                if part.contains(['{', '}']) {
                    return Err(Error::Configuration(format!(
                        "malformed segment {part:?} in template {raw:?}"
                    )));
                }
                validate_identifier(part).map_err(|e| Error::Configuration(e.to_string()))?;
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The template text, without leading or trailing slashes
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in positional order
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Number of identifiers [`resolve`](Self::resolve) expects
    pub fn arity(&self) -> usize {
        self.placeholders().count()
    }

    /// Template of the owning collection: the instance template minus its
    /// trailing placeholder.
    ///
    /// Instance templates must end in `.../{Collection}/{Id}`.
    pub fn collection(&self) -> Result<PathTemplate> {
        match self.segments.as_slice() {
            [head @ .., collection @ Segment::Literal(_), Segment::Placeholder(_)] => {
                let mut segments = head.to_vec();
                segments.push(collection.clone());
                Ok(PathTemplate {
                    raw: render_raw(&segments),
                    segments,
                })
            }
            _ => Err(Error::Configuration(format!(
                "template {:?} must end in a collection segment followed by an identifier placeholder",
                self.raw
            ))),
        }
    }

    /// Name of the trailing literal segment (`Volumes` for a Volume template)
    pub fn collection_name(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|s| match s {
            Segment::Literal(name) => Some(name.as_str()),
            Segment::Placeholder(_) => None,
        })
    }

    /// Substitute `ids` positionally into the template
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<ResourcePath> {
        let expected = self.arity();
        if ids.len() != expected {
            return Err(Error::TemplateArity {
                template: self.raw.clone(),
                expected,
                actual: ids.len(),
            });
        }

        let mut ids = ids.iter();
        let mut segments = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => segments.push(lit.clone()),
                Segment::Placeholder(_) => {
                    // Arity was checked above.
                    let id = ids.next().map(|id| id.as_ref()).unwrap_or_default();
                    validate_identifier(id)?;
                    segments.push(id.to_string());
                }
            }
        }

        Ok(ResourcePath { segments })
    }

    /// Identifiers captured when `path` matches this template, in
    /// placeholder order
    pub fn captures(&self, path: &ResourcePath) -> Option<Vec<String>> {
        if path.segments().len() != self.segments.len() {
            return None;
        }

        let mut ids = Vec::with_capacity(self.arity());
        for (segment, value) in self.segments.iter().zip(path.segments()) {
            match segment {
                Segment::Literal(lit) if lit == value => {}
                Segment::Literal(_) => return None,
                Segment::Placeholder(_) => ids.push(value.clone()),
            }
        }
        Some(ids)
    }

    /// Template text with placeholder names erased (`Storage/{}/Volumes/{}`).
    ///
    /// Two templates with the same shape match exactly the same paths.
    pub fn shape(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(lit) => lit.as_str(),
                Segment::Placeholder(_) => "{}",
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn render_raw(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| match s {
            Segment::Literal(lit) => lit.clone(),
            Segment::Placeholder(name) => format!("{{{name}}}"),
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// =============================================================================
// Resource Path
// =============================================================================

/// Concrete, validated location of a resource relative to the resource root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// The resource root itself (the service root document)
    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    /// Build from raw segments, validating each one
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        for segment in &segments {
            validate_identifier(segment)?;
        }
        Ok(Self { segments })
    }

    /// Parse a slash separated relative path (`Storage/S1/Volumes`)
    pub fn parse(relative: &str) -> Result<Self> {
        Self::from_segments(relative.split('/').filter(|s| !s.is_empty()))
    }

    /// Path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is the resource root
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment: the identifier for an instance, the collection name for
    /// a collection
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Enclosing resource, `None` for the root
    pub fn parent(&self) -> Option<ResourcePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Child resource named `id`
    pub fn child(&self, id: &str) -> Result<ResourcePath> {
        validate_identifier(id)?;
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        Ok(Self { segments })
    }

    /// Whether `self` lies below (or is) `other`
    pub fn starts_with(&self, other: &ResourcePath) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// Slash separated relative form
    pub fn relative(&self) -> String {
        self.segments.join("/")
    }

    /// Directory holding this resource under `root`
    pub fn dir(&self, root: &Path) -> PathBuf {
        let mut dir = root.to_path_buf();
        dir.extend(&self.segments);
        dir
    }

    /// Document file of this resource under `root`
    pub fn index_file(&self, root: &Path) -> PathBuf {
        self.dir(root).join(INDEX_FILE)
    }

    /// Canonical `@odata.id` for this resource
    pub fn odata_id(&self, rest_base: &str) -> String {
        let base = rest_base.trim_end_matches('/');
        if self.segments.is_empty() {
            format!("{base}/")
        } else {
            format!("{}/{}", base, self.relative())
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.relative())
    }
}
