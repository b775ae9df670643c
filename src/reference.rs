//! Template references: `resource#fragment` splitting and canonicalization.
//!
//! A reference names a resource (usually a file path relative to the loader
//! root) and optionally one of its sub-templates:
//!
//! ```text
//! views/page.html#main
//! └──── resource ─┘└id┘
//! ```
//!
//! The fragment keeps its leading `#` because sub-template identifiers are
//! declared that way (`{$: "#main" }`).

use std::fmt;

/// A reference split into its resource and fragment parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    /// Resource part, empty when the reference is fragment-only
    pub resource: String,
    /// Fragment including the leading `#`, empty when absent
    pub fragment: String,
}

impl TemplateRef {
    /// Split a combined `resource#fragment` string.
    ///
    /// # Examples
    ///
    /// ```
    /// use handlebar::reference::TemplateRef;
    ///
    /// let r = TemplateRef::parse("views/page.html#main");
    /// assert_eq!(r.resource, "views/page.html");
    /// assert_eq!(r.fragment, "#main");
    ///
    /// let r = TemplateRef::parse("#sidebar");
    /// assert_eq!(r.resource, "");
    /// assert_eq!(r.fragment, "#sidebar");
    /// ```
    #[must_use]
    pub fn parse(reference: &str) -> Self {
        match reference.find('#') {
            Some(pos) => Self {
                resource: reference[..pos].to_string(),
                fragment: reference[pos..].to_string(),
            },
            None => Self {
                resource: reference.to_string(),
                fragment: String::new(),
            },
        }
    }
}

/// Canonical identity of a sub-template: the resource it was declared in plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateKey {
    /// Canonical resource path
    pub resource: String,
    /// Sub-template identifier, including the leading `#`
    pub id: String,
}

impl TemplateKey {
    /// Create a key from its parts
    pub fn new(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.resource, self.id)
    }
}

/// Resolve `reference` as seen from `current_resource` into a canonical key.
///
/// - A fragment-only reference (`#id`) stays within `current_resource`.
/// - A leading `/` makes the resource root-relative.
/// - Anything else is relative to the directory of `current_resource`.
/// - `.` and `..` segments are collapsed; `..` never climbs above the root.
///
/// # Examples
///
/// ```
/// use handlebar::reference::canonicalize;
///
/// let key = canonicalize("../shared/nav.html#menu", "views/page.html");
/// assert_eq!(key.to_string(), "shared/nav.html#menu");
///
/// let key = canonicalize("#footer", "views/page.html");
/// assert_eq!(key.to_string(), "views/page.html#footer");
/// ```
#[must_use]
pub fn canonicalize(reference: &str, current_resource: &str) -> TemplateKey {
    let parsed = TemplateRef::parse(reference.trim());

    let resource = if parsed.resource.is_empty() {
        current_resource.to_string()
    } else {
        resolve_resource(&parsed.resource, current_resource)
    };

    TemplateKey::new(resource, parsed.fragment)
}

/// Resolve a resource path against the directory of `current_resource`.
#[must_use]
pub fn resolve_resource(resource: &str, current_resource: &str) -> String {
    let joined = if let Some(rooted) = resource.strip_prefix('/') {
        rooted.to_string()
    } else {
        match current_resource.rfind('/') {
            Some(pos) => format!("{}/{}", &current_resource[..pos], resource),
            None => resource.to_string(),
        }
    };
    normalize(&joined)
}

/// Collapse `.` and `..` segments and repeated separators.
fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
