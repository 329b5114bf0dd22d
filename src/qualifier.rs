//! Qualifier values attached to injection points and context frames.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A qualifier tag distinguishing otherwise identical dependencies.
///
/// A qualifier has a *kind* (the annotation type, e.g. `Named`) and a set
/// of attribute values. Equality and hashing are structural, so two
/// qualifiers built from the same kind and attributes are interchangeable.
///
/// Qualifier kinds that allow unqualified fallthrough are matched by rules
/// that were bound without an explicit qualifier (see
/// [`QualifierMatcher::Default`](crate::QualifierMatcher::Default)).
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::Qualifier;
///
/// let primary = Qualifier::named("primary");
/// assert_eq!(primary, Qualifier::new("Named").with_attribute("value", "primary"));
/// assert_eq!(primary.to_string(), "@Named(value=primary)");
///
/// let lenient = Qualifier::new("Fast").allowing_default();
/// assert!(lenient.allows_default());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier {
    kind: Arc<str>,
    attributes: BTreeMap<Arc<str>, Arc<str>>,
    allow_default: bool,
}

impl Qualifier {
    /// Creates a qualifier of the given kind with no attributes.
    pub fn new(kind: impl AsRef<str>) -> Self {
        Self {
            kind: Arc::from(kind.as_ref()),
            attributes: BTreeMap::new(),
            allow_default: false,
        }
    }

    /// Shorthand for `@Named(value)`.
    pub fn named(value: impl AsRef<str>) -> Self {
        Self::new("Named").with_attribute("value", value)
    }

    /// Adds an attribute value.
    pub fn with_attribute(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.attributes
            .insert(Arc::from(name.as_ref()), Arc::from(value.as_ref()));
        self
    }

    /// Marks the qualifier kind as matchable by unqualified bindings.
    pub fn allowing_default(mut self) -> Self {
        self.allow_default = true;
        self
    }

    /// The qualifier kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Looks up an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| &**v)
    }

    /// Whether unqualified bindings may satisfy this qualifier.
    pub fn allows_default(&self) -> bool {
        self.allow_default
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.kind)?;
        if !self.attributes.is_empty() {
            f.write_str("(")?;
            for (i, (name, value)) in self.attributes.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}={}", name, value)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
