//! Type keys identifying the types a resolver reasons about.

use std::fmt;
use std::sync::Arc;

/// Identifier for a type known to the resolver.
///
/// Keys are cheap to clone (reference counted) and compare structurally.
/// Named keys usually come from [`key_of_type`], but any stable string
/// works, which is convenient for tests and for metadata produced outside
/// the Rust type system.
///
/// # Key Types
///
/// - **Named**: a concrete type or an interface
/// - **Provider**: `Provider<T>`, requested when a component wants to
///   create `T` lazily (and the only way to break a dependency cycle)
/// - **Root**: the erased type of the solver's synthetic root component
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{TypeKey, key_of_type};
///
/// struct Database;
///
/// let db = key_of_type::<Database>();
/// assert!(db.name().ends_with("Database"));
///
/// let lazy_db = TypeKey::provider_of(&db);
/// assert_eq!(lazy_db.provided_type(), Some(&db));
/// assert_eq!(TypeKey::named("Cache").to_string(), "Cache");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKey {
    /// A concrete type or interface, identified by name
    Named(Arc<str>),
    /// A provider that lazily produces the wrapped type
    Provider(Arc<TypeKey>),
    /// The synthetic root type
    Root,
}

impl TypeKey {
    /// Creates a named key.
    pub fn named(name: impl AsRef<str>) -> Self {
        TypeKey::Named(Arc::from(name.as_ref()))
    }

    /// Creates the `Provider<T>` key for `provided`.
    pub fn provider_of(provided: &TypeKey) -> Self {
        TypeKey::Provider(Arc::new(provided.clone()))
    }

    /// Returns `T` for a `Provider<T>` key.
    pub fn provided_type(&self) -> Option<&TypeKey> {
        match self {
            TypeKey::Provider(inner) => Some(inner),
            _ => None,
        }
    }

    /// Whether this is a `Provider<T>` key.
    pub fn is_provider(&self) -> bool {
        matches!(self, TypeKey::Provider(_))
    }

    /// Human readable name, used in diagnostics and graph exports.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Named(name) => f.write_str(name),
            TypeKey::Provider(inner) => write!(f, "Provider<{}>", inner),
            TypeKey::Root => f.write_str("()"),
        }
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        TypeKey::named(name)
    }
}

// Helper for keys of real Rust types
#[inline]
pub fn key_of_type<T: ?Sized + 'static>() -> TypeKey {
    TypeKey::named(std::any::type_name::<T>())
}
