//! Injection contexts and the patterns matched against them.

mod pattern;
mod qualifier;

pub use pattern::{ContextMatch, ContextPattern, ElementMatcher, Multiplicity};
pub use qualifier::QualifierMatcher;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::desire::ChainKey;
use crate::key::TypeKey;
use crate::qualifier::Qualifier;
use crate::satisfaction::Satisfaction;

/// One resolved step of the context: the satisfaction being built and the
/// qualifier it was requested with.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContextFrame {
    satisfaction: Satisfaction,
    qualifier: Option<Qualifier>,
}

impl ContextFrame {
    pub fn new(satisfaction: Satisfaction, qualifier: Option<Qualifier>) -> Self {
        Self { satisfaction, qualifier }
    }

    pub fn satisfaction(&self) -> &Satisfaction {
        &self.satisfaction
    }

    /// The type this frame is matched as.
    pub fn ty(&self) -> &TypeKey {
        self.satisfaction.erased_type()
    }

    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }
}

impl fmt::Display for ContextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(q) = &self.qualifier {
            write!(f, "{} ", q)?;
        }
        write!(f, "{}", self.ty())
    }
}

impl fmt::Debug for ContextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Key for per-chain scratch state stored in a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey {
    owner: usize,
    chain: ChainKey,
}

impl ContextKey {
    /// `owner` identifies the binding function that owns the state.
    pub fn new(owner: usize, chain: ChainKey) -> Self {
        Self { owner, chain }
    }
}

struct ContextNode {
    parent: Option<InjectionContext>,
    frames: Arc<[ContextFrame]>,
    values: Mutex<AHashMap<ContextKey, Box<dyn Any + Send + Sync>>>,
}

/// The stack of frames visited from the root down to the desire being
/// resolved.
///
/// Contexts are immutable and share their prefix. Each context also owns a
/// scratch store that binding functions use to remember state across the
/// rounds of one resolution; pushing a frame starts with an empty store.
#[derive(Clone)]
pub struct InjectionContext(Arc<ContextNode>);

impl InjectionContext {
    /// The empty context root dependencies are resolved in.
    pub fn initial() -> Self {
        InjectionContext(Arc::new(ContextNode {
            parent: None,
            frames: Arc::from(Vec::new()),
            values: Mutex::new(AHashMap::new()),
        }))
    }

    /// Pushes a frame.
    pub fn extend(&self, satisfaction: Satisfaction, qualifier: Option<Qualifier>) -> Self {
        let mut frames = Vec::with_capacity(self.0.frames.len() + 1);
        frames.extend(self.0.frames.iter().cloned());
        frames.push(ContextFrame::new(satisfaction, qualifier));
        InjectionContext(Arc::new(ContextNode {
            parent: Some(self.clone()),
            frames: Arc::from(frames),
            values: Mutex::new(AHashMap::new()),
        }))
    }

    pub fn depth(&self) -> usize {
        self.0.frames.len()
    }

    /// Frames from the root to the innermost one.
    pub fn frames(&self) -> &[ContextFrame] {
        &self.0.frames
    }

    /// The innermost frame.
    pub fn tail(&self) -> Option<&ContextFrame> {
        self.0.frames.last()
    }

    /// The context without its innermost frame.
    pub fn leading(&self) -> Option<&InjectionContext> {
        self.0.parent.as_ref()
    }

    /// Runs `f` on the value stored under `key`, creating it on first use.
    pub fn with_value<T, R>(&self, key: ContextKey, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Default + Send + Sync + 'static,
    {
        let mut values = self.0.values.lock();
        let slot = values.entry(key).or_insert_with(|| Box::new(T::default()));
        if !slot.is::<T>() {
            *slot = Box::new(T::default());
        }
        match slot.downcast_mut::<T>() {
            Some(value) => f(value),
            None => f(&mut T::default()),
        }
    }
}

impl PartialEq for InjectionContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.frames() == other.frames()
    }
}

impl Eq for InjectionContext {}

impl fmt::Display for InjectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, frame) in self.frames().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", frame)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for InjectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InjectionContext{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desire::{Desire, DesireChain, InjectionPoint};

    fn class(name: &str) -> Satisfaction {
        Satisfaction::Class(TypeKey::named(name))
    }

    fn chain() -> DesireChain {
        let ty = TypeKey::named("X");
        DesireChain::singleton(Desire::from_parts(InjectionPoint::root(ty.clone(), None), ty, None))
    }

    #[test]
    fn test_extend_shares_prefix() {
        let root = InjectionContext::initial();
        let a = root.extend(class("A"), None);
        let ab = a.extend(class("B"), Some(Qualifier::named("b")));

        assert_eq!(root.depth(), 0);
        assert_eq!(ab.depth(), 2);
        assert_eq!(ab.leading(), Some(&a));
        assert_eq!(ab.tail().map(|f| f.ty().clone()), Some(TypeKey::named("B")));
        assert_eq!(ab.to_string(), "[A, @Named(value=b) B]");
    }

    #[test]
    fn test_values_are_per_context() {
        let root = InjectionContext::initial();
        let key = ContextKey::new(1, chain().key());

        root.with_value(key, |n: &mut u32| *n += 1);
        root.with_value(key, |n: &mut u32| *n += 1);
        assert_eq!(root.with_value(key, |n: &mut u32| *n), 2);

        let child = root.extend(class("A"), None);
        assert_eq!(child.with_value(key, |n: &mut u32| *n), 0);
    }
}
