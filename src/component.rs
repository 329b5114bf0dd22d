//! Node and edge labels of the resolved dependency graph.

use std::fmt;

use crate::cache_policy::CachePolicy;
use crate::desire::{Desire, DesireChain};
use crate::key::TypeKey;
use crate::satisfaction::Satisfaction;

/// A graph node label: a satisfaction plus the cache policy to apply.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Component {
    satisfaction: Satisfaction,
    policy: CachePolicy,
}

impl Component {
    pub fn new(satisfaction: Satisfaction, policy: CachePolicy) -> Self {
        Self { satisfaction, policy }
    }

    /// The synthetic root: a null satisfaction of the root type.
    pub fn root() -> Self {
        Self::new(Satisfaction::Null(TypeKey::Root), CachePolicy::NoPreference)
    }

    pub fn is_root(&self) -> bool {
        matches!(&self.satisfaction, Satisfaction::Null(TypeKey::Root))
    }

    pub fn satisfaction(&self) -> &Satisfaction {
        &self.satisfaction
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.policy
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("<root>");
        }
        write!(f, "{}", self.satisfaction)?;
        if self.policy != CachePolicy::NoPreference {
            write!(f, " [{}]", self.policy)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A graph edge label: the desire chain that produced the edge, and
/// whether any rule along it was fixed (exempt from rewriting).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    chain: DesireChain,
    fixed: bool,
}

impl Dependency {
    pub fn new(chain: DesireChain, fixed: bool) -> Self {
        Self { chain, fixed }
    }

    pub fn chain(&self) -> &DesireChain {
        &self.chain
    }

    /// The desire declared by the injection point.
    pub fn initial_desire(&self) -> &Desire {
        self.chain.initial_desire()
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain.initial_desire().injection_point())?;
        if self.fixed {
            f.write_str(" (fixed)")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("chain", &self.chain)
            .field("fixed", &self.fixed)
            .finish()
    }
}
