//! Binding functions: the prioritized chain that rewrites desires.
//!
//! The solver asks each function in turn for an opinion on the current
//! desire. A function either declines (`Ok(None)`), offers a rewritten
//! desire with flags, or fails (for example on ambiguous bind rules).

mod builder;
mod default;
mod provider;
mod rule_based;

pub use builder::{BindingFunctionBuilder, RuleSet};
pub use default::DefaultDesireBindingFunction;
pub use provider::ProviderBindingFunction;
pub use rule_based::RuleBasedBindingFunction;

use std::fmt;

use crate::cache_policy::CachePolicy;
use crate::context::InjectionContext;
use crate::desire::{Desire, DesireChain};
use crate::error::DiResult;
use crate::rules::BindFlags;

/// A source of desire rewrites.
pub trait BindingFunction: Send + Sync + fmt::Debug {
    /// Offers a rewrite of `chain.current_desire()` in `context`, or
    /// `Ok(None)` for no opinion.
    fn bind(&self, context: &InjectionContext, chain: &DesireChain) -> DiResult<Option<BindingResult>>;
}

/// The outcome of one successful binding.
#[derive(Debug, Clone)]
pub struct BindingResult {
    desire: Desire,
    policy: CachePolicy,
    flags: BindFlags,
}

impl BindingResult {
    pub fn new(desire: Desire, policy: CachePolicy, flags: BindFlags) -> Self {
        Self { desire, policy, flags }
    }

    /// A terminal result with no further flags.
    pub fn terminal(desire: Desire) -> Self {
        let flags = BindFlags { terminal: true, ..BindFlags::default() };
        Self::new(desire, CachePolicy::NoPreference, flags)
    }

    /// A non-terminal result with no further flags.
    pub fn chained(desire: Desire) -> Self {
        Self::new(desire, CachePolicy::NoPreference, BindFlags::default())
    }

    pub fn deferred(mut self) -> Self {
        self.flags.deferred = true;
        self
    }

    /// The replacement desire.
    pub fn desire(&self) -> &Desire {
        &self.desire
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn flags(&self) -> BindFlags {
        self.flags
    }

    pub fn is_terminal(&self) -> bool {
        self.flags.terminal
    }

    pub fn is_deferred(&self) -> bool {
        self.flags.deferred
    }

    pub fn is_fixed(&self) -> bool {
        self.flags.fixed
    }

    pub fn is_skippable(&self) -> bool {
        self.flags.skippable
    }
}
