use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use ahash::AHashSet;

use super::{BindingFunction, BindingResult};
use crate::catalog::TypeCatalog;
use crate::context::{ContextKey, ContextMatch, ContextPattern, InjectionContext};
use crate::desire::DesireChain;
use crate::error::{DiError, DiResult};
use crate::rules::BindRule;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Applies bind rules scoped by context patterns.
///
/// On each call, every rule whose pattern matches the context and which
/// matches the desire is ranked by pattern match quality, then by the
/// rule's qualifier matcher priority. A rule is applied at most once per
/// desire chain; the rules already applied are remembered in the
/// context's scratch store under this function's id and the chain key.
/// Two distinct rules tied for first place fail with
/// [`DiError::MultipleBindings`].
pub struct RuleBasedBindingFunction {
    id: usize,
    catalog: Arc<TypeCatalog>,
    rules: Vec<(ContextPattern, Vec<BindRule>)>,
}

struct Candidate<'a> {
    matched: ContextMatch,
    rule: &'a BindRule,
}

impl Candidate<'_> {
    fn rank(&self, other: &Self) -> Ordering {
        self.matched.cmp(&other.matched).then_with(|| {
            self.rule
                .qualifier()
                .priority()
                .cmp(&other.rule.qualifier().priority())
        })
    }
}

impl RuleBasedBindingFunction {
    pub fn new(catalog: Arc<TypeCatalog>, rules: impl IntoIterator<Item = (ContextPattern, BindRule)>) -> Self {
        let mut grouped: Vec<(ContextPattern, Vec<BindRule>)> = Vec::new();
        for (pattern, rule) in rules {
            match grouped.iter_mut().find(|(p, _)| *p == pattern) {
                Some((_, existing)) => existing.push(rule),
                None => grouped.push((pattern, vec![rule])),
            }
        }
        Self {
            id: NEXT_ID.fetch_add(1, AtomicOrdering::Relaxed),
            catalog,
            rules: grouped,
        }
    }

    /// All rules, grouped by pattern.
    pub fn rules(&self) -> &[(ContextPattern, Vec<BindRule>)] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl BindingFunction for RuleBasedBindingFunction {
    fn bind(&self, context: &InjectionContext, chain: &DesireChain) -> DiResult<Option<BindingResult>> {
        let desire = chain.current_desire();
        let key = ContextKey::new(self.id, chain.key());
        let applied = context.with_value(key, |applied: &mut AHashSet<BindRule>| applied.clone());

        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        for (pattern, rules) in &self.rules {
            let Some(matched) = pattern.matches(&self.catalog, context.frames()) else {
                continue;
            };
            for rule in rules {
                if rule.matches(desire) && !applied.contains(rule) {
                    candidates.push(Candidate { matched: matched.clone(), rule });
                }
            }
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        candidates.sort_by(|a, b| a.rank(b));
        let best = &candidates[0];
        let mut tied: Vec<BindRule> = vec![best.rule.clone()];
        for other in candidates[1..].iter().take_while(|c| c.rank(best) == Ordering::Equal) {
            if !tied.contains(other.rule) {
                tied.push(other.rule.clone());
            }
        }
        if tied.len() > 1 {
            tracing::debug!(desire = %desire, context = %context, rules = tied.len(), "ambiguous bindings");
            return Err(DiError::MultipleBindings {
                chain: chain.clone(),
                context: context.clone(),
                rules: tied,
            });
        }

        let rule = best.rule;
        tracing::trace!(desire = %desire, rule = %rule, candidates = candidates.len(), "selected bind rule");
        context.with_value(key, |applied: &mut AHashSet<BindRule>| {
            applied.insert(rule.clone());
        });
        Ok(Some(BindingResult::new(
            rule.apply(desire, &self.catalog),
            rule.cache_policy(),
            rule.flags(),
        )))
    }
}

impl fmt::Debug for RuleBasedBindingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleBasedBindingFunction")
            .field("id", &self.id)
            .field("rules", &self.rules)
            .finish()
    }
}
