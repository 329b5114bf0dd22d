use std::sync::Arc;

use super::RuleBasedBindingFunction;
use crate::catalog::TypeCatalog;
use crate::context::ContextPattern;
use crate::key::TypeKey;
use crate::rules::BindRule;

/// Which rules a [`BindingFunctionBuilder`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleSet {
    /// The rules as configured
    Explicit,
    /// For `bind(A).to(C)` with `C: B: A`, a rule `bind(B).to(C)` for each
    /// type strictly between the target and the dependency type
    IntermediateTypes,
    /// For `bind(A).to(C)`, a rule `bind(S).to(C)` for each supertype `S`
    /// of `A`
    SuperTypes,
}

/// Collects explicit bind rules and derives the generated rule sets.
///
/// Generated rules keep the pattern, qualifier matcher, target, policy and
/// flags of the explicit rule they come from.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{BindRule, BindingFunctionBuilder, ContextPattern, RuleSet, TypeCatalog, TypeSpec};
///
/// let mut types = TypeCatalog::builder();
/// types.add(TypeSpec::interface("Animal"));
/// types.add(TypeSpec::interface("Pet").extends("Animal"));
/// types.add(TypeSpec::class("Dog").extends("Pet"));
/// let catalog = types.build();
///
/// let mut builder = BindingFunctionBuilder::new(catalog.clone());
/// builder.bind(ContextPattern::any(), BindRule::bind("Pet").to("Dog").build(&catalog).unwrap());
///
/// assert_eq!(builder.build(RuleSet::Explicit).rules().len(), 1);
/// assert!(builder.build(RuleSet::IntermediateTypes).is_empty());
/// let supers = builder.build(RuleSet::SuperTypes);
/// assert_eq!(supers.rules()[0].1[0].depend_type().to_string(), "Animal");
/// ```
pub struct BindingFunctionBuilder {
    catalog: Arc<TypeCatalog>,
    rules: Vec<(ContextPattern, BindRule)>,
}

impl BindingFunctionBuilder {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog, rules: Vec::new() }
    }

    pub fn bind(&mut self, pattern: ContextPattern, rule: BindRule) -> &mut Self {
        self.rules.push((pattern, rule));
        self
    }

    pub fn rules(&self) -> &[(ContextPattern, BindRule)] {
        &self.rules
    }

    /// Builds a binding function over one rule set.
    pub fn build(&self, set: RuleSet) -> RuleBasedBindingFunction {
        let rules = match set {
            RuleSet::Explicit => self.rules.clone(),
            RuleSet::IntermediateTypes => self.generate(|rule| {
                self.catalog.types_between(rule.target().ty(), rule.depend_type())
            }),
            RuleSet::SuperTypes => self.generate(|rule| self.catalog.supertypes(rule.depend_type())),
        };
        RuleBasedBindingFunction::new(self.catalog.clone(), rules)
    }

    fn generate<F>(&self, types: F) -> Vec<(ContextPattern, BindRule)>
    where
        F: Fn(&BindRule) -> Vec<TypeKey>,
    {
        let mut generated = Vec::new();
        for (pattern, rule) in &self.rules {
            for ty in types(rule) {
                generated.push((pattern.clone(), rule.retarget(ty)));
            }
        }
        generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeSpec;

    #[test]
    fn test_intermediate_types_exclude_endpoints() {
        let mut types = TypeCatalog::builder();
        types
            .add(TypeSpec::interface("A"))
            .add(TypeSpec::interface("B").extends("A"))
            .add(TypeSpec::class("C").extends("B"));
        let catalog = types.build();

        let mut builder = BindingFunctionBuilder::new(catalog.clone());
        builder.bind(ContextPattern::any(), BindRule::bind("A").to("C").build(&catalog).unwrap());

        let intermediate = builder.build(RuleSet::IntermediateTypes);
        let generated: Vec<&TypeKey> = intermediate
            .rules()
            .iter()
            .flat_map(|(_, rules)| rules.iter().map(BindRule::depend_type))
            .collect();
        assert_eq!(generated, vec![&TypeKey::named("B")]);
        assert!(builder.build(RuleSet::SuperTypes).is_empty());
    }
}
