use std::fmt;
use std::sync::Arc;

use super::{BindingFunction, BindingResult};
use crate::catalog::TypeCatalog;
use crate::context::InjectionContext;
use crate::desire::DesireChain;
use crate::error::DiResult;
use crate::satisfaction::Satisfaction;

/// Satisfies `Provider<T>` desires with a provider backed by the graph
/// for `T`.
///
/// The result is terminal and deferred: the desire for `T` is resolved in
/// a later pass, which is what lets a provider close a dependency cycle.
pub struct ProviderBindingFunction {
    catalog: Arc<TypeCatalog>,
}

impl ProviderBindingFunction {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog }
    }
}

impl BindingFunction for ProviderBindingFunction {
    fn bind(&self, _context: &InjectionContext, chain: &DesireChain) -> DiResult<Option<BindingResult>> {
        let desire = chain.current_desire();
        if desire.is_instantiable() {
            return Ok(None);
        }
        let Some(provided) = desire.desired_type().provided_type() else {
            return Ok(None);
        };
        let target = self
            .catalog
            .desire(desire.injection_point().with_type(provided.clone()));
        let sat = Satisfaction::provider_injection(target);
        Ok(Some(BindingResult::terminal(desire.restrict(sat)).deferred()))
    }
}

impl fmt::Debug for ProviderBindingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderBindingFunction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeSpec;
    use crate::key::TypeKey;
    use crate::satisfaction::SatisfactionKind;

    #[test]
    fn test_provider_desires_are_deferred() {
        let mut types = TypeCatalog::builder();
        types.add(TypeSpec::class("B"));
        let catalog = types.build();
        let function = ProviderBindingFunction::new(catalog.clone());

        let ty = TypeKey::provider_of(&TypeKey::named("B"));
        let chain = DesireChain::singleton(catalog.root_desire(&ty, None));
        let result = function.bind(&InjectionContext::initial(), &chain).unwrap().unwrap();

        assert!(result.is_terminal());
        assert!(result.is_deferred());
        let sat = result.desire().satisfaction().unwrap();
        assert_eq!(sat.kind(), SatisfactionKind::ProviderInjection);
        assert_eq!(sat.erased_type(), &ty);
        assert_eq!(sat.dependencies(&catalog)[0].desired_type(), &TypeKey::named("B"));
    }

    #[test]
    fn test_plain_desires_are_ignored() {
        let mut types = TypeCatalog::builder();
        types.add(TypeSpec::interface("B"));
        let catalog = types.build();
        let function = ProviderBindingFunction::new(catalog.clone());
        let chain = DesireChain::singleton(catalog.root_desire(&TypeKey::named("B"), None));
        assert!(function.bind(&InjectionContext::initial(), &chain).unwrap().is_none());
    }
}
