use std::fmt;
use std::sync::Arc;

use super::{BindingFunction, BindingResult};
use crate::catalog::{Defaults, TypeCatalog};
use crate::context::InjectionContext;
use crate::desire::{Desire, DesireChain};
use crate::error::DiResult;
use crate::satisfaction::Satisfaction;

/// Falls back to the defaults declared in the catalog.
///
/// Defaults on the desire's qualifier kind are consulted first, and only
/// for the desire an injection point declared. A qualifier that does not
/// allow default binding stops the search there; otherwise the defaults of
/// the desired type itself apply. A default implementation is chained, a
/// default provider or instance is terminal.
pub struct DefaultDesireBindingFunction {
    catalog: Arc<TypeCatalog>,
}

impl DefaultDesireBindingFunction {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog }
    }

    fn apply(&self, desire: &Desire, defaults: &Defaults) -> Option<BindingResult> {
        if let Some(implementation) = defaults.implementation() {
            return Some(BindingResult::chained(desire.restrict_type(&self.catalog, implementation)));
        }
        if let Some(provider) = defaults.provider() {
            let sat = Satisfaction::provider_class(provider.clone(), desire.desired_type().clone());
            return Some(BindingResult::terminal(desire.restrict(sat)));
        }
        if let Some(value) = defaults.instance() {
            let sat = Satisfaction::Instance { ty: desire.desired_type().clone(), value: value.clone() };
            return Some(BindingResult::terminal(desire.restrict(sat)));
        }
        None
    }
}

impl BindingFunction for DefaultDesireBindingFunction {
    fn bind(&self, _context: &InjectionContext, chain: &DesireChain) -> DiResult<Option<BindingResult>> {
        let desire = chain.current_desire();
        if let Some(qualifier) = desire.qualifier() {
            if chain.previous_desires().is_empty() {
                let found = self
                    .catalog
                    .qualifier_defaults(qualifier.kind())
                    .and_then(|defaults| self.apply(desire, defaults));
                if found.is_some() {
                    return Ok(found);
                }
            }
            if !qualifier.allows_default() {
                return Ok(None);
            }
        }
        Ok(self
            .catalog
            .type_defaults(desire.desired_type())
            .and_then(|defaults| self.apply(desire, defaults)))
    }
}

impl fmt::Debug for DefaultDesireBindingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultDesireBindingFunction")
    }
}
