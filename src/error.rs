//! Error types for dependency resolution and instantiation.

use thiserror::Error;

use crate::context::InjectionContext;
use crate::desire::{Desire, DesireChain, InjectionPoint};
use crate::key::TypeKey;
use crate::rules::BindRule;
use crate::satisfaction::Satisfaction;

/// Resolution and instantiation errors
///
/// Resolution errors carry the desire chain and the context they were
/// raised in, so a failure deep in the graph can be traced back to the
/// injection point that requested it.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{DiError, TypeKey};
///
/// let err = DiError::Construction {
///     ty: TypeKey::named("Database"),
///     message: "connection refused".into(),
/// };
/// assert_eq!(err.to_string(), "failed to construct Database: connection refused");
///
/// let config = DiError::Config("max_depth must be positive".into());
/// assert!(config.to_string().contains("max_depth"));
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No binding function produced a satisfiable desire
    #[error("unable to satisfy {} in context {context}: tried {chain}", .chain.current_desire())]
    Unresolvable {
        chain: DesireChain,
        context: InjectionContext,
    },
    /// Several bind rules were equally applicable
    #[error("{} bindings are equally applicable to {} in context {context}", .rules.len(), .chain.current_desire())]
    MultipleBindings {
        chain: DesireChain,
        context: InjectionContext,
        rules: Vec<BindRule>,
    },
    /// Resolution exceeded the maximum context depth
    #[error("maximum context depth of {max_depth} reached resolving {desire}; dependencies are probably cyclic")]
    Cyclic {
        desire: Desire,
        satisfaction: Option<Satisfaction>,
        max_depth: usize,
    },
    /// A non-nullable injection point received null
    #[error("null dependency injected into non-nullable {0}")]
    NullDependency(InjectionPoint),
    /// A constructor or provider failed
    #[error("failed to construct {ty}: {message}")]
    Construction { ty: TypeKey, message: String },
    /// An instance did not have the requested Rust type
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// A bind rule was configured inconsistently
    #[error("invalid binding: {0}")]
    InvalidBinding(String),
    /// A graph handed to the solver was not produced by it
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    /// Bad resolver configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl DiError {
    /// Whether this error is a resolution failure, as opposed to one raised
    /// while instantiating.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            DiError::Unresolvable { .. } | DiError::MultipleBindings { .. } | DiError::Cyclic { .. }
        )
    }
}

/// Result type for resolver operations
pub type DiResult<T> = Result<T, DiError>;
